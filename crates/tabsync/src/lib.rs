//! Declarative schema synchronization for MySQL.
//!
//! Record types are described by typed field descriptors; `tabsync`
//! reconciles each one against its live `tab<Name>` table. A missing
//! table is created outright; an existing one receives the minimal set
//! of ALTER statements, ordered so adds land before type changes,
//! constraint work, index work, and defaults.
//!
//! The crate is organized around a few seams:
//!
//! - [`meta`]: field descriptors and the [`meta::MetadataSource`] trait
//! - [`typemap`]: abstract field types resolved to MySQL column types
//! - [`column`] and [`table`]: the per-column diff and per-table engine
//! - [`db`]: the [`db::Database`] trait and its `mysql_async` impl
//! - [`reconciler`]: the driver that syncs one or all record types
//! - [`manager`]: catalog operations (databases, users, grants, dumps)

pub mod column;
pub mod config;
pub mod db;
pub mod error;
pub mod identifier;
pub mod manager;
pub mod meta;
pub mod ops;
pub mod reconciler;
pub mod table;
pub mod typemap;

pub use column::Column;
pub use config::{Config, DatabaseConfig, SyncConfig};
pub use db::{Database, LiveColumn, MysqlDatabase};
pub use error::{Result, SyncError};
pub use manager::SchemaManager;
pub use meta::{FieldDescriptor, FieldType, FileMetadataSource, MetadataSource};
pub use ops::Operation;
pub use reconciler::{Reconciler, SyncReport};
pub use table::{SyncOutcome, Table};
