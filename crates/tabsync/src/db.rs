//! Database access seam.
//!
//! [`Database`] is the narrow surface the sync engine needs from a live
//! MySQL server: run DDL, introspect a table's columns, and read the
//! `SHOW CREATE TABLE` text for constraint parsing. Production code uses
//! [`MysqlDatabase`]; tests substitute a scripted implementation.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::Pool;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::identifier::quote;

/// One column of a live table, as reported by `INFORMATION_SCHEMA`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveColumn {
    /// Column name.
    pub name: String,
    /// Full column type as MySQL renders it, e.g. `varchar(180)` or `int(11)`.
    pub column_type: String,
    /// Whether the column carries any index (`COLUMN_KEY` is non-empty).
    pub has_index: bool,
    /// The literal column default, if any.
    pub default_value: Option<String>,
}

/// What the sync engine needs from a live MySQL server.
#[async_trait]
pub trait Database: Send + Sync {
    /// Execute a single DDL statement.
    async fn execute_ddl(&self, sql: &str) -> Result<()>;

    /// Describe the columns of `table`, in ordinal position order.
    ///
    /// Returns an empty vector when the table does not exist.
    async fn introspect_columns(&self, table: &str) -> Result<Vec<LiveColumn>>;

    /// List the base tables of the current schema.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// The full `SHOW CREATE TABLE` text for `table`.
    async fn show_create_table(&self, table: &str) -> Result<String>;

    /// Whether `table` exists in the current schema.
    async fn table_exists(&self, table: &str) -> Result<bool> {
        let tables = self.list_tables().await?;
        Ok(tables.iter().any(|t| t == table))
    }
}

/// [`Database`] backed by a `mysql_async` connection pool.
pub struct MysqlDatabase {
    pool: Pool,
    database: String,
}

impl MysqlDatabase {
    /// Connect to MySQL and verify the connection with a ping query.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        info!(
            "Connecting to MySQL at {}:{} database {}",
            config.host, config.port, config.database
        );
        let pool = Pool::new(config.opts());
        let mut conn = pool.get_conn().await?;
        conn.query_drop("SELECT 1").await?;
        info!("MySQL connection verified");
        Ok(Self {
            pool,
            database: config.database.clone(),
        })
    }

    /// The connection pool, for callers that issue their own statements.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Close the pool, waiting for in-flight connections to finish.
    pub async fn disconnect(self) -> Result<()> {
        self.pool.disconnect().await?;
        Ok(())
    }
}

#[async_trait]
impl Database for MysqlDatabase {
    async fn execute_ddl(&self, sql: &str) -> Result<()> {
        debug!("DDL: {}", sql);
        let mut conn = self.pool.get_conn().await?;
        conn.query_drop(sql).await?;
        Ok(())
    }

    async fn introspect_columns(&self, table: &str) -> Result<Vec<LiveColumn>> {
        let mut conn = self.pool.get_conn().await?;
        let rows: Vec<(String, String, String, Option<String>)> = conn
            .exec(
                "SELECT COLUMN_NAME, COLUMN_TYPE, COLUMN_KEY, COLUMN_DEFAULT \
                 FROM INFORMATION_SCHEMA.COLUMNS \
                 WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
                 ORDER BY ORDINAL_POSITION",
                (self.database.as_str(), table),
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|(name, column_type, key, default_value)| LiveColumn {
                name,
                column_type,
                has_index: !key.is_empty(),
                default_value,
            })
            .collect())
    }

    async fn list_tables(&self) -> Result<Vec<String>> {
        let mut conn = self.pool.get_conn().await?;
        let tables: Vec<String> = conn
            .exec(
                "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
                 WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE' \
                 ORDER BY TABLE_NAME",
                (self.database.as_str(),),
            )
            .await?;
        Ok(tables)
    }

    async fn show_create_table(&self, table: &str) -> Result<String> {
        let mut conn = self.pool.get_conn().await?;
        let row: Option<(String, String)> = conn
            .query_first(format!("SHOW CREATE TABLE {}", quote(table)))
            .await?;
        Ok(row.map(|(_, ddl)| ddl).unwrap_or_default())
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let mut conn = self.pool.get_conn().await?;
        let count: Option<u64> = conn
            .exec_first(
                "SELECT COUNT(*) FROM INFORMATION_SCHEMA.TABLES \
                 WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?",
                (self.database.as_str(), table),
            )
            .await?;
        Ok(count.unwrap_or(0) > 0)
    }
}
