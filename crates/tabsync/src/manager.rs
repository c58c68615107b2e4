//! Catalog-level operations: databases, users, grants, dumps.
//!
//! These sit outside the per-table diff engine. They are thin wrappers
//! over administrative SQL, plus a dump restore that shells out to the
//! `mysql` client the way operators do by hand.

use std::path::Path;
use std::process::Stdio;

use mysql_async::prelude::*;
use mysql_async::Pool;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::error::{Result, SyncError};
use crate::identifier::{escape_value, quote};

/// MySQL "operation failed for user" code, raised by DROP USER when the
/// user does not exist.
const ER_CANNOT_USER: u16 = 1396;

/// Administrative operations against a MySQL server.
pub struct SchemaManager {
    pool: Pool,
}

impl SchemaManager {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Connect using the given settings.
    pub fn connect(config: &DatabaseConfig) -> Self {
        Self::new(Pool::new(config.opts()))
    }

    /// List the tables of the current schema.
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let mut conn = self.pool.get_conn().await?;
        let tables: Vec<String> = conn.query("SHOW TABLES").await?;
        Ok(tables)
    }

    /// List all databases visible to the connected user.
    pub async fn list_databases(&self) -> Result<Vec<String>> {
        let mut conn = self.pool.get_conn().await?;
        let databases: Vec<String> = conn.query("SHOW DATABASES").await?;
        Ok(databases)
    }

    /// Create a database if it does not already exist.
    pub async fn create_database(&self, name: &str) -> Result<()> {
        let mut conn = self.pool.get_conn().await?;
        conn.query_drop(format!(
            "CREATE DATABASE IF NOT EXISTS {} DEFAULT CHARACTER SET utf8mb4",
            quote(name)
        ))
        .await?;
        info!("Database {} ready", name);
        Ok(())
    }

    /// Drop a database if it exists.
    pub async fn drop_database(&self, name: &str) -> Result<()> {
        let mut conn = self.pool.get_conn().await?;
        conn.query_drop(format!("DROP DATABASE IF EXISTS {}", quote(name)))
            .await?;
        info!("Database {} dropped", name);
        Ok(())
    }

    /// Create a user identified by a password.
    pub async fn create_user(&self, user: &str, host: &str, password: &str) -> Result<()> {
        let mut conn = self.pool.get_conn().await?;
        conn.query_drop(format!(
            "CREATE USER '{}'@'{}' IDENTIFIED BY '{}'",
            escape_value(user),
            escape_value(host),
            escape_value(password)
        ))
        .await?;
        Ok(())
    }

    /// Drop a user. A user that does not exist is not an error.
    pub async fn drop_user(&self, user: &str, host: &str) -> Result<()> {
        let mut conn = self.pool.get_conn().await?;
        let result = conn
            .query_drop(format!(
                "DROP USER '{}'@'{}'",
                escape_value(user),
                escape_value(host)
            ))
            .await;
        match result {
            Ok(()) => Ok(()),
            Err(mysql_async::Error::Server(err)) if err.code == ER_CANNOT_USER => {
                warn!("User {}@{} does not exist, nothing to drop", user, host);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Grant all privileges on a database to a user.
    pub async fn grant_all(&self, database: &str, user: &str, host: &str) -> Result<()> {
        let mut conn = self.pool.get_conn().await?;
        conn.query_drop(format!(
            "GRANT ALL PRIVILEGES ON {}.* TO '{}'@'{}'",
            quote(database),
            escape_value(user),
            escape_value(host)
        ))
        .await?;
        conn.query_drop("FLUSH PRIVILEGES").await?;
        Ok(())
    }

    /// Drop a table if it exists.
    pub async fn drop_table(&self, table: &str) -> Result<()> {
        let mut conn = self.pool.get_conn().await?;
        conn.query_drop(format!("DROP TABLE IF EXISTS {}", quote(table)))
            .await?;
        Ok(())
    }

    /// Restore a SQL dump by piping it through the `mysql` command-line
    /// client. The client handles the dump's own DELIMITER and charset
    /// directives, which a driver connection would not.
    pub async fn restore_dump(&self, config: &DatabaseConfig, dump: &Path) -> Result<()> {
        info!("Restoring {} into {}", dump.display(), config.database);
        let file = std::fs::File::open(dump)?;
        let status = Command::new("mysql")
            .arg(format!("--host={}", config.host))
            .arg(format!("--port={}", config.port))
            .arg(format!("--user={}", config.user))
            .arg(format!("--password={}", config.password))
            .arg(&config.database)
            .stdin(Stdio::from(file))
            .stdout(Stdio::null())
            .status()
            .await?;
        if !status.success() {
            return Err(SyncError::Restore(format!(
                "mysql client exited with {status} while restoring {}",
                dump.display()
            )));
        }
        info!("Restore of {} complete", dump.display());
        Ok(())
    }
}
