//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, SyncError};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database connection settings.
    pub database: DatabaseConfig,

    /// Sync behavior settings.
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Database connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database (schema) name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password. Never serialized back out.
    #[serde(skip_serializing)]
    pub password: String,
}

/// Sync behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Physical table name prefix (default: "tab").
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,

    /// Directory holding record-type descriptor files.
    #[serde(default = "default_meta_dir")]
    pub meta_dir: String,

    /// Swallow benign DDL errors (unknown table/column, duplicate
    /// column/index) instead of aborting. Used when syncing against
    /// down-level schemas or racing processes.
    #[serde(default)]
    pub ignore_ddl_errors: bool,

    /// Maintain foreign keys for link fields.
    #[serde(default)]
    pub enforce_foreign_keys: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            table_prefix: default_table_prefix(),
            meta_dir: default_meta_dir(),
            ignore_ddl_errors: false,
            enforce_foreign_keys: false,
        }
    }
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_table_prefix() -> String {
    "tab".to_string()
}

fn default_meta_dir() -> String {
    "meta".to_string()
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.database.host.is_empty() {
            return Err(SyncError::Config("database.host is required".into()));
        }
        if self.database.database.is_empty() {
            return Err(SyncError::Config("database.database is required".into()));
        }
        if self.database.user.is_empty() {
            return Err(SyncError::Config("database.user is required".into()));
        }
        if self.sync.table_prefix.is_empty() {
            return Err(SyncError::Config("sync.table_prefix must not be empty".into()));
        }
        if !self
            .sync
            .table_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(SyncError::Config(format!(
                "sync.table_prefix contains invalid characters: {:?}",
                self.sync.table_prefix
            )));
        }
        Ok(())
    }
}

impl DatabaseConfig {
    /// Build mysql_async connection options.
    pub fn opts(&self) -> mysql_async::Opts {
        mysql_async::OptsBuilder::default()
            .ip_or_hostname(&self.host)
            .tcp_port(self.port)
            .db_name(Some(&self.database))
            .user(Some(&self.user))
            .pass(Some(&self.password))
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        "database:\n  host: localhost\n  database: app\n  user: root\n  password: secret\n"
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_yaml(minimal_yaml()).unwrap();
        assert_eq!(config.database.port, 3306);
        assert_eq!(config.sync.table_prefix, "tab");
        assert_eq!(config.sync.meta_dir, "meta");
        assert!(!config.sync.ignore_ddl_errors);
        assert!(!config.sync.enforce_foreign_keys);
    }

    #[test]
    fn test_missing_host_rejected() {
        let yaml = "database:\n  host: \"\"\n  database: app\n  user: root\n  password: x\n";
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_bad_prefix_rejected() {
        let yaml = format!("{}sync:\n  table_prefix: \"ta b\"\n", minimal_yaml());
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_password_not_serialized() {
        let config = Config::from_yaml(minimal_yaml()).unwrap();
        let out = serde_yaml::to_string(&config).unwrap();
        assert!(!out.contains("secret"), "password was serialized: {out}");
    }
}
