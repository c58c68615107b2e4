//! Error types for schema synchronization.

use thiserror::Error;

/// Main error type for sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A field name failed validation and cannot become a column.
    #[error("Invalid field name {field:?}: {reason}")]
    InvalidFieldName { field: String, reason: String },

    /// A generated DDL statement failed to execute.
    #[error("DDL failed: {statement}\n  Caused by: {message}")]
    Ddl { statement: String, message: String },

    /// Database connection or query error.
    #[error("Database error: {0}")]
    Database(#[from] mysql_async::Error),

    /// Metadata provider error (unknown record type, malformed descriptor file).
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// Dump restore failed (mysql client exited non-zero or could not start).
    #[error("Restore failed: {0}")]
    Restore(String),

    /// IO error (file operations).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error (report output).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Create an InvalidFieldName error.
    pub fn invalid_field_name(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SyncError::InvalidFieldName {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a Ddl error carrying the offending statement.
    pub fn ddl(statement: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::Ddl {
            statement: statement.into(),
            message: message.into(),
        }
    }

    /// MySQL server error code, if this error wraps one.
    pub fn mysql_code(&self) -> Option<u16> {
        match self {
            SyncError::Database(mysql_async::Error::Server(e)) => Some(e.code),
            _ => None,
        }
    }
}

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
