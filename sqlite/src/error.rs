//! Error types for DataBake store operations.
//!
//! Provides a unified error type covering database access, row decoding,
//! migration, record validation, and configuration loading failures.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Schema migration failure.
    ///
    /// Sticky: once recorded, every later call on the same store replays
    /// this error until [`reset_schema_state`](crate::DataBakeStore::reset_schema_state)
    /// is called.
    #[error("schema migration to version {version} failed: {message}")]
    Schema {
        /// Target version of the step that failed (0 for the version table).
        version: i64,
        /// Description of the underlying failure.
        message: String,
    },

    /// A required column was `NULL` in a stored row.
    #[error("missing value for required column '{column}'")]
    MissingColumn {
        /// Name of the offending column.
        column: &'static str,
    },

    /// A stored timestamp cannot be represented as a date.
    #[error("column '{column}' holds an out-of-range timestamp: {value}")]
    InvalidTimestamp {
        /// Name of the offending column.
        column: &'static str,
        /// Raw seconds-since-epoch value.
        value: f64,
    },

    /// An update was requested for a record that was never inserted.
    #[error("record has no id; insert it before updating")]
    NotPersisted,

    /// A record failed validation before being written.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Migration steps are not strictly increasing positive versions.
    #[error("invalid migration plan: {0}")]
    InvalidMigrationPlan(String),

    /// Configuration file I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Convenience alias for results with [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;
