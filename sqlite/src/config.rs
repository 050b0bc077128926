//! Store configuration.
//!
//! Defines the YAML-serializable settings used to open a
//! [`DataBakeStore`](crate::DataBakeStore). Every field has a default, so a
//! config file only needs to name what it changes.
//!
//! # Example YAML
//!
//! ```yaml
//! path: /var/lib/data-bake/items.sqlite
//! statement_cache_capacity: 32
//! busy_timeout_ms: 2000
//! journal_mode: wal
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// SQLite journal mode applied to file-backed stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    /// Rollback journal deleted after each transaction (SQLite default).
    #[default]
    Delete,
    /// Write-ahead log.
    Wal,
    /// Journal kept in memory.
    Memory,
}

impl JournalMode {
    /// Returns the pragma value for this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            JournalMode::Delete => "DELETE",
            JournalMode::Wal => "WAL",
            JournalMode::Memory => "MEMORY",
        }
    }
}

/// Settings for opening a store.
///
/// # Examples
///
/// ```
/// use data_bake_sqlite::StoreConfig;
///
/// let config: StoreConfig = serde_yaml::from_str("busy_timeout_ms: 250").unwrap();
/// assert!(config.path.is_none());
/// assert_eq!(config.busy_timeout_ms, 250);
/// assert_eq!(config.statement_cache_capacity, 16);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database file; `None` opens an in-memory database.
    pub path: Option<PathBuf>,
    /// Number of prepared statements kept in the per-connection cache.
    pub statement_cache_capacity: usize,
    /// How long a write waits on a locked database before failing.
    pub busy_timeout_ms: u64,
    /// Journal mode for file-backed databases.
    pub journal_mode: JournalMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            statement_cache_capacity: 16,
            busy_timeout_ms: 5000,
            journal_mode: JournalMode::default(),
        }
    }
}

impl StoreConfig {
    /// Default settings for an in-memory store.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Default settings for a store backed by the file at `path`.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::StoreError::Io) if the file cannot be read, or
    /// [`Yaml`](crate::StoreError::Yaml) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Opens a read/write connection (creating the file if needed) and
    /// applies the connection-level settings.
    pub(crate) fn open_connection(&self) -> Result<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = match &self.path {
            Some(path) => {
                let conn = Connection::open_with_flags(path, flags)?;
                let mode: String = conn.pragma_update_and_check(
                    None,
                    "journal_mode",
                    self.journal_mode.as_str(),
                    |row| row.get(0),
                )?;
                tracing::debug!(path = %path.display(), journal_mode = %mode, "opened database file");
                conn
            }
            None => Connection::open_in_memory_with_flags(flags)?,
        };

        conn.busy_timeout(Duration::from_millis(self.busy_timeout_ms))?;
        conn.set_prepared_statement_cache_capacity(self.statement_cache_capacity);
        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_complete() {
        let yaml = r#"
path: /tmp/items.sqlite
statement_cache_capacity: 64
busy_timeout_ms: 100
journal_mode: wal
"#;
        let config: StoreConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.path, Some(PathBuf::from("/tmp/items.sqlite")));
        assert_eq!(config.statement_cache_capacity, 64);
        assert_eq!(config.busy_timeout_ms, 100);
        assert_eq!(config.journal_mode, JournalMode::Wal);
    }

    #[test]
    fn test_deserialize_empty_uses_defaults() {
        let config: StoreConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn test_unknown_journal_mode_is_rejected() {
        assert!(serde_yaml::from_str::<StoreConfig>("journal_mode: sideways").is_err());
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.yml");

        let mut original = StoreConfig::at_path(dir.path().join("items.sqlite"));
        original.journal_mode = JournalMode::Memory;
        original.save(&path).unwrap();

        let loaded = StoreConfig::load(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            StoreConfig::load(dir.path().join("absent.yml")),
            Err(crate::StoreError::Io(_))
        ));
    }

    #[test]
    fn test_open_file_connection_applies_journal_mode() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = StoreConfig::at_path(dir.path().join("items.sqlite"));
        config.journal_mode = JournalMode::Wal;
        let conn = config.open_connection().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }
}
