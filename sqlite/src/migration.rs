//! Versioned schema migration.
//!
//! [`Migrator`] owns an ordered list of [`MigrationStep`]s and a cached
//! [`SchemaState`]. The first [`ensure`](Migrator::ensure) call on a store
//! creates the version table, reads the recorded version, and applies every
//! newer step, each in its own transaction together with the version bump.
//! Later calls short-circuit on the cached outcome: success returns
//! immediately and failure replays the same error until
//! [`reset`](Migrator::reset) is called.
//!
//! Each step re-reads the recorded version inside an immediate transaction,
//! so two processes migrating the same file converge instead of applying a
//! step twice.

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::schema::{MigrationStep, VERSION_TABLE_SQL, validate_plan};

/// Cached outcome of schema initialization for one store.
///
/// # Examples
///
/// ```
/// use data_bake_sqlite::{DataBakeStore, SchemaState};
///
/// let store = DataBakeStore::open_in_memory().unwrap();
/// assert_eq!(store.schema_state(), SchemaState::Uninitialized);
///
/// store.ensure_schema().unwrap();
/// assert_eq!(store.schema_state(), SchemaState::Ready);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaState {
    /// No initialization attempted yet (or the state was reset).
    Uninitialized,
    /// The schema is at the latest version.
    Ready,
    /// Initialization failed; the error is replayed on every call.
    Failed {
        /// Target version of the failing step (0 for the version table).
        version: i64,
        /// Description of the failure.
        message: String,
    },
}

/// Applies migration steps and caches the result.
#[derive(Debug)]
pub(crate) struct Migrator {
    steps: Vec<MigrationStep>,
    state: SchemaState,
}

impl Migrator {
    /// Creates a migrator for the given plan.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidMigrationPlan`] if step versions are not
    /// positive and strictly increasing.
    pub(crate) fn new(steps: Vec<MigrationStep>) -> Result<Self> {
        validate_plan(&steps)?;
        Ok(Self {
            steps,
            state: SchemaState::Uninitialized,
        })
    }

    pub(crate) fn state(&self) -> &SchemaState {
        &self.state
    }

    /// Forgets a cached outcome so the next call migrates again.
    pub(crate) fn reset(&mut self) {
        self.state = SchemaState::Uninitialized;
    }

    /// Latest version in the plan, or 0 for an empty plan.
    pub(crate) fn target_version(&self) -> i64 {
        self.steps.last().map_or(0, |step| step.version)
    }

    /// Brings the schema up to date, or replays the cached outcome.
    pub(crate) fn ensure(&mut self, conn: &mut Connection) -> Result<()> {
        match &self.state {
            SchemaState::Ready => return Ok(()),
            SchemaState::Failed { version, message } => {
                return Err(StoreError::Schema {
                    version: *version,
                    message: message.clone(),
                });
            }
            SchemaState::Uninitialized => {}
        }

        match self.apply_pending(conn) {
            Ok(applied) => {
                if applied > 0 {
                    // Cached statements may reference the old table layout.
                    conn.flush_prepared_statement_cache();
                }
                self.state = SchemaState::Ready;
                Ok(())
            }
            Err(err) => {
                let (version, message) = match err {
                    StoreError::Schema { version, message } => (version, message),
                    other => (0, other.to_string()),
                };
                warn!(version, %message, "schema migration failed");
                self.state = SchemaState::Failed {
                    version,
                    message: message.clone(),
                };
                Err(StoreError::Schema { version, message })
            }
        }
    }

    /// Runs every step newer than the recorded version. Returns how many ran.
    fn apply_pending(&self, conn: &mut Connection) -> Result<usize> {
        conn.execute_batch(VERSION_TABLE_SQL)
            .map_err(|e| schema_error(0, e))?;

        let start = read_version(conn).map_err(|e| schema_error(0, e))?;
        let mut applied = 0;

        for step in self.steps.iter().filter(|step| step.version > start) {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|e| schema_error(step.version, e))?;

            // Another connection may have applied this step since `start` was read.
            let current = read_version(&tx).map_err(|e| schema_error(step.version, e))?;
            if current >= step.version {
                debug!(version = step.version, "migration step already applied");
                continue;
            }

            tx.execute_batch(&step.sql)
                .map_err(|e| schema_error(step.version, e))?;
            tx.execute(
                "UPDATE SchemaVersion SET version = ?1 WHERE id = 0",
                params![step.version],
            )
            .map_err(|e| schema_error(step.version, e))?;
            tx.commit().map_err(|e| schema_error(step.version, e))?;

            debug!(
                version = step.version,
                description = %step.description,
                "applied migration step"
            );
            applied += 1;
        }

        info!(
            from = start,
            to = self.target_version().max(start),
            applied,
            "schema is current"
        );
        Ok(applied)
    }
}

/// Reads the recorded schema version; a missing or `NULL` row counts as 0.
pub(crate) fn read_version(conn: &Connection) -> rusqlite::Result<i64> {
    let version: Option<Option<i64>> = conn
        .query_row("SELECT version FROM SchemaVersion WHERE id = 0", [], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(version.flatten().unwrap_or(0))
}

fn schema_error(version: i64, err: rusqlite::Error) -> StoreError {
    StoreError::Schema {
        version,
        message: err.to_string(),
    }
}
