//! SQL schema definitions and the built-in migration plan.
//!
//! The store keeps one data table plus a singleton version row:
//!
//! - `SchemaVersion`: `(id INTEGER PRIMARY KEY, version INTEGER)`, row `id = 0`
//! - `DataItem`: the records, built up by [`default_migrations`]
//!
//! # Revisions
//!
//! | Version | Change |
//! |---------|--------|
//! | 1 | create `DataItem (id, title, created, modified, contents)` |
//! | 2 | add `rating FLOAT` and `thumbnail BLOB` |
//! | 3 | index `title` for prefix search |

use crate::error::{Result, StoreError};

/// Name of the record table.
pub const ITEM_TABLE: &str = "DataItem";

/// Name of the singleton version table.
pub const VERSION_TABLE: &str = "SchemaVersion";

/// Creates the version table and seeds row 0.
///
/// `INSERT OR IGNORE` lets concurrent first-time initializations converge
/// without a constraint error.
pub(crate) const VERSION_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS SchemaVersion (
    id INTEGER PRIMARY KEY,
    version INTEGER
);
INSERT OR IGNORE INTO SchemaVersion (id, version) VALUES (0, 0);
"#;

/// One versioned, one-time schema change.
///
/// The body runs together with the version bump in a single transaction,
/// so the recorded version always matches the table structure.
///
/// # Examples
///
/// ```
/// use data_bake_sqlite::MigrationStep;
///
/// let step = MigrationStep::new(4, "add tags column", "ALTER TABLE DataItem ADD COLUMN tags TEXT;");
/// assert_eq!(step.version, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStep {
    /// Version recorded once the step has been applied.
    pub version: i64,
    /// Short human-readable summary, used in logs.
    pub description: String,
    /// SQL batch executed by the step.
    pub sql: String,
}

impl MigrationStep {
    /// Creates a migration step.
    pub fn new(version: i64, description: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            version,
            description: description.into(),
            sql: sql.into(),
        }
    }
}

/// Returns the built-in migration plan for the `DataItem` table.
pub fn default_migrations() -> Vec<MigrationStep> {
    vec![
        MigrationStep::new(
            1,
            "create DataItem table",
            r#"
CREATE TABLE IF NOT EXISTS DataItem (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    created FLOAT NOT NULL,
    modified FLOAT,
    contents TEXT NOT NULL
);
"#,
        ),
        MigrationStep::new(
            2,
            "add rating and thumbnail columns",
            r#"
ALTER TABLE DataItem ADD COLUMN rating FLOAT;
ALTER TABLE DataItem ADD COLUMN thumbnail BLOB;
"#,
        ),
        MigrationStep::new(
            3,
            "index DataItem titles",
            "CREATE INDEX IF NOT EXISTS DataItem_title ON DataItem(title);",
        ),
    ]
}

/// Checks that step versions are positive and strictly increasing.
pub(crate) fn validate_plan(steps: &[MigrationStep]) -> Result<()> {
    let mut previous = 0;
    for step in steps {
        if step.version <= previous {
            return Err(StoreError::InvalidMigrationPlan(format!(
                "step '{}' has version {} after version {}",
                step.description, step.version, previous
            )));
        }
        previous = step.version;
    }
    Ok(())
}
