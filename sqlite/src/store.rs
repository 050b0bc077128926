//! The record store.
//!
//! [`DataBakeStore`] owns one SQLite connection, the schema migrator, and a
//! [`ChangeNotifier`]. Every public operation locks the connection for its
//! whole body, brings the schema up to date first, and (for writes) runs
//! inside a single transaction. A write queues its change event before it
//! releases the lock, so events reach observers in commit order; delivery
//! itself runs after the lock is released.
//!
//! # Example
//!
//! ```
//! use data_bake_core::{DataItem, DeletedItems};
//! use data_bake_sqlite::DataBakeStore;
//!
//! let store = DataBakeStore::open_in_memory().unwrap();
//! let changes = store.subscribe_channel();
//!
//! let saved = store
//!     .insert(vec![DataItem::new("apple", "red"), DataItem::new("banana", "yellow")])
//!     .unwrap();
//! assert_eq!(changes.recv().unwrap().inserted.len(), 2);
//!
//! let apples = store.previews("ap", false).unwrap();
//! assert_eq!(apples.len(), 1);
//!
//! store.delete(None).unwrap();
//! assert_eq!(changes.recv().unwrap().deleted, DeletedItems::All);
//! assert!(store.get(saved[0].id.unwrap()).unwrap().is_none());
//! ```

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::{Mutex, MutexGuard, PoisonError};

use data_bake_core::{DataItem, DataItemPreview, DataItemsChange, validate_item};
use rusqlite::{Connection, params, params_from_iter};
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::convert::{COLUMNS, PREVIEW_COLUMNS, decode_item, decode_preview, encode_item};
use crate::error::{Result, StoreError};
use crate::migration::{Migrator, SchemaState, read_version};
use crate::notify::{ChangeNotifier, SubscriptionId};
use crate::schema::{ITEM_TABLE, MigrationStep, default_migrations};

struct StoreInner {
    conn: Connection,
    migrator: Migrator,
}

/// SQLite-backed store for [`DataItem`] records.
///
/// The store is `Send + Sync`; share it across threads with an `Arc`.
/// Operations are serialized on the single connection, so a migration never
/// interleaves with a query that assumes the old schema.
///
/// # Examples
///
/// ```
/// use data_bake_core::DataItem;
/// use data_bake_sqlite::DataBakeStore;
///
/// let store = DataBakeStore::open_in_memory().unwrap();
///
/// let mut item = store.insert(vec![DataItem::new("Rye", "dense")]).unwrap().remove(0);
/// item.contents = "very dense".into();
/// item.touch();
/// assert!(store.update(&item).unwrap());
///
/// let loaded = store.get(item.id.unwrap()).unwrap().unwrap();
/// assert_eq!(loaded.contents, "very dense");
/// assert!(loaded.modified.is_some());
/// ```
pub struct DataBakeStore {
    inner: Mutex<StoreInner>,
    notifier: ChangeNotifier,
}

impl DataBakeStore {
    /// Wraps an open connection using the built-in migration plan.
    ///
    /// The schema is not touched until the first operation.
    pub fn new(conn: Connection) -> Result<Self> {
        Self::with_migrations(conn, default_migrations())
    }

    /// Wraps an open connection using a custom migration plan.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidMigrationPlan`] if step versions are not
    /// positive and strictly increasing.
    pub fn with_migrations(conn: Connection, steps: Vec<MigrationStep>) -> Result<Self> {
        Ok(Self {
            inner: Mutex::new(StoreInner {
                conn,
                migrator: Migrator::new(steps)?,
            }),
            notifier: ChangeNotifier::new(),
        })
    }

    /// Opens a store according to `config`.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Self::new(config.open_connection()?)
    }

    /// Opens (or creates) a file-backed store with default settings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_config(&StoreConfig::at_path(path.as_ref()))
    }

    /// Opens an ephemeral in-memory store with default settings.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_config(&StoreConfig::in_memory())
    }

    /// Brings the schema up to date.
    ///
    /// Idempotent; every other operation calls it first. After a failure the
    /// same error is returned on every call until
    /// [`reset_schema_state`](Self::reset_schema_state).
    pub fn ensure_schema(&self) -> Result<()> {
        self.with_schema(|_| Ok(()))
    }

    /// Returns the cached schema initialization outcome.
    pub fn schema_state(&self) -> SchemaState {
        self.lock().migrator.state().clone()
    }

    /// Clears a cached schema failure so the next call retries the migration.
    pub fn reset_schema_state(&self) {
        self.lock().migrator.reset();
    }

    /// Returns the schema version recorded in the database.
    pub fn schema_version(&self) -> Result<i64> {
        self.with_schema(|conn| Ok(read_version(conn)?))
    }

    /// Lists record previews ordered by id.
    ///
    /// An empty `title_prefix` returns every record. Otherwise only titles
    /// starting with the prefix match, case-sensitively; wildcard characters
    /// in the prefix match literally.
    pub fn previews(&self, title_prefix: &str, descending: bool) -> Result<Vec<DataItemPreview>> {
        let order = if descending { "DESC" } else { "ASC" };
        let columns = PREVIEW_COLUMNS.join(", ");

        self.with_schema(|conn| {
            let mut previews = Vec::new();
            if title_prefix.is_empty() {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT {columns} FROM {ITEM_TABLE} ORDER BY id {order}"
                ))?;
                let mut rows = stmt.query([])?;
                while let Some(row) = rows.next()? {
                    previews.push(decode_preview(row, 0)?);
                }
            } else {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT {columns} FROM {ITEM_TABLE} WHERE title GLOB ?1 ORDER BY id {order}"
                ))?;
                let mut rows = stmt.query(params![prefix_pattern(title_prefix)])?;
                while let Some(row) = rows.next()? {
                    previews.push(decode_preview(row, 0)?);
                }
            }
            Ok(previews)
        })
    }

    /// Loads one record by id. An unknown id yields `None`.
    pub fn get(&self, id: i64) -> Result<Option<DataItem>> {
        self.with_schema(|conn| fetch_item(conn, id))
    }

    /// Number of stored records.
    pub fn count(&self) -> Result<usize> {
        self.with_schema(|conn| {
            let count: i64 = conn
                .prepare_cached(&format!("SELECT COUNT(*) FROM {ITEM_TABLE}"))?
                .query_row([], |row| row.get(0))?;
            Ok(count as usize)
        })
    }

    /// Inserts a batch of records in one transaction.
    ///
    /// Returns the records with their assigned ids, in input order. If any
    /// record fails validation or violates a constraint, nothing from the
    /// batch is stored. One change event listing every inserted record is
    /// published after the commit.
    pub fn insert(&self, items: impl IntoIterator<Item = DataItem>) -> Result<Vec<DataItem>> {
        self.write(|conn| {
            let tx = conn.transaction()?;
            let mut inserted = Vec::new();
            {
                let mut stmt = tx.prepare_cached(&insert_sql())?;
                for mut item in items {
                    check_item(&item)?;
                    stmt.execute(params_from_iter(encode_item(&item)))?;
                    item.id = Some(tx.last_insert_rowid());
                    inserted.push(item);
                }
            }
            tx.commit()?;

            debug!(count = inserted.len(), "inserted records");
            let change = DataItemsChange::inserted(inserted.clone());
            Ok((inserted, Some(change)))
        })
    }

    /// Replaces the stored record that has `item.id`.
    ///
    /// Returns `false`, without publishing anything, if no record with that
    /// id exists; ids that can never have been assigned (zero or negative)
    /// simply miss. Otherwise publishes the `(old, new)` pair and returns
    /// `true`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotPersisted`] if `item` has no id.
    pub fn update(&self, item: &DataItem) -> Result<bool> {
        let id = item.id.ok_or(StoreError::NotPersisted)?;

        self.write(|conn| {
            let tx = conn.transaction()?;
            let Some(old) = fetch_item(&tx, id)? else {
                debug!(id, "update matched no record");
                return Ok((false, None));
            };
            check_item(item)?;
            tx.prepare_cached(&update_sql())?
                .execute(params_from_iter(encode_item(item)))?;
            tx.commit()?;

            debug!(id, "updated record");
            Ok((true, Some(DataItemsChange::updated(id, old, item.clone()))))
        })
    }

    /// Deletes the records with the given ids, or every record for `None`.
    ///
    /// Returns how many rows were actually removed. The published event lists
    /// only the ids that existed, or [`DeletedItems::All`](data_bake_core::DeletedItems::All)
    /// when no filter was given. An empty id slice removes nothing and still
    /// publishes an empty event.
    pub fn delete(&self, ids: Option<&[i64]>) -> Result<usize> {
        let Some(ids) = ids else {
            return self.write(|conn| {
                let removed = conn
                    .prepare_cached(&format!("DELETE FROM {ITEM_TABLE}"))?
                    .execute([])?;
                debug!(removed, "deleted all records");
                Ok((removed, Some(DataItemsChange::deleted_all())))
            });
        };

        self.write(|conn| {
            let tx = conn.transaction()?;
            let mut removed = BTreeSet::new();
            {
                let mut stmt =
                    tx.prepare_cached(&format!("DELETE FROM {ITEM_TABLE} WHERE id = ?1"))?;
                for &id in ids {
                    if stmt.execute(params![id])? > 0 {
                        removed.insert(id);
                    }
                }
            }
            tx.commit()?;

            let count = removed.len();
            debug!(requested = ids.len(), removed = count, "deleted records");
            Ok((count, Some(DataItemsChange::deleted_ids(removed))))
        })
    }

    /// Registers a callback for every subsequent change event.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&DataItemsChange) + Send + Sync + 'static,
    {
        self.notifier.subscribe(callback)
    }

    /// Registers a channel for every subsequent change event.
    pub fn subscribe_channel(&self) -> Receiver<DataItemsChange> {
        self.notifier.subscribe_channel()
    }

    /// Removes a callback subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    /// Closes the connection.
    ///
    /// Committed data is unaffected by a close failure, so one is logged and
    /// otherwise ignored.
    pub fn close(self) {
        let inner = self
            .inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        if let Err((_conn, err)) = inner.conn.close() {
            warn!(error = %err, "failed to close database connection");
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` under the connection lock once the schema is current.
    fn with_schema<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut inner = self.lock();
        let StoreInner { conn, migrator } = &mut *inner;
        migrator.ensure(conn)?;
        f(conn)
    }

    /// Runs a write under the connection lock. The change it produces is
    /// queued before the lock is released and delivered after.
    fn write<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<(T, Option<DataItemsChange>)>,
    ) -> Result<T> {
        let value = self.with_schema(|conn| {
            let (value, change) = f(conn)?;
            if let Some(change) = change {
                self.notifier.enqueue(change);
            }
            Ok(value)
        })?;
        self.notifier.flush();
        Ok(value)
    }
}

impl std::fmt::Debug for DataBakeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataBakeStore")
            .field("schema_state", &self.schema_state())
            .field("notifier", &self.notifier)
            .finish()
    }
}

fn fetch_item(conn: &Connection, id: i64) -> Result<Option<DataItem>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {} FROM {ITEM_TABLE} WHERE id = ?1",
        COLUMNS.join(", ")
    ))?;
    let mut rows = stmt.query(params![id])?;
    rows.next()?.map(|row| decode_item(row, 0)).transpose()
}

fn insert_sql() -> String {
    let placeholders: Vec<String> = (1..=COLUMNS.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT INTO {ITEM_TABLE} ({}) VALUES ({})",
        COLUMNS.join(", "),
        placeholders.join(", ")
    )
}

/// `?1` binds the id; the remaining columns follow in [`COLUMNS`] order.
fn update_sql() -> String {
    let assignments: Vec<String> = COLUMNS
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, column)| format!("{column} = ?{}", i + 1))
        .collect();
    format!(
        "UPDATE {ITEM_TABLE} SET {} WHERE id = ?1",
        assignments.join(", ")
    )
}

/// Builds a case-sensitive `GLOB` prefix pattern with metacharacters escaped.
fn prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 2);
    for c in prefix.chars() {
        match c {
            '*' | '?' | '[' => {
                pattern.push('[');
                pattern.push(c);
                pattern.push(']');
            }
            _ => pattern.push(c),
        }
    }
    pattern.push('*');
    pattern
}

fn check_item(item: &DataItem) -> Result<()> {
    let errors = validate_item(item);
    if errors.is_empty() {
        return Ok(());
    }
    let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
    Err(StoreError::InvalidRecord(messages.join("; ")))
}
