//! SQLite record store for DataBake items.
//!
//! This crate persists [`DataItem`](data_bake_core::DataItem) records in a
//! single SQLite table. It migrates the schema lazily and exactly once per
//! store, maps records to and from rows (nullable fields and blobs
//! included), runs bulk writes in one transaction, and publishes a
//! [`DataItemsChange`](data_bake_core::DataItemsChange) after every
//! successful write so observers can patch their views incrementally.
//!
//! # Architecture
//!
//! The crate is organized into six modules:
//!
//! - **`schema`**: table names, the version table, the built-in migration plan
//! - **`migration`**: versioned migration with a cached tri-state outcome
//! - **`convert`**: `DataItem` ↔ SQL row transformations
//! - **`notify`**: store-owned publish/subscribe
//! - **`store`**: the public record store
//! - **`config`**: YAML-loadable connection settings
//!
//! # Quick start
//!
//! ```
//! use data_bake_core::DataItem;
//! use data_bake_sqlite::DataBakeStore;
//!
//! let store = DataBakeStore::open_in_memory().unwrap();
//! store.subscribe(|change| println!("{} inserted", change.inserted.len()));
//!
//! let saved = store.insert(vec![DataItem::new("Ciabatta", "wet dough")]).unwrap();
//! let id = saved[0].id.unwrap();
//! assert_eq!(store.get(id).unwrap().unwrap().title, "Ciabatta");
//! ```
//!
//! # Schema failures
//!
//! A failed migration is cached: every later call on the same store returns
//! the same [`StoreError::Schema`] without retrying, until
//! [`DataBakeStore::reset_schema_state`] is called.

mod config;
mod convert;
mod error;
mod migration;
mod notify;
mod schema;
mod store;

pub use config::{JournalMode, StoreConfig};
pub use convert::{COLUMNS, PREVIEW_COLUMNS, decode_item, decode_preview, encode_item};
pub use error::{Result, StoreError};
pub use migration::SchemaState;
pub use notify::{ChangeCallback, ChangeNotifier, SubscriptionId};
pub use schema::{ITEM_TABLE, MigrationStep, VERSION_TABLE, default_migrations};
pub use store::DataBakeStore;
