//! Core record and change-event types for the DataBake store.
//!
//! This crate defines the values that flow through the store without
//! depending on any database:
//!
//! - [`DataItem`]: the persisted record.
//! - [`DataItemPreview`]: an id + title projection for list rendering.
//! - [`DataItemsChange`]: the inserts, updates and deletes produced by one
//!   mutating store call, with [`DeletedItems`] distinguishing an explicit
//!   id set from a cleared table.
//!
//! Validation ([`validate_item`]) rejects records SQLite would store
//! differently from how they were written.
//!
//! # Example
//!
//! ```
//! use data_bake_core::*;
//!
//! let item = DataItem::new("Baguette", "Poolish overnight").with_rating(4.0);
//! assert!(validate_item(&item).is_empty());
//!
//! let mut previews = Vec::new();
//! let mut saved = item.clone();
//! saved.id = Some(1);
//! DataItemsChange::inserted(vec![saved]).apply_to_previews(&mut previews);
//! assert_eq!(previews[0].title, "Baguette");
//! ```

mod change;
mod types;
mod validate;

pub use change::{DataItemsChange, DeletedItems};
pub use types::*;
pub use validate::{ValidationError, validate_item};
