//! Change events describing the net effect of one mutating store call.
//!
//! A [`DataItemsChange`] is built right after a write commits, handed to
//! every current observer once, and then dropped. Observers holding a list
//! of [`DataItemPreview`]s can patch it in place with
//! [`DataItemsChange::apply_to_previews`] instead of re-querying.
//!
//! # Example
//!
//! ```
//! use data_bake_core::*;
//!
//! let mut previews = vec![
//!     DataItemPreview { id: 1, title: "apple".into() },
//!     DataItemPreview { id: 2, title: "banana".into() },
//! ];
//!
//! let change = DataItemsChange::deleted_ids([1]);
//! change.apply_to_previews(&mut previews);
//! assert_eq!(previews.len(), 1);
//! assert_eq!(previews[0].id, 2);
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{DataItem, DataItemPreview};

/// Which records a delete removed.
///
/// `All` is reported when the table was cleared without an id filter, so
/// observers never receive a possibly stale explicit id list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletedItems {
    /// Only the listed ids were removed.
    Ids(BTreeSet<i64>),
    /// Every record was removed.
    All,
}

impl Default for DeletedItems {
    fn default() -> Self {
        DeletedItems::Ids(BTreeSet::new())
    }
}

impl DeletedItems {
    /// Returns `true` if `id` is covered by this delete.
    pub fn contains(&self, id: i64) -> bool {
        match self {
            DeletedItems::Ids(ids) => ids.contains(&id),
            DeletedItems::All => true,
        }
    }

    /// Returns `true` if nothing was deleted.
    pub fn is_empty(&self) -> bool {
        matches!(self, DeletedItems::Ids(ids) if ids.is_empty())
    }
}

/// The inserts, updates and deletes produced by one mutating call.
///
/// # Examples
///
/// ```
/// use data_bake_core::{DataItem, DataItemsChange, DeletedItems};
///
/// let change = DataItemsChange::deleted_all();
/// assert_eq!(change.deleted, DeletedItems::All);
/// assert!(change.inserted.is_empty());
/// assert!(!change.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataItemsChange {
    /// Newly inserted records with their assigned ids, in insertion order.
    pub inserted: Vec<DataItem>,
    /// Updated records keyed by id, as `(old, new)` pairs.
    pub updated: BTreeMap<i64, (DataItem, DataItem)>,
    /// Removed records.
    pub deleted: DeletedItems,
}

impl DataItemsChange {
    /// Builds an insert-only change.
    pub fn inserted(items: Vec<DataItem>) -> Self {
        Self {
            inserted: items,
            ..Default::default()
        }
    }

    /// Builds a single-record update change keyed by `id`.
    pub fn updated(id: i64, old: DataItem, new: DataItem) -> Self {
        let mut updated = BTreeMap::new();
        updated.insert(id, (old, new));
        Self {
            updated,
            ..Default::default()
        }
    }

    /// Builds a delete change for an explicit id set.
    pub fn deleted_ids(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            deleted: DeletedItems::Ids(ids.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Builds a delete change for a cleared table.
    pub fn deleted_all() -> Self {
        Self {
            deleted: DeletedItems::All,
            ..Default::default()
        }
    }

    /// Returns `true` if the change carries no inserts, updates or deletes.
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Patches a preview list in place.
    ///
    /// Deletes are applied first, then updated titles, then inserted
    /// records are appended in insertion order. Updates for ids not in the
    /// list are ignored; the list may be a filtered view.
    ///
    /// # Examples
    ///
    /// ```
    /// use data_bake_core::*;
    ///
    /// let mut previews = vec![DataItemPreview { id: 1, title: "old".into() }];
    ///
    /// let mut old = DataItem::new("old", "");
    /// old.id = Some(1);
    /// let mut new = old.clone();
    /// new.title = "new".into();
    ///
    /// DataItemsChange::updated(1, old, new).apply_to_previews(&mut previews);
    /// assert_eq!(previews[0].title, "new");
    /// ```
    pub fn apply_to_previews(&self, previews: &mut Vec<DataItemPreview>) {
        match &self.deleted {
            DeletedItems::All => previews.clear(),
            DeletedItems::Ids(ids) if !ids.is_empty() => {
                previews.retain(|p| !ids.contains(&p.id));
            }
            DeletedItems::Ids(_) => {}
        }

        for preview in previews.iter_mut() {
            if let Some((_, new)) = self.updated.get(&preview.id) {
                preview.title.clone_from(&new.title);
            }
        }

        previews.extend(self.inserted.iter().filter_map(DataItem::preview));
    }
}
