//! Record type definitions for the DataBake store.
//!
//! This module defines the persisted [`DataItem`] record and its lightweight
//! [`DataItemPreview`] projection. The types are plain values with no
//! back-references to the store that produced them, and they serialize with
//! [`serde`] so observers can forward them elsewhere.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Number of fractional-second digits kept on record timestamps.
///
/// Timestamps are persisted as `REAL` seconds since the Unix epoch, and six
/// digits is the finest precision that survives that encoding exactly within
/// [`MAX_TIMESTAMP_SECONDS`] of the epoch.
pub const TIMESTAMP_PRECISION_DIGITS: u16 = 6;

/// Bound on the distance from the epoch, in whole seconds, of a storable
/// timestamp (2^32 seconds, early 2106 on either side of 1970).
///
/// Below it a `REAL` column carries every microsecond exactly; further out
/// the double's spacing exceeds half a microsecond and decoding can drift.
pub const MAX_TIMESTAMP_SECONDS: i64 = 1 << 32;

/// Whether `ts` survives `REAL` storage at microsecond precision.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use data_bake_core::{MAX_TIMESTAMP_SECONDS, timestamp_is_storable};
///
/// assert!(timestamp_is_storable(&Utc.timestamp_opt(MAX_TIMESTAMP_SECONDS - 1, 0).unwrap()));
/// assert!(!timestamp_is_storable(&Utc.timestamp_opt(MAX_TIMESTAMP_SECONDS, 0).unwrap()));
/// ```
pub fn timestamp_is_storable(ts: &DateTime<Utc>) -> bool {
    ts.timestamp().abs() < MAX_TIMESTAMP_SECONDS
}

/// Returns the current time truncated to [`TIMESTAMP_PRECISION_DIGITS`].
///
/// # Examples
///
/// ```
/// use data_bake_core::now_timestamp;
///
/// let now = now_timestamp();
/// assert_eq!(now.timestamp_subsec_nanos() % 1_000, 0);
/// ```
pub fn now_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(TIMESTAMP_PRECISION_DIGITS)
}

/// The sole persisted entity.
///
/// `id` is `None` until the store assigns one on first insert and never
/// changes afterwards. `title`, `contents` and `created` are always present
/// in storage; the remaining fields are nullable columns.
///
/// # Examples
///
/// ```
/// use data_bake_core::DataItem;
///
/// let item = DataItem::new("Sourdough", "Feed the starter twice a day")
///     .with_rating(4.5);
/// assert!(item.id.is_none());
/// assert!(item.modified.is_none());
/// assert_eq!(item.rating, Some(4.5));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataItem {
    /// Store-assigned primary key; `None` before insertion.
    pub id: Option<i64>,
    /// Display title, matched by prefix searches.
    pub title: String,
    /// Creation time.
    pub created: DateTime<Utc>,
    /// Last explicit modification time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    /// Free-form body text.
    pub contents: String,
    /// Optional user rating.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    /// Optional thumbnail image bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Vec<u8>>,
}

impl DataItem {
    /// Creates an unsaved record stamped with the current time.
    pub fn new(title: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            created: now_timestamp(),
            modified: None,
            contents: contents.into(),
            rating: None,
            thumbnail: None,
        }
    }

    /// Replaces the creation time, truncated to the stored precision.
    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = created.trunc_subsecs(TIMESTAMP_PRECISION_DIGITS);
        self
    }

    /// Sets the modification time, truncated to the stored precision.
    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified.trunc_subsecs(TIMESTAMP_PRECISION_DIGITS));
        self
    }

    /// Sets the rating.
    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    /// Sets the thumbnail bytes.
    pub fn with_thumbnail(mut self, thumbnail: impl Into<Vec<u8>>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    /// Stamps `modified` with the current time.
    ///
    /// The store never does this on its own; callers touch a record before
    /// handing it to an update.
    pub fn touch(&mut self) {
        self.modified = Some(now_timestamp());
    }

    /// Returns the list projection of a persisted record.
    ///
    /// Unsaved records have no id and therefore no preview.
    ///
    /// # Examples
    ///
    /// ```
    /// use data_bake_core::DataItem;
    ///
    /// let mut item = DataItem::new("Rye", "70% hydration");
    /// assert!(item.preview().is_none());
    ///
    /// item.id = Some(7);
    /// let preview = item.preview().unwrap();
    /// assert_eq!(preview.id, 7);
    /// assert_eq!(preview.title, "Rye");
    /// ```
    pub fn preview(&self) -> Option<DataItemPreview> {
        self.id.map(|id| DataItemPreview {
            id,
            title: self.title.clone(),
        })
    }
}

/// Projection of a [`DataItem`] carrying only its id and title.
///
/// List displays load previews so they never materialize full records
/// (including thumbnails) just to render a row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataItemPreview {
    /// Primary key of the underlying record.
    pub id: i64,
    /// Title of the underlying record.
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_item_has_no_id_or_optionals() {
        let item = DataItem::new("title", "body");
        assert_eq!(item.id, None);
        assert_eq!(item.modified, None);
        assert_eq!(item.rating, None);
        assert_eq!(item.thumbnail, None);
    }

    #[test]
    fn test_with_created_truncates_to_micros() {
        let ts = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let item = DataItem::new("t", "c").with_created(ts);
        assert_eq!(item.created.timestamp(), 1_700_000_000);
        assert_eq!(item.created.timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn test_touch_sets_modified() {
        let mut item = DataItem::new("t", "c");
        item.touch();
        assert!(item.modified.is_some());
    }

    #[test]
    fn test_serde_skips_absent_optionals() {
        let mut item = DataItem::new("t", "c")
            .with_created(Utc.timestamp_opt(0, 0).unwrap());
        item.id = Some(1);
        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("modified").is_none());
        assert!(json.get("thumbnail").is_none());

        let restored: DataItem = serde_json::from_value(json).unwrap();
        assert_eq!(restored, item);
    }
}
