//! Record validation.
//!
//! Catches values that SQLite would silently alter on the way in, such as a
//! NaN rating (bound as `NULL`), a non-positive explicit id, or a timestamp
//! too far from the epoch to keep its microseconds, before they reach a
//! write.
//!
//! # Examples
//!
//! ```
//! use data_bake_core::*;
//!
//! let item = DataItem::new("Focaccia", "Olive oil, rosemary").with_rating(5.0);
//! assert!(validate_item(&item).is_empty());
//!
//! let bad = DataItem::new("Focaccia", "").with_rating(f64::NAN);
//! assert!(!validate_item(&bad).is_empty());
//! ```

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{DataItem, MAX_TIMESTAMP_SECONDS, timestamp_is_storable};

/// Record validation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// An explicit id is zero or negative.
    #[error("record id must be positive, got {0}")]
    NonPositiveId(i64),
    /// The rating is NaN or infinite.
    #[error("rating must be a finite number, got {0}")]
    NonFiniteRating(f64),
    /// A timestamp lies [`MAX_TIMESTAMP_SECONDS`] or more from the epoch.
    #[error(
        "{field} time {seconds}s is too far from the epoch to store exactly (limit is {}s)",
        MAX_TIMESTAMP_SECONDS
    )]
    UnrepresentableTimestamp { field: &'static str, seconds: i64 },
}

/// Validates a single record, returning every problem found.
pub fn validate_item(item: &DataItem) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(id) = item.id {
        if id <= 0 {
            errors.push(ValidationError::NonPositiveId(id));
        }
    }

    if let Some(rating) = item.rating {
        if !rating.is_finite() {
            errors.push(ValidationError::NonFiniteRating(rating));
        }
    }

    check_timestamp(&mut errors, "created", &item.created);
    if let Some(modified) = &item.modified {
        check_timestamp(&mut errors, "modified", modified);
    }

    errors
}

fn check_timestamp(errors: &mut Vec<ValidationError>, field: &'static str, ts: &DateTime<Utc>) {
    if !timestamp_is_storable(ts) {
        errors.push(ValidationError::UnrepresentableTimestamp {
            field,
            seconds: ts.timestamp(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn test_valid_item() {
        let item = DataItem::new("t", "c").with_rating(3.0).with_thumbnail(vec![1, 2]);
        assert!(validate_item(&item).is_empty());
    }

    #[test]
    fn test_infinite_rating() {
        let item = DataItem::new("t", "c").with_rating(f64::INFINITY);
        assert!(matches!(
            validate_item(&item).as_slice(),
            [ValidationError::NonFiniteRating(_)]
        ));
    }

    #[test]
    fn test_non_positive_id() {
        let mut item = DataItem::new("t", "c");
        item.id = Some(0);
        assert_eq!(validate_item(&item), vec![ValidationError::NonPositiveId(0)]);
    }

    #[test]
    fn test_modified_before_created_is_valid() {
        // Imported records may carry clock skew between the two stamps.
        let created = Utc.timestamp_opt(1_000, 0).unwrap();
        let item = DataItem::new("t", "c")
            .with_created(created)
            .with_modified(created - Duration::seconds(1));
        assert!(validate_item(&item).is_empty());
    }

    #[test]
    fn test_timestamp_limit_boundary() {
        let last = Utc
            .timestamp_opt(MAX_TIMESTAMP_SECONDS - 1, 999_999_000)
            .unwrap();
        assert!(validate_item(&DataItem::new("t", "c").with_created(last)).is_empty());

        let first_bad = Utc.timestamp_opt(MAX_TIMESTAMP_SECONDS, 0).unwrap();
        assert_eq!(
            validate_item(&DataItem::new("t", "c").with_created(first_bad)),
            vec![ValidationError::UnrepresentableTimestamp {
                field: "created",
                seconds: MAX_TIMESTAMP_SECONDS,
            }]
        );
    }

    #[test]
    fn test_far_future_modified_is_rejected() {
        let year_3000 = Utc.with_ymd_and_hms(3000, 1, 1, 0, 0, 0).unwrap();
        let item = DataItem::new("t", "c").with_modified(year_3000);
        assert!(matches!(
            validate_item(&item).as_slice(),
            [ValidationError::UnrepresentableTimestamp { field: "modified", .. }]
        ));
    }

    #[test]
    fn test_far_past_created_is_rejected() {
        let created = Utc.timestamp_opt(-MAX_TIMESTAMP_SECONDS, 0).unwrap();
        let item = DataItem::new("t", "c").with_created(created);
        assert_eq!(validate_item(&item).len(), 1);
    }

    #[test]
    fn test_modified_at_epoch_is_valid() {
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        let item = DataItem::new("t", "c").with_created(epoch).with_modified(epoch);
        assert!(validate_item(&item).is_empty());
    }
}
