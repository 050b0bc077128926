//! Bidirectional conversion between [`DataItem`] and SQLite rows.
//!
//! Encoding produces one [`Value`] per entry of [`COLUMNS`], in that order,
//! with an explicit [`Value::Null`] for every absent optional field. Decoding
//! reads by ordinal starting at a caller-supplied offset, so a projection
//! that starts mid-row (for example after a computed column) can reuse the
//! same decoder.
//!
//! # Timestamps
//!
//! `created` and `modified` are stored as `REAL` seconds since the Unix
//! epoch. `modified` is a true nullable column: `NULL` decodes to `None` and
//! `0.0` decodes to the epoch itself.

use chrono::{DateTime, TimeZone, Utc};
use data_bake_core::{DataItem, DataItemPreview};
use rusqlite::Row;
use rusqlite::types::{FromSql, Value};

use crate::error::{Result, StoreError};

/// Columns of the `DataItem` table in encode/decode order.
pub const COLUMNS: [&str; 7] = [
    "id",
    "title",
    "created",
    "modified",
    "contents",
    "rating",
    "thumbnail",
];

/// Columns of the preview projection.
pub const PREVIEW_COLUMNS: [&str; 2] = ["id", "title"];

/// Converts a timestamp to seconds since the epoch.
pub(crate) fn timestamp_to_sql(ts: &DateTime<Utc>) -> f64 {
    ts.timestamp_micros() as f64 / 1_000_000.0
}

/// Converts seconds since the epoch back to a timestamp, rounding to the
/// nearest microsecond.
pub(crate) fn timestamp_from_sql(value: f64, column: &'static str) -> Result<DateTime<Utc>> {
    let micros = (value * 1_000_000.0).round();
    if !micros.is_finite() || micros.abs() >= i64::MAX as f64 {
        return Err(StoreError::InvalidTimestamp { column, value });
    }
    Utc.timestamp_micros(micros as i64)
        .single()
        .ok_or(StoreError::InvalidTimestamp { column, value })
}

/// Encodes a record into one SQL value per entry of [`COLUMNS`].
///
/// An unsaved record encodes its id as `NULL`, which lets SQLite assign
/// the next `AUTOINCREMENT` key on insert.
pub fn encode_item(item: &DataItem) -> Vec<Value> {
    vec![
        item.id.map_or(Value::Null, Value::Integer),
        Value::Text(item.title.clone()),
        Value::Real(timestamp_to_sql(&item.created)),
        item.modified
            .as_ref()
            .map_or(Value::Null, |ts| Value::Real(timestamp_to_sql(ts))),
        Value::Text(item.contents.clone()),
        item.rating.map_or(Value::Null, Value::Real),
        item.thumbnail.clone().map_or(Value::Null, Value::Blob),
    ]
}

/// Decodes a record whose [`COLUMNS`] start at ordinal `offset`.
///
/// # Errors
///
/// Returns [`StoreError::MissingColumn`] if `id`, `title`, `created` or
/// `contents` is `NULL`.
pub fn decode_item(row: &Row<'_>, offset: usize) -> Result<DataItem> {
    let id: i64 = required(row, offset, "id")?;
    let title: String = required(row, offset + 1, "title")?;
    let created: f64 = required(row, offset + 2, "created")?;
    let modified: Option<f64> = row.get(offset + 3)?;
    let contents: String = required(row, offset + 4, "contents")?;
    let rating: Option<f64> = row.get(offset + 5)?;
    let thumbnail: Option<Vec<u8>> = row.get(offset + 6)?;

    Ok(DataItem {
        id: Some(id),
        title,
        created: timestamp_from_sql(created, "created")?,
        modified: modified
            .map(|secs| timestamp_from_sql(secs, "modified"))
            .transpose()?,
        contents,
        rating,
        thumbnail,
    })
}

/// Decodes a preview whose [`PREVIEW_COLUMNS`] start at ordinal `offset`.
pub fn decode_preview(row: &Row<'_>, offset: usize) -> Result<DataItemPreview> {
    Ok(DataItemPreview {
        id: required(row, offset, "id")?,
        title: required(row, offset + 1, "title")?,
    })
}

/// Reads a column that must not be `NULL`.
fn required<T: FromSql>(row: &Row<'_>, index: usize, column: &'static str) -> Result<T> {
    row.get::<_, Option<T>>(index)?
        .ok_or(StoreError::MissingColumn { column })
}
