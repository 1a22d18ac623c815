//! Month-year date buckets used by the date filter

use chrono::DateTime;
use serde::Serialize;

use crate::data::Row;

/// Format of a bucket key, e.g. `Mar-2019`
const BUCKET_FORMAT: &str = "%b-%Y";

/// One entry of the date filter dropdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetOption {
    /// Bucket key sent back as the `date-filter` value
    pub key: String,
    /// Human label, e.g. `Mar 2019`
    pub label: String,
}

/// Truncates a unix timestamp to its `Mon-YYYY` bucket (UTC)
pub fn bucket_key(timestamp: i64) -> Option<String> {
    DateTime::from_timestamp(timestamp, 0).map(|dt| dt.format(BUCKET_FORMAT).to_string())
}

/// Bucket of a row, `None` when the row has no valid timestamp
pub fn row_bucket(row: &Row) -> Option<String> {
    row.timestamp.and_then(bucket_key)
}

/// Display label for a bucket key
pub fn bucket_label(key: &str) -> String {
    key.replace('-', " ")
}

/// Distinct buckets of `rows`, in order of first appearance
pub fn facet_options(rows: &[Row]) -> Vec<FacetOption> {
    let mut options: Vec<FacetOption> = Vec::new();
    for key in rows.iter().filter_map(row_bucket) {
        if !options.iter().any(|opt| opt.key == key) {
            options.push(FacetOption {
                label: bucket_label(&key),
                key,
            });
        }
    }
    options
}
