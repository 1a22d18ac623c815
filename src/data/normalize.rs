//! Normalization of the raw upstream payload into a [`Dataset`]
//!
//! The upstream shape is:
//!
//! ```json
//! {
//!   "title": "This amazing table",
//!   "data": {
//!     "headers": ["ID", "First Name", "Last Name", "Email", "Date"],
//!     "rows": {
//!       "1": { "id": 66, "fname": "Chris", "lname": "Test", "email": "chris@test.com", "date": 1552944355 }
//!     }
//!   }
//! }
//! ```
//!
//! Only a structurally absent `data`/`headers`/`rows` shape is an error;
//! malformed rows are kept with the offending fields empty.

use chrono::DateTime;
use log::{debug, warn};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt::Write;
use thiserror::Error;

use super::sanitize::{email_field, int_field, sanitize_text, text_field};
use super::{Dataset, Field, RawPayload, Row};
use crate::logging::DIAGNOSTICS_TARGET;

/// Default display date format ("March 18, 2019")
pub const DEFAULT_DATE_FORMAT: &str = "%B %-d, %Y";

/// Errors raised when the payload cannot be mapped onto the dataset shape
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Body is not valid JSON
    #[error("Failed to parse upstream payload: {0}")]
    InvalidJson(String),

    /// Top-level value is not a JSON object
    #[error("Upstream payload is not a JSON object")]
    NotAnObject,

    /// A required section is missing or has the wrong type
    #[error("Missing expected section in payload: {0}")]
    MissingSection(&'static str),
}

/// Converts raw payloads into sanitized datasets
#[derive(Debug, Clone)]
pub struct DataNormalizer {
    date_format: String,
}

impl Default for DataNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl DataNormalizer {
    /// Creates a normalizer using the default display date format
    pub fn new() -> Self {
        Self {
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }

    /// Uses a custom strftime format for rendered dates
    pub fn with_date_format(mut self, date_format: impl Into<String>) -> Self {
        self.date_format = date_format.into();
        self
    }

    /// Parses and normalizes a raw payload
    ///
    /// # Arguments
    /// * `raw` - The upstream response body
    ///
    /// # Returns
    /// * `Ok(Dataset)` with sanitized fields; malformed rows are kept with
    ///   empty fields, rows without a valid id are dropped
    /// * `Err(ValidationError)` if the body is not a JSON object or a
    ///   required section is missing
    pub fn normalize(&self, raw: &RawPayload) -> Result<Dataset, ValidationError> {
        let value: Value = serde_json::from_str(&raw.body)
            .map_err(|e| ValidationError::InvalidJson(e.to_string()))?;
        self.normalize_value(&value)
    }

    /// Normalizes an already parsed payload
    pub fn normalize_value(&self, value: &Value) -> Result<Dataset, ValidationError> {
        let root = value.as_object().ok_or(ValidationError::NotAnObject)?;

        let title = root
            .get("title")
            .and_then(Value::as_str)
            .map(sanitize_text)
            .filter(|t| !t.is_empty());

        let data = root
            .get("data")
            .and_then(Value::as_object)
            .ok_or(ValidationError::MissingSection("data"))?;
        let headers = data
            .get("headers")
            .and_then(Value::as_array)
            .ok_or(ValidationError::MissingSection("headers"))?;
        let raw_rows = data.get("rows").ok_or(ValidationError::MissingSection("rows"))?;

        let headers = self.normalize_headers(headers);
        let rows = match raw_rows {
            Value::Object(map) => self.rows_from_map(map),
            Value::Array(list) => self.rows_from_list(list),
            _ => return Err(ValidationError::MissingSection("rows")),
        };
        let rows = dedupe_ids(rows);

        let dataset = Dataset {
            title,
            headers,
            rows,
        };

        if let Some(warning) = dataset.shape_warning() {
            warn!(target: DIAGNOSTICS_TARGET, "{} (DataNormalizer::normalize)", warning);
        }
        debug!(
            "normalized dataset: {} header(s), {} row(s)",
            dataset.headers.len(),
            dataset.rows.len()
        );

        Ok(dataset)
    }

    fn normalize_headers(&self, headers: &[Value]) -> Vec<String> {
        headers
            .iter()
            .enumerate()
            .filter_map(|(idx, label)| {
                let clean = label.as_str().map(sanitize_text).filter(|s| !s.is_empty());
                if clean.is_none() {
                    warn!(
                        target: DIAGNOSTICS_TARGET,
                        "dropping header #{}: not a non-empty string",
                        idx
                    );
                }
                clean
            })
            .collect()
    }

    /// Rows keyed `"1"..="len"`; index 0 is never consumed
    fn rows_from_map(&self, map: &Map<String, Value>) -> Vec<Row> {
        for key in unread_row_keys(map) {
            warn!(
                target: DIAGNOSTICS_TARGET,
                "row key '{}' is outside 1..={}, dropped",
                key,
                map.len()
            );
        }
        (1..=map.len())
            .filter_map(|index| match map.get(&index.to_string()) {
                Some(raw) => self.normalize_row(index, raw),
                None => {
                    debug!("rows: index {} not present, skipping", index);
                    None
                }
            })
            .collect()
    }

    fn rows_from_list(&self, list: &[Value]) -> Vec<Row> {
        list.iter()
            .enumerate()
            .filter_map(|(pos, raw)| self.normalize_row(pos + 1, raw))
            .collect()
    }

    /// Coerces one raw row onto the fixed field set
    ///
    /// Returns `None` only when `id` is missing or invalid.
    fn normalize_row(&self, index: usize, raw: &Value) -> Option<Row> {
        let Some(fields) = raw.as_object() else {
            warn!(target: DIAGNOSTICS_TARGET, "row {}: not an object, dropped", index);
            return None;
        };

        let Some(id) = fields.get("id").and_then(int_field) else {
            warn!(target: DIAGNOSTICS_TARGET, "row {}: missing or invalid id, dropped", index);
            return None;
        };

        let timestamp = fields.get("date").and_then(int_field);
        let row = Row {
            id,
            fname: fields.get("fname").and_then(text_field),
            lname: fields.get("lname").and_then(text_field),
            email: fields.get("email").and_then(email_field),
            date: timestamp.map(|ts| self.render_date(ts)),
            timestamp,
        };

        if row.present_visible_fields() < Field::VISIBLE.len() {
            debug!("row {} (id {}): incomplete after validation", index, id);
        }
        Some(row)
    }

    /// Renders a unix timestamp with the configured format (UTC)
    pub fn render_date(&self, timestamp: i64) -> String {
        let Some(datetime) = DateTime::from_timestamp(timestamp, 0) else {
            return timestamp.to_string();
        };
        let mut rendered = String::new();
        if write!(rendered, "{}", datetime.format(&self.date_format)).is_err() {
            return timestamp.to_string();
        }
        rendered
    }
}

/// Keys of a row map that the `1..=len` walk never reads
fn unread_row_keys(map: &Map<String, Value>) -> Vec<&str> {
    let len = map.len();
    map.keys()
        .filter(|key| !key.parse::<usize>().is_ok_and(|index| (1..=len).contains(&index)))
        .map(String::as_str)
        .collect()
}

/// Keeps the first row for each id; ids select rows for export
fn dedupe_ids(rows: Vec<Row>) -> Vec<Row> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| {
            let first = seen.insert(row.id);
            if !first {
                warn!(target: DIAGNOSTICS_TARGET, "duplicate id {}, row dropped", row.id);
            }
            first
        })
        .collect()
}
