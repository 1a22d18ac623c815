//! Request parameter access for the adapters
//!
//! Parameters come from a URL query string. A missing or empty scalar reads
//! as absent, scalar values have HTML tags stripped, and repeated keys or
//! `key[]` keys read as lists.

use url::form_urlencoded;

use crate::data::sanitize::sanitize_text;

/// Decoded request parameters, in arrival order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    pairs: Vec<(String, String)>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes an `application/x-www-form-urlencoded` query string
    ///
    /// A leading `?` is ignored.
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self {
            pairs: form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        }
    }

    /// Adds a parameter
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((key.into(), value.into()));
        self
    }

    /// Last value of `key`, sanitized; `None` when missing or empty
    pub fn get(&self, key: &str) -> Option<String> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| sanitize_text(v))
            .filter(|v| !v.is_empty())
    }

    /// All values of `key` or `key[]`, sanitized, empty values skipped
    pub fn get_all(&self, key: &str) -> Vec<String> {
        let list_key = format!("{}[]", key);
        self.pairs
            .iter()
            .filter(|(k, _)| *k == key || *k == list_key)
            .map(|(_, v)| sanitize_text(v))
            .filter(|v| !v.is_empty())
            .collect()
    }

    /// Whether `key` is set to `1`
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).as_deref() == Some("1")
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
