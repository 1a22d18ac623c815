//! Table query parameters

use serde::Serialize;
use std::fmt;

use crate::request::RequestParams;

/// Default number of rows per page
pub const DEFAULT_PER_PAGE: usize = 5;

/// Default sort column
pub const DEFAULT_ORDER_BY: &str = "id";

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Parses `asc`/`desc` (case-insensitive); anything else is `None`
    pub fn parse(s: &str) -> Option<SortOrder> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => f.write_str("asc"),
            SortOrder::Desc => f.write_str("desc"),
        }
    }
}

/// Caller-supplied view parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    /// Free-text search; empty disables filtering
    pub search: String,
    /// `Mon-YYYY` bucket key; empty means all dates
    pub date_facet: String,
    /// Field key to sort by; `date` sorts by the hidden timestamp
    pub order_by: String,
    pub order: SortOrder,
    /// 1-based page number
    pub page: usize,
    pub per_page: usize,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            search: String::new(),
            date_facet: String::new(),
            order_by: DEFAULT_ORDER_BY.to_string(),
            order: SortOrder::Asc,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl QueryParams {
    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn date_facet(mut self, facet: impl Into<String>) -> Self {
        self.date_facet = facet.into();
        self
    }

    pub fn order_by(mut self, key: impl Into<String>, order: SortOrder) -> Self {
        self.order_by = key.into();
        self.order = order;
        self
    }

    /// Sets the page window; zero values fall back to the defaults
    pub fn page(mut self, page: usize, per_page: usize) -> Self {
        self.page = if page == 0 { 1 } else { page };
        self.per_page = if per_page == 0 { DEFAULT_PER_PAGE } else { per_page };
        self
    }

    /// Maps request parameters (`s`, `date-filter`, `orderby`, `order`,
    /// `paged`, `per_page`) onto query params
    ///
    /// Missing, empty or unparsable values take their defaults.
    pub fn from_request(params: &RequestParams, default_per_page: usize) -> Self {
        let positive = |key: &str| {
            params
                .get(key)
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|n| *n > 0)
        };
        let default_per_page = if default_per_page == 0 {
            DEFAULT_PER_PAGE
        } else {
            default_per_page
        };

        Self {
            search: params.get("s").unwrap_or_default(),
            date_facet: params.get("date-filter").unwrap_or_default(),
            order_by: params
                .get("orderby")
                .unwrap_or_else(|| DEFAULT_ORDER_BY.to_string()),
            order: params
                .get("order")
                .and_then(|o| SortOrder::parse(&o))
                .unwrap_or_default(),
            page: positive("paged").unwrap_or(1),
            per_page: positive("per_page").unwrap_or(default_per_page),
        }
    }
}
