//! Table view over a dataset: filtering, date facets, sorting and paging

mod engine;
mod facet;
mod query;

pub use engine::{columns, compare_rows, query, Column, ViewResult, SELECTOR_COLUMN};
pub use facet::{bucket_key, bucket_label, facet_options, row_bucket, FacetOption};
pub use query::{QueryParams, SortOrder, DEFAULT_ORDER_BY, DEFAULT_PER_PAGE};

/// Message shown when the filters leave no rows
pub const EMPTY_MESSAGE: &str = "Sorry, no people were found.";
