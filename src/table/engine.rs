//! In-memory query engine over a dataset
//!
//! Pipeline, in order: search filter, date-facet filter, facet option
//! derivation (from the unfiltered rows), stable sort, pagination, column
//! projection.

use serde::Serialize;
use std::cmp::Ordering;

use super::facet::{facet_options, row_bucket, FacetOption};
use super::query::{QueryParams, SortOrder};
use crate::data::{Dataset, Field, Row};

/// Key of the synthetic row-selector column
pub const SELECTOR_COLUMN: &str = "cb";

/// A column of the rendered table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub key: String,
    pub label: String,
    pub sortable: bool,
}

impl Column {
    fn selector() -> Self {
        Self {
            key: SELECTOR_COLUMN.to_string(),
            label: String::new(),
            sortable: false,
        }
    }
}

/// One page of a filtered, sorted dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewResult {
    pub title: String,
    pub columns: Vec<Column>,
    /// Rows of the current page only
    pub rows: Vec<Row>,
    /// Filtered row count before pagination
    pub total_items: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
    /// Date filter choices derived from all rows
    pub date_facet_options: Vec<FacetOption>,
}

impl ViewResult {
    /// Whether the filters left nothing to show
    pub fn is_empty(&self) -> bool {
        self.total_items == 0
    }
}

/// Resolves a sort key; `date` sorts by the hidden timestamp
fn sort_field(order_by: &str) -> Option<Field> {
    match Field::from_key(order_by)? {
        Field::Date => Some(Field::Timestamp),
        field => Some(field),
    }
}

/// Whether any visible field contains `needle` (already lowercased)
fn matches_search(row: &Row, needle: &str) -> bool {
    Field::VISIBLE.iter().any(|field| {
        row.display_value(*field)
            .map(|value| value.to_lowercase().contains(needle))
            .unwrap_or(false)
    })
}

/// Columns shown for `dataset`: the selector, then every visible field
pub fn columns(dataset: &Dataset) -> Vec<Column> {
    std::iter::once(Column::selector())
        .chain(Field::VISIBLE.iter().map(|field| Column {
            key: field.key().to_string(),
            label: dataset.label_for(*field),
            sortable: true,
        }))
        .collect()
}

/// Runs `params` against `dataset`
///
/// # Arguments
/// * `dataset` - The full normalized dataset
/// * `params` - Search, date facet, sort and page window
///
/// # Returns
/// The requested page with column metadata, the filtered row count and the
/// date facet options of the unfiltered rows. An empty dataset or a page past
/// the end yields an empty page, never an error.
pub fn query(dataset: &Dataset, params: &QueryParams) -> ViewResult {
    let mut rows: Vec<&Row> = dataset.rows.iter().collect();

    if !params.search.is_empty() {
        let needle = params.search.to_lowercase();
        rows.retain(|row| matches_search(row, &needle));
    }

    if !params.date_facet.is_empty() {
        rows.retain(|row| row_bucket(row).as_deref() == Some(params.date_facet.as_str()));
    }

    let date_facet_options = facet_options(&dataset.rows);

    // slice::sort_by is stable; reversing the comparator keeps ties in order
    rows.sort_by(|a, b| {
        let ord = compare_rows(a, b, &params.order_by);
        match params.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });

    let total_items = rows.len();
    let per_page = params.per_page.max(1);
    let page = params.page.max(1);
    let start = (page - 1).saturating_mul(per_page);
    let page_rows: Vec<Row> = rows
        .into_iter()
        .skip(start)
        .take(per_page)
        .cloned()
        .collect();

    ViewResult {
        title: dataset.display_title().to_string(),
        columns: columns(dataset),
        rows: page_rows,
        total_items,
        page,
        per_page,
        total_pages: total_items.div_ceil(per_page),
        date_facet_options,
    }
}

/// Compares two rows on `order_by` the way [`query`] sorts them
pub fn compare_rows(a: &Row, b: &Row, order_by: &str) -> Ordering {
    sort_field(order_by)
        .map(|field| a.sort_key(field).cmp(&b.sort_key(field)))
        .unwrap_or(Ordering::Equal)
}
