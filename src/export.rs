//! Bulk export of selected rows
//!
//! Selection always works on the full dataset in its original order, never on
//! the sorted or filtered view the ids were picked from.

use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::collections::HashSet;
use thiserror::Error;

use crate::data::{Dataset, Field, Row};

/// Export requested with no row selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("You must select at least one item to perform the operation!")]
pub struct EmptySelectionError;

/// CSV rendering failed
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV output is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Rows of `dataset` whose id is in `selected_ids`, in dataset order
///
/// An empty selection is an error even when the dataset itself is empty.
/// Ids that match no row are ignored.
pub fn select_for_export(
    dataset: &Dataset,
    selected_ids: &HashSet<i64>,
) -> Result<Vec<Row>, EmptySelectionError> {
    if selected_ids.is_empty() {
        return Err(EmptySelectionError);
    }
    Ok(dataset
        .rows
        .iter()
        .filter(|row| selected_ids.contains(&row.id))
        .cloned()
        .collect())
}

/// Parses selector values into row ids, skipping anything non-numeric
pub fn parse_ids<I, S>(values: I) -> HashSet<i64>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .filter_map(|v| v.as_ref().trim().parse::<i64>().ok())
        .collect()
}

/// Renders `rows` as CSV: a header row of column labels, then one line per
/// row, every value quoted and lines ending in CRLF
///
/// The hidden timestamp is not exported; dates use their display form.
pub fn to_csv(dataset: &Dataset, rows: &[Row]) -> Result<String, ExportError> {
    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::CRLF)
        .from_writer(Vec::new());

    let header: Vec<String> = Field::VISIBLE.iter().map(|f| dataset.label_for(*f)).collect();
    wtr.write_record(&header)?;

    for row in rows {
        let record: Vec<String> = Field::VISIBLE
            .iter()
            .map(|f| row.display_value(*f).unwrap_or_default())
            .collect();
        wtr.write_record(&record)?;
    }

    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}
