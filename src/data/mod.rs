//! Core data models for the challenge table
//!
//! This module contains the normalized dataset types shared by the cache,
//! the table engine and the export path, plus the upstream client and the
//! normalizer that produce them.

pub mod normalize;
pub mod remote;
pub mod sanitize;

pub use normalize::{DataNormalizer, ValidationError};
pub use remote::{DataSource, RawPayload, RemoteDataSource, TransportError};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Title shown when the upstream payload does not carry one
pub const DEFAULT_TITLE: &str = "Memberpress Challenge Table";

/// A field of the fixed row record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    FirstName,
    LastName,
    Email,
    /// Rendered display date
    Date,
    /// Raw unix timestamp behind `Date`, never shown as a column
    Timestamp,
}

impl Field {
    /// Fields exposed as table columns, in column order
    pub const VISIBLE: [Field; 5] = [
        Field::Id,
        Field::FirstName,
        Field::LastName,
        Field::Email,
        Field::Date,
    ];

    /// The wire/request key for this field
    pub fn key(self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::FirstName => "fname",
            Field::LastName => "lname",
            Field::Email => "email",
            Field::Date => "date",
            Field::Timestamp => "timestamp",
        }
    }

    /// Looks up a field by its wire key
    pub fn from_key(key: &str) -> Option<Field> {
        match key {
            "id" => Some(Field::Id),
            "fname" => Some(Field::FirstName),
            "lname" => Some(Field::LastName),
            "email" => Some(Field::Email),
            "date" => Some(Field::Date),
            "timestamp" => Some(Field::Timestamp),
            _ => None,
        }
    }

    /// Hidden fields are excluded from columns and search
    pub fn is_hidden(self) -> bool {
        matches!(self, Field::Timestamp)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One normalized table row
///
/// Every row carries the same key set; values that failed validation or were
/// missing upstream are `None` and serialize as `null`. Field order here is
/// the serialized key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub id: i64,
    pub fname: Option<String>,
    pub lname: Option<String>,
    pub email: Option<String>,
    pub date: Option<String>,
    pub timestamp: Option<i64>,
}

impl Row {
    /// Creates a row with only the identifier set
    pub fn new(id: i64) -> Self {
        Self {
            id,
            fname: None,
            lname: None,
            email: None,
            date: None,
            timestamp: None,
        }
    }

    /// String form of a field as shown to users, `None` when absent
    pub fn display_value(&self, field: Field) -> Option<String> {
        match field {
            Field::Id => Some(self.id.to_string()),
            Field::FirstName => self.fname.clone(),
            Field::LastName => self.lname.clone(),
            Field::Email => self.email.clone(),
            Field::Date => self.date.clone(),
            Field::Timestamp => self.timestamp.map(|ts| ts.to_string()),
        }
    }

    /// Comparable value of a field for sorting
    pub fn sort_key(&self, field: Field) -> SortKey<'_> {
        match field {
            Field::Id => SortKey::Int(self.id),
            Field::FirstName => SortKey::text(self.fname.as_deref()),
            Field::LastName => SortKey::text(self.lname.as_deref()),
            Field::Email => SortKey::text(self.email.as_deref()),
            Field::Date => SortKey::text(self.date.as_deref()),
            Field::Timestamp => self.timestamp.map_or(SortKey::Missing, SortKey::Int),
        }
    }

    /// Number of visible fields that hold a value
    pub fn present_visible_fields(&self) -> usize {
        Field::VISIBLE
            .iter()
            .filter(|field| self.display_value(**field).is_some())
            .count()
    }
}

/// Sort value of a single field; absent values order first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SortKey<'a> {
    Missing,
    Int(i64),
    Text(&'a str),
}

impl<'a> SortKey<'a> {
    fn text(value: Option<&'a str>) -> Self {
        value.map_or(SortKey::Missing, SortKey::Text)
    }
}

/// Column-count mismatch between the header labels and the first row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataShapeWarning {
    /// Number of header labels
    pub headers: usize,
    /// Number of visible fields per row
    pub fields: usize,
}

impl fmt::Display for DataShapeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "column - row count mismatch: {} header(s), {} field(s) in first row",
            self.headers, self.fields
        )
    }
}

/// The normalized, sanitized upstream table
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Dataset {
    /// Title to display, falling back to the default table title
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(DEFAULT_TITLE)
    }

    /// Label for a visible field, taken from `headers` by column position
    pub fn label_for(&self, field: Field) -> String {
        Field::VISIBLE
            .iter()
            .position(|f| *f == field)
            .and_then(|idx| self.headers.get(idx))
            .cloned()
            .unwrap_or_else(|| field.key().to_string())
    }

    /// Checks the header count against the fields of the first row
    ///
    /// Every row carries the full visible key set (absent values are `null`),
    /// so the first row always has [`Field::VISIBLE`]`.len()` fields. Returns
    /// `None` for an empty dataset or when the counts agree.
    pub fn shape_warning(&self) -> Option<DataShapeWarning> {
        self.rows.first()?;
        let fields = Field::VISIBLE.len();
        if fields == self.headers.len() {
            None
        } else {
            Some(DataShapeWarning {
                headers: self.headers.len(),
                fields,
            })
        }
    }
}
