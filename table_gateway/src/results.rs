//! Command result shapes

use crate::row::Row;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use type_mapping::SqlValue;

/// Outcome of an insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddResult {
    /// A generated single-column key
    Inserted(i64),
    /// No generated key available; affected row count instead
    Affected(u64),
}

/// Outcome of a delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Refused: no condition was given and none could be derived
    Refused,
    /// Rows removed
    Deleted(u64),
}

/// Outcome of a counter write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterWrite {
    /// Absorbed into the lazy-write buffer, no statement issued
    Buffered,
    /// Written through, with the affected row count
    Applied(u64),
}

/// A select result, possibly re-keyed by an index directive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResultSet {
    /// Plain ordered rows
    Rows(Vec<Row>),
    /// Rows keyed by a column's textual value
    RowIndex(IndexMap<String, Row>),
    /// One projected column keyed by another column's textual value
    ValueIndex(IndexMap<String, SqlValue>),
}

impl ResultSet {
    pub fn len(&self) -> usize {
        match self {
            ResultSet::Rows(rows) => rows.len(),
            ResultSet::RowIndex(map) => map.len(),
            ResultSet::ValueIndex(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shape of a `get_field` result, chosen by the separator mode
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValues {
    /// Single value from the first matching row
    Scalar(SqlValue),
    /// One column across every matching row
    List(Vec<SqlValue>),
    /// First requested column keys the second (or a joined projection)
    Map(IndexMap<String, SqlValue>),
}

/// Multi-row behavior of `get_field`
#[derive(Debug, Clone, PartialEq)]
pub enum Separator {
    /// First row only
    None,
    /// Every row
    All,
    /// At most this many rows
    Limit(u64),
    /// Every row, remaining columns joined with this glue string
    Glue(String),
}
