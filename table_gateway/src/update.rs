//! Update payloads
//!
//! This module defines the per-field update operations carried by a
//! save call, including the relative forms used by counter writes.

use crate::row::Row;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use type_mapping::SqlValue;

/// Update operation applied to a single field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldUpdate {
    /// Set field to a specific value: field = $N
    Set(SqlValue),

    /// Increment field by a value: field = field + $N
    Increment(SqlValue),

    /// Decrement field by a value: field = field - $N
    Decrement(SqlValue),
}

impl FieldUpdate {
    /// Generate the SET fragment for this operation
    pub fn to_sql(&self, field: &str, param_number: usize) -> String {
        match self {
            FieldUpdate::Set(_) => format!("{} = ${}", field, param_number),
            FieldUpdate::Increment(_) => {
                format!("{} = {} + ${}", field, field, param_number)
            }
            FieldUpdate::Decrement(_) => {
                format!("{} = {} - ${}", field, field, param_number)
            }
        }
    }

    /// The value bound for this operation
    pub fn value(&self) -> &SqlValue {
        match self {
            FieldUpdate::Set(v) | FieldUpdate::Increment(v) | FieldUpdate::Decrement(v) => v,
        }
    }
}

/// Ordered set of field updates, the save payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    updates: IndexMap<String, FieldUpdate>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field to a specific value
    pub fn set(mut self, field: &str, value: impl Into<SqlValue>) -> Self {
        self.updates
            .insert(field.to_string(), FieldUpdate::Set(value.into()));
        self
    }

    /// Increment a field atomically: field = field + value
    pub fn increment(mut self, field: &str, value: impl Into<SqlValue>) -> Self {
        self.updates
            .insert(field.to_string(), FieldUpdate::Increment(value.into()));
        self
    }

    /// Decrement a field atomically: field = field - value
    pub fn decrement(mut self, field: &str, value: impl Into<SqlValue>) -> Self {
        self.updates
            .insert(field.to_string(), FieldUpdate::Decrement(value.into()));
        self
    }

    pub fn insert(&mut self, field: &str, update: FieldUpdate) {
        self.updates.insert(field.to_string(), update);
    }

    pub fn get(&self, field: &str) -> Option<&FieldUpdate> {
        self.updates.get(field)
    }

    /// Remove a field and return its update
    pub fn take(&mut self, field: &str) -> Option<FieldUpdate> {
        self.updates.shift_remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.updates.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.updates.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldUpdate)> {
        self.updates.iter()
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.updates.retain(|field, _| keep(field));
    }

    /// Rewrite a stored update value in place, keeping its operation
    pub fn map_value(&mut self, field: &str, apply: impl FnOnce(SqlValue) -> SqlValue) {
        if let Some(update) = self.updates.get_mut(field) {
            let next = match update {
                FieldUpdate::Set(v) => {
                    FieldUpdate::Set(apply(std::mem::replace(v, SqlValue::Null)))
                }
                FieldUpdate::Increment(v) => {
                    FieldUpdate::Increment(apply(std::mem::replace(v, SqlValue::Null)))
                }
                FieldUpdate::Decrement(v) => {
                    FieldUpdate::Decrement(apply(std::mem::replace(v, SqlValue::Null)))
                }
            };
            *update = next;
        }
    }
}

/// A row converts into an all-Set change set
impl From<Row> for ChangeSet {
    fn from(row: Row) -> Self {
        let mut changes = ChangeSet::new();
        for (field, value) in row {
            changes.insert(&field, FieldUpdate::Set(value));
        }
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_fragment() {
        let update = FieldUpdate::Set(SqlValue::Int(5));
        assert_eq!(update.to_sql("score", 1), "score = $1");
    }

    #[test]
    fn test_relative_fragments() {
        let inc = FieldUpdate::Increment(SqlValue::Int(3));
        assert_eq!(inc.to_sql("views", 2), "views = views + $2");
        let dec = FieldUpdate::Decrement(SqlValue::Int(1));
        assert_eq!(dec.to_sql("stock", 4), "stock = stock - $4");
    }

    #[test]
    fn test_row_converts_to_all_set() {
        let row = Row::new().with("a", 1i64).with("b", "x");
        let changes = ChangeSet::from(row);
        assert_eq!(changes.get("a"), Some(&FieldUpdate::Set(SqlValue::Int(1))));
        assert_eq!(
            changes.get("b"),
            Some(&FieldUpdate::Set(SqlValue::Text("x".into())))
        );
    }
}
