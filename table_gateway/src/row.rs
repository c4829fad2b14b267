//! Row representation
//!
//! A row is an ordered mapping from field name to scalar value with
//! typed accessors, replacing ad-hoc per-record property bags.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use type_mapping::SqlValue;

/// One database row as carried through the gateway
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    values: IndexMap<String, SqlValue>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field assignment
    pub fn with(mut self, field: &str, value: impl Into<SqlValue>) -> Self {
        self.insert(field, value.into());
        self
    }

    pub fn insert(&mut self, field: &str, value: impl Into<SqlValue>) {
        self.values.insert(field.to_string(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&SqlValue> {
        self.values.get(field)
    }

    pub fn get_int(&self, field: &str) -> Option<i64> {
        self.values.get(field).and_then(SqlValue::as_int)
    }

    pub fn get_text(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(SqlValue::as_text)
    }

    /// Remove a field and return its value
    pub fn take(&mut self, field: &str) -> Option<SqlValue> {
        self.values.shift_remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SqlValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keep only the fields for which `keep` returns true
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.values.retain(|field, _| keep(field));
    }

    /// Rewrite a stored value in place
    pub fn map_value(&mut self, field: &str, apply: impl FnOnce(SqlValue) -> SqlValue) {
        if let Some(value) = self.values.get_mut(field) {
            let current = std::mem::replace(value, SqlValue::Null);
            *value = apply(current);
        }
    }

    /// Rename stored column names to their exposed names.
    ///
    /// `map` goes from exposed name to stored name; entries whose
    /// stored column is absent are left alone.
    pub fn remap(&mut self, map: &IndexMap<String, String>) {
        for (exposed, stored) in map {
            if let Some(value) = self.take(stored) {
                self.insert(exposed, value);
            }
        }
    }
}

impl From<IndexMap<String, SqlValue>> for Row {
    fn from(values: IndexMap<String, SqlValue>) -> Self {
        Self { values }
    }
}

impl IntoIterator for Row {
    type Item = (String, SqlValue);
    type IntoIter = indexmap::map::IntoIter<String, SqlValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}
