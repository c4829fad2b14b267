//! Runtime value definitions
//!
//! This module provides the scalar value model shared between
//! rows, query conditions, and the database driver.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A single database value as carried through rows and conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Uuid(Uuid),
    Timestamp(chrono::DateTime<chrono::Utc>),
    Decimal(String), // Store as string to preserve precision
    Json(serde_json::Value),
    Null,
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Integer view of the value, parsing text when possible
    pub fn as_int(&self) -> Option<i64> {
        match self {
            SqlValue::Int(i) => Some(*i),
            SqlValue::Float(f) => Some(*f as i64),
            SqlValue::Bool(b) => Some(*b as i64),
            SqlValue::Text(s) | SqlValue::Decimal(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            SqlValue::Float(f) => Some(*f),
            SqlValue::Int(i) => Some(*i as f64),
            SqlValue::Text(s) | SqlValue::Decimal(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(b) => Some(*b),
            SqlValue::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) | SqlValue::Decimal(s) => Some(s),
            _ => None,
        }
    }
}

/// Plain text form, used for index keys and joined field output
impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Text(s) => write!(f, "{}", s),
            SqlValue::Int(i) => write!(f, "{}", i),
            SqlValue::Float(v) => write!(f, "{}", v),
            SqlValue::Bool(b) => write!(f, "{}", b),
            SqlValue::Uuid(u) => write!(f, "{}", u),
            SqlValue::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            SqlValue::Decimal(s) => write!(f, "{}", s),
            SqlValue::Json(v) => write!(f, "{}", v),
            SqlValue::Null => Ok(()),
        }
    }
}

/// Convert basic Rust types to SqlValue
impl From<String> for SqlValue {
    fn from(val: String) -> Self {
        SqlValue::Text(val)
    }
}

impl From<&str> for SqlValue {
    fn from(val: &str) -> Self {
        SqlValue::Text(val.to_string())
    }
}

impl From<i32> for SqlValue {
    fn from(val: i32) -> Self {
        SqlValue::Int(val as i64)
    }
}

impl From<i64> for SqlValue {
    fn from(val: i64) -> Self {
        SqlValue::Int(val)
    }
}

impl From<f64> for SqlValue {
    fn from(val: f64) -> Self {
        SqlValue::Float(val)
    }
}

impl From<bool> for SqlValue {
    fn from(val: bool) -> Self {
        SqlValue::Bool(val)
    }
}

impl From<Uuid> for SqlValue {
    fn from(val: Uuid) -> Self {
        SqlValue::Uuid(val)
    }
}

impl From<chrono::DateTime<chrono::Utc>> for SqlValue {
    fn from(val: chrono::DateTime<chrono::Utc>) -> Self {
        SqlValue::Timestamp(val)
    }
}

impl From<serde_json::Value> for SqlValue {
    fn from(val: serde_json::Value) -> Self {
        SqlValue::Json(val)
    }
}

impl<T> From<Option<T>> for SqlValue
where
    T: Into<SqlValue>,
{
    fn from(val: Option<T>) -> Self {
        match val {
            Some(v) => v.into(),
            None => SqlValue::Null,
        }
    }
}
