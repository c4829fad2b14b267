//! Serialization utilities
//!
//! This module converts between JSON values and the scalar
//! value model, used by the cache layer and row construction.

use crate::types::SqlValue;

/// Convert a JSON value into the closest SqlValue
pub fn from_json_value(value: serde_json::Value) -> SqlValue {
    match value {
        serde_json::Value::String(s) => {
            // Try to parse as RFC3339 timestamp first
            if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(&s) {
                SqlValue::Timestamp(dt.with_timezone(&chrono::Utc))
            } else {
                SqlValue::Text(s)
            }
        }
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Int(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::Float(f)
            } else {
                SqlValue::Json(serde_json::Value::Number(n))
            }
        }
        serde_json::Value::Bool(b) => SqlValue::Bool(b),
        serde_json::Value::Null => SqlValue::Null,
        other => SqlValue::Json(other),
    }
}

/// Convert a SqlValue back into plain JSON
pub fn to_json_value(value: &SqlValue) -> serde_json::Value {
    match value {
        SqlValue::Text(s) => serde_json::Value::String(s.clone()),
        SqlValue::Int(i) => serde_json::Value::from(*i),
        SqlValue::Float(f) => serde_json::Value::from(*f),
        SqlValue::Bool(b) => serde_json::Value::Bool(*b),
        SqlValue::Uuid(u) => serde_json::Value::String(u.to_string()),
        SqlValue::Timestamp(ts) => serde_json::Value::String(ts.to_rfc3339()),
        SqlValue::Decimal(s) => serde_json::Value::String(s.clone()),
        SqlValue::Json(v) => v.clone(),
        SqlValue::Null => serde_json::Value::Null,
    }
}
