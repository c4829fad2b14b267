//! Column type parsing
//!
//! This module classifies the raw type strings reported by the
//! database and applies value coercion based on that class.

use crate::types::SqlValue;
use serde::{Deserialize, Serialize};

/// Broad column type class, parsed from a database type string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Int,
    BigInt,
    Float,
    Bool,
    Enum,
    Decimal,
    Uuid,
    Timestamp,
    Json,
    Text,
}

impl FieldType {
    /// Classify a database type string such as `integer`, `bigint`,
    /// `character varying(255)` or `timestamp with time zone`.
    ///
    /// Matching is substring based: `bigint` is checked before the
    /// generic `int` family, and `enum` wins over everything so that
    /// enum columns are never coerced.
    pub fn parse(type_name: &str) -> Self {
        let normalized = type_name.to_lowercase();
        if normalized.contains("enum") {
            FieldType::Enum
        } else if normalized.contains("bigint") || normalized.contains("int8") {
            FieldType::BigInt
        } else if normalized.contains("int") || normalized.contains("serial") {
            FieldType::Int
        } else if normalized.contains("float")
            || normalized.contains("double")
            || normalized.contains("real")
        {
            FieldType::Float
        } else if normalized.contains("bool") {
            FieldType::Bool
        } else if normalized.contains("numeric") || normalized.contains("decimal") {
            FieldType::Decimal
        } else if normalized.contains("uuid") {
            FieldType::Uuid
        } else if normalized.contains("timestamp") || normalized.contains("date") {
            FieldType::Timestamp
        } else if normalized.contains("json") {
            FieldType::Json
        } else {
            FieldType::Text
        }
    }

    /// Best-effort coercion of a scalar to this column class.
    ///
    /// Only the int, float and bool classes rewrite values; bigint,
    /// enum and everything else pass through untouched. Values that
    /// cannot be parsed are also passed through so the driver reports
    /// the mismatch instead of the coercion layer.
    pub fn coerce(&self, value: SqlValue) -> SqlValue {
        match self {
            FieldType::Int => match value.as_int() {
                Some(i) => SqlValue::Int(i),
                None => value,
            },
            FieldType::Float => match value.as_float() {
                Some(f) => SqlValue::Float(f),
                None => value,
            },
            FieldType::Bool => match &value {
                SqlValue::Bool(_) => value,
                SqlValue::Int(i) => SqlValue::Bool(*i != 0),
                SqlValue::Text(s) => match s.trim().to_lowercase().as_str() {
                    "1" | "true" | "t" | "on" | "yes" => SqlValue::Bool(true),
                    "0" | "false" | "f" | "off" | "no" | "" => SqlValue::Bool(false),
                    _ => value,
                },
                _ => value,
            },
            _ => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_family() {
        assert_eq!(FieldType::parse("integer"), FieldType::Int);
        assert_eq!(FieldType::parse("smallint"), FieldType::Int);
        assert_eq!(FieldType::parse("int(11) unsigned"), FieldType::Int);
        assert_eq!(FieldType::parse("bigint"), FieldType::BigInt);
        assert_eq!(FieldType::parse("BIGINT"), FieldType::BigInt);
    }

    #[test]
    fn test_parse_other_classes() {
        assert_eq!(FieldType::parse("double precision"), FieldType::Float);
        assert_eq!(FieldType::parse("boolean"), FieldType::Bool);
        assert_eq!(FieldType::parse("enum('a','b')"), FieldType::Enum);
        assert_eq!(FieldType::parse("numeric(20,4)"), FieldType::Decimal);
        assert_eq!(FieldType::parse("character varying(255)"), FieldType::Text);
        assert_eq!(FieldType::parse("timestamp with time zone"), FieldType::Timestamp);
        assert_eq!(FieldType::parse("jsonb"), FieldType::Json);
        assert_eq!(FieldType::parse("uuid"), FieldType::Uuid);
    }

    #[test]
    fn test_coerce_int() {
        assert_eq!(
            FieldType::Int.coerce(SqlValue::Text("42".into())),
            SqlValue::Int(42)
        );
        assert_eq!(FieldType::Int.coerce(SqlValue::Bool(true)), SqlValue::Int(1));
        // unparseable text passes through unchanged
        assert_eq!(
            FieldType::Int.coerce(SqlValue::Text("abc".into())),
            SqlValue::Text("abc".into())
        );
    }

    #[test]
    fn test_coerce_bool() {
        assert_eq!(
            FieldType::Bool.coerce(SqlValue::Text("on".into())),
            SqlValue::Bool(true)
        );
        assert_eq!(FieldType::Bool.coerce(SqlValue::Int(0)), SqlValue::Bool(false));
    }

    #[test]
    fn test_bigint_and_enum_untouched() {
        assert_eq!(
            FieldType::BigInt.coerce(SqlValue::Text("9000000000".into())),
            SqlValue::Text("9000000000".into())
        );
        assert_eq!(
            FieldType::Enum.coerce(SqlValue::Text("draft".into())),
            SqlValue::Text("draft".into())
        );
    }
}
