//! Unified value and column type mapping for tablewerk
//! This crate provides the scalar model and coercion logic used across the tablewerk ecosystem

pub mod field_type;
pub mod serialize;
pub mod types;

// Re-export commonly used items
pub use field_type::FieldType;
pub use serialize::{from_json_value, to_json_value};
pub use types::SqlValue;
