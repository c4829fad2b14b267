//! Driver boundary
//!
//! The `Driver` trait is the external collaborator contract the
//! gateway executes against. The crate ships a PostgreSQL driver over
//! sqlx and a scriptable mock for tests.

pub mod mock;
pub mod postgres;
pub mod sql;

pub use mock::{MockCall, MockDriver};
pub use postgres::PgDriver;
pub use sql::SqlRenderer;

use crate::options::QueryOptions;
use crate::row::Row;
use crate::schema::FieldDescription;
use crate::update::ChangeSet;
use async_trait::async_trait;
use thiserror::Error;
use type_mapping::SqlValue;

/// Errors surfaced by a driver, passed through to callers unchanged
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("unsupported expression: {0}")]
    Render(String),

    #[error("driver error: {0}")]
    Other(String),
}

/// Database driver contract consumed by the gateway.
///
/// Write operations return affected-row counts; errors propagate
/// unchanged and no operation is retried here.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Driver name for diagnostics
    fn name(&self) -> &'static str;

    async fn insert(
        &self,
        row: &Row,
        options: &QueryOptions,
        replace: bool,
    ) -> Result<u64, DriverError>;

    async fn insert_all(
        &self,
        rows: &[Row],
        options: &QueryOptions,
        replace: bool,
    ) -> Result<u64, DriverError>;

    async fn update(&self, changes: &ChangeSet, options: &QueryOptions)
        -> Result<u64, DriverError>;

    async fn delete(&self, options: &QueryOptions) -> Result<u64, DriverError>;

    async fn select(&self, options: &QueryOptions) -> Result<Vec<Row>, DriverError>;

    /// Raw query passthrough, already templated by the caller
    async fn query(&self, sql: &str) -> Result<Vec<Row>, DriverError>;

    /// Raw statement passthrough, already templated by the caller
    async fn execute(&self, sql: &str) -> Result<u64, DriverError>;

    async fn describe_fields(&self, table: &str) -> Result<Vec<FieldDescription>, DriverError>;

    /// Insert id generated by the most recent insert, when one exists
    async fn last_insert_id(&self) -> Result<Option<i64>, DriverError>;

    async fn begin(&self) -> Result<(), DriverError>;
    async fn commit(&self) -> Result<(), DriverError>;
    async fn rollback(&self) -> Result<(), DriverError>;

    /// Escape a value into a SQL literal for textual interpolation
    fn escape(&self, value: &SqlValue) -> String {
        escape_literal(value)
    }
}

/// Standard literal escaping: numerics and booleans plain, NULL bare,
/// everything else single-quoted with quote doubling
pub fn escape_literal(value: &SqlValue) -> String {
    match value {
        SqlValue::Int(i) => i.to_string(),
        SqlValue::Float(f) => f.to_string(),
        SqlValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        SqlValue::Null => "NULL".to_string(),
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_literal() {
        assert_eq!(escape_literal(&SqlValue::Int(7)), "7");
        assert_eq!(escape_literal(&SqlValue::Bool(true)), "TRUE");
        assert_eq!(escape_literal(&SqlValue::Null), "NULL");
        assert_eq!(
            escape_literal(&SqlValue::Text("o'neill".into())),
            "'o''neill'"
        );
    }
}
