//! Error types for the table gateway
//!
//! Validation failures are reported before any driver call is made;
//! driver and cache errors pass through unchanged.

use crate::hooks::HookStage;
use cache_system::CacheError;
use thiserror::Error;

pub use crate::driver::DriverError;

/// Gateway command errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no data supplied for {0}")]
    NoData(&'static str),

    #[error("unknown field in strict mode: {field}")]
    InvalidField { field: String },

    #[error("unrecognized query expression: {key}")]
    InvalidExpression { key: String },

    #[error("no update condition could be derived")]
    NoUpdateCondition,

    #[error("composite primary key component missing: {field}")]
    MissingPrimaryKey { field: String },

    #[error("schema unavailable for table: {table}")]
    SchemaUnavailable { table: String },

    #[error("operation vetoed by {stage} hook")]
    Vetoed { stage: HookStage },

    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}
