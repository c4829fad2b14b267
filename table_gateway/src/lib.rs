//! Table gateway for tablewerk
//!
//! This crate is the command-execution core: declarative query
//! options finalized against introspected schemas, CRUD commands with
//! lifecycle hooks, result caching, and lazy-write coalescing for
//! high-frequency counters.

pub mod driver;
pub mod errors;
pub mod gateway;
pub mod hooks;
pub mod lazy_write;
pub mod options;
pub mod prelude;
pub mod results;
pub mod row;
pub mod schema;
pub mod update;

pub use driver::{Driver, DriverError, MockDriver, PgDriver};
pub use errors::GatewayError;
pub use gateway::{GatewaySettings, TableGateway};
pub use hooks::{HookDecision, HookStage, NoHooks, TableHooks};
pub use lazy_write::{Absorb, LazyWriteCoalescer};
pub use options::{CompareOp, Query, QueryOptions, SortOrder, SqlArgs, WhereClause, WhereExpr};
pub use results::{AddResult, CounterWrite, DeleteOutcome, FieldValues, ResultSet, Separator};
pub use row::Row;
pub use schema::{FieldDescription, PrimaryKey, Schema, SchemaCache};
pub use update::{ChangeSet, FieldUpdate};

// Re-export the scalar model alongside the types that carry it
pub use type_mapping::{FieldType, SqlValue};
