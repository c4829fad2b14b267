//! Convenience re-exports for gateway callers

pub use crate::driver::{Driver, DriverError, PgDriver};
pub use crate::errors::GatewayError;
pub use crate::gateway::{GatewaySettings, TableGateway};
pub use crate::hooks::{HookDecision, TableHooks};
pub use crate::options::{Query, SortOrder, SqlArgs, WhereExpr};
pub use crate::results::{AddResult, CounterWrite, DeleteOutcome, FieldValues, ResultSet, Separator};
pub use crate::row::Row;
pub use crate::schema::SchemaCache;
pub use crate::update::ChangeSet;
pub use type_mapping::SqlValue;
