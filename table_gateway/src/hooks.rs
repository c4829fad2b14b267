//! Lifecycle hooks
//!
//! This module defines the TableHooks trait the owning entity
//! implements to observe and veto gateway operations.

use crate::options::QueryOptions;
use crate::row::Row;
use crate::update::ChangeSet;
use async_trait::async_trait;
use std::fmt;

/// Outcome of a before-hook. A veto stops the operation before it
/// reaches the driver, exactly like a validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookDecision {
    Proceed,
    Veto,
}

/// Which write stage a hook vetoed, carried in the error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookStage::Insert => write!(f, "insert"),
            HookStage::Update => write!(f, "update"),
            HookStage::Delete => write!(f, "delete"),
        }
    }
}

/// Lifecycle hooks around gateway commands.
///
/// Every method has a no-op default, so implementors only override
/// the stages they care about. `before_write` runs inside the write
/// facade for every insert row and may mutate it; the other before
/// hooks may veto the operation.
#[async_trait]
pub trait TableHooks: Send + Sync {
    async fn before_write(&self, _row: &mut Row) {}

    async fn before_insert(&self, _row: &mut Row, _options: &QueryOptions) -> HookDecision {
        HookDecision::Proceed
    }

    async fn after_insert(&self, _row: &Row, _options: &QueryOptions) {}

    async fn before_update(
        &self,
        _changes: &mut ChangeSet,
        _options: &QueryOptions,
    ) -> HookDecision {
        HookDecision::Proceed
    }

    async fn after_update(&self, _changes: &ChangeSet, _options: &QueryOptions) {}

    async fn before_delete(&self, _options: &QueryOptions) -> HookDecision {
        HookDecision::Proceed
    }

    async fn after_delete(&self, _row: &Row, _options: &QueryOptions) {}

    async fn after_select(&self, _rows: &mut Vec<Row>, _options: &QueryOptions) {}
}

/// Default hook set that lets everything through unchanged
pub struct NoHooks;

#[async_trait]
impl TableHooks for NoHooks {}
