//! Lazy-write coalescing
//!
//! Collapses bursts of counter increments into one write per time
//! window. Entries live in the external cache so every process sees
//! the same buffer; all transitions go through compare-and-swap, so
//! concurrent absorbs never lose a delta.

use crate::options::WhereClause;
use cache_system::{CacheError, CacheStore};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Result of absorbing one delta
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Absorb {
    /// The delta was buffered; nothing should be written yet
    Buffering,
    /// The window elapsed; write this net delta now
    Flush(i64),
}

#[derive(Debug, Serialize, Deserialize)]
struct LazyWriteEntry {
    delta: i64,
    started_at: i64,
}

/// Coalescer over an atomic cache store
pub struct LazyWriteCoalescer {
    store: Arc<dyn CacheStore>,
}

impl LazyWriteCoalescer {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Stable buffer key for one (model, field, condition) signature
    pub fn entry_key(model: &str, field: &str, condition: Option<&WhereClause>) -> String {
        let serialized = condition
            .and_then(|clause| serde_json::to_string(clause).ok())
            .unwrap_or_default();
        let mut hasher = DefaultHasher::new();
        model.hash(&mut hasher);
        field.hash(&mut hasher);
        serialized.hash(&mut hasher);
        format!("lazy:{}:{}:{:x}", model, field, hasher.finish())
    }

    /// Absorb a delta for `key` within a window of `window_secs`
    pub async fn absorb(
        &self,
        key: &str,
        delta: i64,
        window_secs: u64,
    ) -> Result<Absorb, CacheError> {
        self.absorb_at(key, delta, window_secs, chrono::Utc::now().timestamp())
            .await
    }

    /// Clock-injected absorb used by `absorb` and the tests.
    ///
    /// First call stores the delta and the window start; calls inside
    /// the window accumulate without resetting the start; the first
    /// call past the deadline clears the entry and flushes the net
    /// delta, current call included. Each transition is a CAS that
    /// retries on contention.
    pub async fn absorb_at(
        &self,
        key: &str,
        delta: i64,
        window_secs: u64,
        now: i64,
    ) -> Result<Absorb, CacheError> {
        loop {
            match self.store.get(key).await? {
                None => {
                    let entry = serde_json::to_string(&LazyWriteEntry {
                        delta,
                        started_at: now,
                    })?;
                    if self
                        .store
                        .compare_and_swap(key, None, Some(&entry), None)
                        .await?
                    {
                        return Ok(Absorb::Buffering);
                    }
                }
                Some(raw) => {
                    let entry: LazyWriteEntry = serde_json::from_str(&raw)?;
                    if now > entry.started_at + window_secs as i64 {
                        // deleting the entry is the flush claim; a
                        // losing racer retries against the new state
                        if self
                            .store
                            .compare_and_swap(key, Some(&raw), None, None)
                            .await?
                        {
                            return Ok(Absorb::Flush(entry.delta + delta));
                        }
                    } else {
                        let next = serde_json::to_string(&LazyWriteEntry {
                            delta: entry.delta + delta,
                            started_at: entry.started_at,
                        })?;
                        if self
                            .store
                            .compare_and_swap(key, Some(&raw), Some(&next), None)
                            .await?
                        {
                            return Ok(Absorb::Buffering);
                        }
                    }
                }
            }
        }
    }
}
