//! Cache store backends
//!
//! This module defines the CacheStore trait plus the Redis and
//! in-memory implementations. The trait carries an atomic
//! compare-and-swap so counter buffering never loses updates
//! under concurrent access.

use crate::errors::CacheError;
use async_trait::async_trait;
use config::CacheConfig;
use redis::{AsyncCommands, Client};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

/// Key-value store contract for all cache backends.
///
/// Values are opaque strings; typed access lives in the manager.
/// `compare_and_swap` must be atomic with respect to every other
/// mutation of the same key.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Backend name for diagnostics
    fn backend(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value with an optional TTL and membership in the given tags
    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<u64>,
        tags: &[String],
    ) -> Result<(), CacheError>;

    /// Remove a key, reporting whether it existed
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Atomically replace the value of `key` if it currently equals
    /// `expected` (`None` meaning absent). `new` of `None` deletes the
    /// key. Returns false without changing anything when the current
    /// value does not match.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: Option<&str>,
        ttl: Option<u64>,
    ) -> Result<bool, CacheError>;

    /// Drop every key tagged with `tag`, returning how many were removed
    async fn invalidate_tag(&self, tag: &str) -> Result<u64, CacheError>;

    /// Connectivity check
    async fn ping(&self) -> Result<String, CacheError> {
        Ok("PONG".to_string())
    }
}

// ============================================================================
// Redis backend
// ============================================================================

/// Compare-and-swap executed server side so the check and the write
/// cannot interleave with another client.
const CAS_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if ARGV[1] == '1' then
    if current == false or current ~= ARGV[2] then return 0 end
else
    if current ~= false then return 0 end
end
if ARGV[3] == '1' then
    local ttl = tonumber(ARGV[5])
    if ttl > 0 then
        redis.call('SET', KEYS[1], ARGV[4], 'EX', ttl)
    else
        redis.call('SET', KEYS[1], ARGV[4])
    end
else
    redis.call('DEL', KEYS[1])
end
return 1
"#;

/// Redis-backed cache store
pub struct RedisStore {
    client: Arc<Client>,
    connection: Arc<RwLock<Option<redis::aio::MultiplexedConnection>>>,
    cas_script: redis::Script,
    response_timeout: Duration,
    connection_timeout: Duration,
}

impl RedisStore {
    /// Create a new Redis store from cache configuration
    pub fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        let client = Client::open(config.redis_url.as_str())?;

        Ok(Self {
            client: Arc::new(client),
            connection: Arc::new(RwLock::new(None)),
            cas_script: redis::Script::new(CAS_SCRIPT),
            response_timeout: Duration::from_millis(config.timeout_ms),
            connection_timeout: Duration::from_millis(config.connection_timeout_ms),
        })
    }

    /// Get or create the multiplexed Redis connection
    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, CacheError> {
        let mut pool = self.connection.write().await;

        if pool.is_none() {
            let connection = self
                .client
                .get_multiplexed_async_connection_with_timeouts(
                    self.response_timeout,
                    self.connection_timeout,
                )
                .await?;
            *pool = Some(connection);
        }

        // Safe extraction: we just ensured pool contains a connection above
        Ok(pool
            .as_ref()
            .ok_or_else(|| CacheError::Connection("Failed to get connection from pool".into()))?
            .clone())
    }

    fn tag_set_key(tag: &str) -> String {
        format!("tagset:{}", tag)
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.get_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<u64>,
        tags: &[String],
    ) -> Result<(), CacheError> {
        let mut conn = self.get_connection().await?;

        match ttl {
            Some(secs) if secs > 0 => {
                let _: () = conn.set_ex(key, value, secs).await?;
            }
            _ => {
                let _: () = conn.set(key, value).await?;
            }
        }

        for tag in tags {
            let _: () = conn.sadd(Self::tag_set_key(tag), key).await?;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.get_connection().await?;
        let deleted: i32 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: Option<&str>,
        ttl: Option<u64>,
    ) -> Result<bool, CacheError> {
        let mut conn = self.get_connection().await?;

        let swapped: i32 = self
            .cas_script
            .key(key)
            .arg(if expected.is_some() { "1" } else { "0" })
            .arg(expected.unwrap_or(""))
            .arg(if new.is_some() { "1" } else { "0" })
            .arg(new.unwrap_or(""))
            .arg(ttl.unwrap_or(0))
            .invoke_async(&mut conn)
            .await?;
        Ok(swapped == 1)
    }

    async fn invalidate_tag(&self, tag: &str) -> Result<u64, CacheError> {
        let set_key = Self::tag_set_key(tag);
        let mut conn = self.get_connection().await?;

        let keys: Vec<String> = conn.smembers(&set_key).await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let deleted: u64 = conn.del(keys).await?;
        let _: () = conn.del(&set_key).await?;
        Ok(deleted)
    }

    async fn ping(&self) -> Result<String, CacheError> {
        let mut conn = self.get_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong)
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
    tags: Vec<String>,
}

impl MemoryEntry {
    fn expired(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }
}

/// Process-local cache store, used in tests and cache-less deployments
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get(key) {
            if entry.expired() {
                entries.remove(key);
                return Ok(None);
            }
            return Ok(Some(entry.value.clone()));
        }
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Option<u64>,
        tags: &[String],
    ) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: ttl
                    .filter(|secs| *secs > 0)
                    .map(|secs| Instant::now() + Duration::from_secs(secs)),
                tags: tags.to_vec(),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut entries = self.entries.lock().await;
        Ok(entries.remove(key).is_some())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: Option<&str>,
        ttl: Option<u64>,
    ) -> Result<bool, CacheError> {
        let mut entries = self.entries.lock().await;

        let current = match entries.get(key) {
            Some(entry) if !entry.expired() => Some(entry.value.as_str()),
            _ => None,
        };
        if current != expected {
            return Ok(false);
        }

        match new {
            Some(value) => {
                entries.insert(
                    key.to_string(),
                    MemoryEntry {
                        value: value.to_string(),
                        expires_at: ttl
                            .filter(|secs| *secs > 0)
                            .map(|secs| Instant::now() + Duration::from_secs(secs)),
                        tags: Vec::new(),
                    },
                );
            }
            None => {
                entries.remove(key);
            }
        }
        Ok(true)
    }

    async fn invalidate_tag(&self, tag: &str) -> Result<u64, CacheError> {
        let mut entries = self.entries.lock().await;
        let tagged: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.tags.iter().any(|t| t == tag))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &tagged {
            entries.remove(key);
        }
        Ok(tagged.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // MemoryStore basics
    // ========================================================================

    #[tokio::test]
    async fn test_set_and_get() {
        let store = MemoryStore::new();
        store.set("k", "v", None, &[]).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_reports_existence() {
        let store = MemoryStore::new();
        store.set("k", "v", None, &[]).await.unwrap();
        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_absent() {
        let store = MemoryStore::new();
        store.set("k", "v", Some(1), &[]).await.unwrap();
        // Force the entry past its deadline
        {
            let mut entries = store.entries.lock().await;
            if let Some(entry) = entries.get_mut("k") {
                entry.expires_at = Some(Instant::now() - Duration::from_secs(1));
            }
        }
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    // ========================================================================
    // Compare-and-swap
    // ========================================================================

    #[tokio::test]
    async fn test_cas_create_when_absent() {
        let store = MemoryStore::new();
        assert!(store.compare_and_swap("k", None, Some("1"), None).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("1".to_string()));

        // A second create against the same key must fail
        assert!(!store.compare_and_swap("k", None, Some("2"), None).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("1".to_string()));
    }

    #[tokio::test]
    async fn test_cas_replace_requires_match() {
        let store = MemoryStore::new();
        store.set("k", "1", None, &[]).await.unwrap();

        assert!(!store.compare_and_swap("k", Some("0"), Some("2"), None).await.unwrap());
        assert!(store.compare_and_swap("k", Some("1"), Some("2"), None).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("2".to_string()));
    }

    #[tokio::test]
    async fn test_cas_delete() {
        let store = MemoryStore::new();
        store.set("k", "1", None, &[]).await.unwrap();

        assert!(store.compare_and_swap("k", Some("1"), None, None).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    // ========================================================================
    // Tag invalidation
    // ========================================================================

    #[tokio::test]
    async fn test_invalidate_tag_removes_only_tagged_keys() {
        let store = MemoryStore::new();
        let tag = vec!["users:query".to_string()];
        store.set("a", "1", None, &tag).await.unwrap();
        store.set("b", "2", None, &tag).await.unwrap();
        store.set("c", "3", None, &[]).await.unwrap();

        assert_eq!(store.invalidate_tag("users:query").await.unwrap(), 2);
        assert_eq!(store.get("a").await.unwrap(), None);
        assert_eq!(store.get("b").await.unwrap(), None);
        assert_eq!(store.get("c").await.unwrap(), Some("3".to_string()));
    }
}
