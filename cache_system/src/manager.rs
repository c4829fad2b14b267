//! Cache manager implementation
//!
//! This module provides the main CacheManager struct layering
//! typed JSON access and key construction over a cache store.

use crate::errors::CacheError;
use crate::store::{CacheStore, MemoryStore, RedisStore};
use config::CacheConfig;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Typed facade over a cache store backend
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn CacheStore>,
}

impl Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("backend", &self.store.backend())
            .finish()
    }
}

impl CacheManager {
    /// Create a cache manager over any store backend
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Create a Redis-backed cache manager
    pub fn redis(config: &CacheConfig) -> Result<Self, CacheError> {
        Ok(Self::new(Arc::new(RedisStore::new(config)?)))
    }

    /// Create a process-local cache manager
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Raw store handle, for callers that need compare-and-swap
    pub fn store(&self) -> Arc<dyn CacheStore> {
        Arc::clone(&self.store)
    }

    /// Generate cache key for query results
    pub fn build_query_key(&self, prefix: &str, table_name: &str, query_hash: &str) -> String {
        format!("{}:{}:query:{}", prefix, table_name, query_hash)
    }

    /// Generate cache key for a persisted table schema
    pub fn build_schema_key(&self, prefix: &str, qualified_table: &str) -> String {
        format!("{}:schema:{}", prefix, qualified_table)
    }

    /// Tag shared by every query-result entry of one table
    pub fn query_tag(&self, prefix: &str, table_name: &str) -> String {
        format!("{}:{}:query", prefix, table_name)
    }

    /// Generate hash for query parameters
    pub fn hash_query<T: Hash>(&self, query: &T) -> String {
        let mut hasher = DefaultHasher::new();
        query.hash(&mut hasher);
        format!("{:x}", hasher.finish())
    }

    /// Get a JSON-encoded value from the cache
    pub async fn get_json<T>(&self, key: &str) -> Result<Option<T>, CacheError>
    where
        T: DeserializeOwned,
    {
        match self.store.get(key).await? {
            Some(json_str) => {
                let value: T = serde_json::from_str(&json_str)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Store a JSON-encoded value in the cache
    pub async fn set_json<T>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<u64>,
        tags: &[String],
    ) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let json_str = serde_json::to_string(value)?;
        self.store.set(key, &json_str, ttl, tags).await
    }

    /// Get cached query results for a table
    pub async fn get_query<T>(
        &self,
        prefix: &str,
        table_name: &str,
        query_hash: &str,
    ) -> Result<Option<T>, CacheError>
    where
        T: DeserializeOwned,
    {
        let cache_key = self.build_query_key(prefix, table_name, query_hash);
        self.get_json(&cache_key).await
    }

    /// Cache query results for a table, tagged for later invalidation
    pub async fn set_query<T>(
        &self,
        prefix: &str,
        table_name: &str,
        query_hash: &str,
        results: &T,
        ttl: u64,
    ) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let cache_key = self.build_query_key(prefix, table_name, query_hash);
        let tags = vec![self.query_tag(prefix, table_name)];
        self.set_json(&cache_key, results, Some(ttl), &tags).await
    }

    /// Invalidate all query cache for a table (when data changes)
    pub async fn invalidate_queries(
        &self,
        prefix: &str,
        table_name: &str,
    ) -> Result<u64, CacheError> {
        self.store
            .invalidate_tag(&self.query_tag(prefix, table_name))
            .await
    }

    /// Delete a single cache entry
    pub async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        self.store.delete(key).await
    }

    /// Ping the backend to check connectivity
    pub async fn ping(&self) -> Result<String, CacheError> {
        self.store.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_query_round_trip_and_invalidation() {
        let manager = CacheManager::memory();
        let rows = vec![1u64, 2, 3];
        manager
            .set_query("app", "users", "abc", &rows, 60)
            .await
            .unwrap();

        let cached: Option<Vec<u64>> = manager.get_query("app", "users", "abc").await.unwrap();
        assert_eq!(cached, Some(rows));

        manager.invalidate_queries("app", "users").await.unwrap();
        let cached: Option<Vec<u64>> = manager.get_query("app", "users", "abc").await.unwrap();
        assert_eq!(cached, None);
    }

    #[test]
    fn test_hash_query_is_stable() {
        let manager = CacheManager::memory();
        let a = manager.hash_query(&("users", 7, "name"));
        let b = manager.hash_query(&("users", 7, "name"));
        let c = manager.hash_query(&("users", 8, "name"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
