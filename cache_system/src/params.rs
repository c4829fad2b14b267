//! Per-gateway cache wiring
//!
//! Bundles the manager handle with the key namespace and result TTL
//! a gateway caches under. Gateways built by one coordinator share
//! the same namespace so tag invalidation covers all of them.

use crate::CacheManager;
use config::GatewayConfig;
use std::sync::Arc;

/// Key namespace used when the caller does not pick its own
pub const DEFAULT_PREFIX: &str = "tablewerk";

/// Cache parameters handed to a gateway
#[derive(Debug, Clone)]
pub struct CacheParams {
    /// The cache manager instance
    pub manager: Arc<CacheManager>,
    /// Default TTL for cached results in seconds
    pub ttl: u64,
    /// Prefix for cache keys
    pub prefix: String,
}

impl CacheParams {
    pub fn new(manager: Arc<CacheManager>, ttl: u64, prefix: &str) -> Self {
        Self {
            ttl,
            prefix: prefix.to_string(),
            manager,
        }
    }

    /// Parameters for a coordinator-owned gateway: shared namespace,
    /// TTL taken from the gateway section of the config
    pub fn from_config(manager: Arc<CacheManager>, config: &GatewayConfig) -> Self {
        Self::new(manager, config.result_cache_ttl_seconds, DEFAULT_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_uses_shared_namespace_and_config_ttl() {
        let config = GatewayConfig::new("app_".to_string(), true, true, 45, 0);
        let params = CacheParams::from_config(Arc::new(CacheManager::memory()), &config);
        assert_eq!(params.ttl, 45);
        assert_eq!(params.prefix, DEFAULT_PREFIX);
    }

    #[test]
    fn test_explicit_prefix_wins() {
        let params = CacheParams::new(Arc::new(CacheManager::memory()), 60, "blog");
        assert_eq!(params.prefix, "blog");
        assert_eq!(params.ttl, 60);
    }
}
