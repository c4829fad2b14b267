//! Core Tablewerk functionality
//!
//! This module contains the main Tablewerk coordinator struct: it owns
//! the connection pool, the shared schema cache, the optional Redis
//! cache manager, and a registry of named table gateways.

use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::TablewerkError;
use cache_system::{CacheManager, CacheParams};
use config::{AppConfig, DatabaseConfig, GatewayConfig};
use table_gateway::{Driver, GatewaySettings, PgDriver, SchemaCache, TableGateway};

/// Main coordinator that manages the database connection and the
/// registered table gateways
pub struct Tablewerk {
    pool: PgPool,
    driver: Arc<PgDriver>,
    cache: Option<Arc<CacheManager>>,
    schema_cache: Arc<SchemaCache>,
    gateway_config: GatewayConfig,
    gateways: HashMap<String, Arc<TableGateway>>,
}

impl Tablewerk {
    /// Create a coordinator from the full application config: pool,
    /// Redis cache manager, and persisted schema cache.
    pub async fn from_config(config: AppConfig) -> Result<Self, TablewerkError> {
        let pool = Self::build_pool(&config.database).await?;
        let cache = Arc::new(CacheManager::redis(&config.cache)?);
        Ok(Self::assemble(pool, Some(cache), config.gateway))
    }

    /// Create a coordinator without an external cache: no result
    /// caching, no lazy-write buffering, in-process schemas only.
    pub async fn connect(
        database: DatabaseConfig,
        gateway: GatewayConfig,
    ) -> Result<Self, TablewerkError> {
        let pool = Self::build_pool(&database).await?;
        Ok(Self::assemble(pool, None, gateway))
    }

    async fn build_pool(config: &DatabaseConfig) -> Result<PgPool, TablewerkError> {
        let connection_string = config.connection_string();

        let mut pool_options = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds));

        // Set max lifetime if specified
        if config.max_lifetime_seconds > 0 {
            pool_options =
                pool_options.max_lifetime(Duration::from_secs(config.max_lifetime_seconds));
        }

        Ok(pool_options.connect(&connection_string).await?)
    }

    fn assemble(
        pool: PgPool,
        cache: Option<Arc<CacheManager>>,
        gateway_config: GatewayConfig,
    ) -> Self {
        let driver = Arc::new(PgDriver::new(pool.clone()));
        let persistence = match (&cache, gateway_config.schema_cache) {
            (Some(manager), true) => Some(CacheParams::from_config(
                Arc::clone(manager),
                &gateway_config,
            )),
            _ => None,
        };
        Self {
            pool,
            driver,
            cache,
            schema_cache: Arc::new(SchemaCache::new(persistence)),
            gateway_config,
            gateways: HashMap::new(),
        }
    }

    /// Get database pool reference
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn cache(&self) -> Option<Arc<CacheManager>> {
        self.cache.clone()
    }

    /// Build a gateway wired to this coordinator's driver, schema
    /// cache, and cache manager, with settings from the config
    pub fn build_gateway(&self, model: &str) -> TableGateway {
        self.build_gateway_with(GatewaySettings::from_config(model, &self.gateway_config))
    }

    /// Same wiring with caller-supplied settings
    pub fn build_gateway_with(&self, settings: GatewaySettings) -> TableGateway {
        let mut gateway = TableGateway::new(
            Arc::clone(&self.driver) as Arc<dyn Driver>,
            Arc::clone(&self.schema_cache),
            settings,
        );
        if let Some(manager) = &self.cache {
            gateway = gateway.with_cache(CacheParams::from_config(
                Arc::clone(manager),
                &self.gateway_config,
            ));
        }
        gateway
    }

    /// Register a gateway under a given name
    pub fn register_gateway(
        &mut self,
        name: &str,
        gateway: TableGateway,
    ) -> Result<Arc<TableGateway>, TablewerkError> {
        if self.gateways.contains_key(name) {
            return Err(TablewerkError::GatewayAlreadyRegistered(name.to_string()));
        }
        let gateway = Arc::new(gateway);
        self.gateways
            .insert(name.to_string(), Arc::clone(&gateway));
        Ok(gateway)
    }

    /// Build and register a gateway for a model in one step
    pub fn register_model(&mut self, model: &str) -> Result<Arc<TableGateway>, TablewerkError> {
        let gateway = self.build_gateway(model);
        self.register_gateway(model, gateway)
    }

    /// Get a registered gateway by name
    pub fn gateway(&self, name: &str) -> Result<Arc<TableGateway>, TablewerkError> {
        self.gateways
            .get(name)
            .cloned()
            .ok_or_else(|| TablewerkError::GatewayNotFound(name.to_string()))
    }

    /// List all registered gateway names
    pub fn list_gateways(&self) -> Vec<&String> {
        self.gateways.keys().collect()
    }

    /// Remove a gateway by name
    pub fn unregister_gateway(&mut self, name: &str) -> Result<(), TablewerkError> {
        self.gateways
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| TablewerkError::GatewayNotFound(name.to_string()))
    }

    /// Check database connection health
    pub async fn health_check(&self) -> Result<(), TablewerkError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
