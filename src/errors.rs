//! Error types for the Tablewerk crate
//!
//! This module contains all error types that can be returned by the
//! top-level coordinator.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TablewerkError {
    #[error("Database connection error: {0}")]
    DatabaseConnection(#[from] sqlx::Error),

    #[error("Table gateway not found: {0}")]
    GatewayNotFound(String),

    #[error("Table gateway already registered: {0}")]
    GatewayAlreadyRegistered(String),

    #[error("Cache error: {0}")]
    Cache(#[from] cache_system::CacheError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
