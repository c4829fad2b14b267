//! Convenience re-exports for common Tablewerk usage
//!
//! This prelude module re-exports the most commonly used items from
//! the Tablewerk ecosystem, making it easier to import everything you
//! need with a single use statement.
//!
//! # Example
//!
//! ```rust
//! use tablewerk::prelude::*;
//!
//! // Now you have access to all the common Tablewerk types and traits
//! ```

// Core components
pub use crate::core::Tablewerk;
pub use crate::errors::TablewerkError;

// Re-export centralized config
pub use config::{AppConfig, CacheConfig, DatabaseConfig, GatewayConfig};

// The gateway surface: commands, options, results, hooks
pub use table_gateway::prelude::*;

// Re-export cache system
pub use cache_system::prelude::*;

// Common external dependencies
pub use anyhow;
pub use async_trait;
pub use sqlx;
pub use tokio;

// Commonly used sqlx types
pub use sqlx::{PgPool, Postgres, Transaction};
