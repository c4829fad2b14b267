//! # Tablewerk
//!
//! A single-table data-access layer for PostgreSQL: declarative query
//! options finalized against introspected schemas, CRUD commands with
//! lifecycle hooks, result caching, and lazy-write coalescing for
//! high-frequency counters.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tablewerk::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let mut werk = Tablewerk::from_config(config).await?;
//!
//!     // One gateway per table; "User" resolves to prefix + "user"
//!     let users = werk.register_model("User")?;
//!
//!     let id = users
//!         .add(Row::new().with("name", "John Doe"), Query::new())
//!         .await?;
//!     println!("Created user: {:?}", id);
//!
//!     let user = users.find(Query::new().where_eq("name", "John Doe")).await?;
//!     println!("Found: {:?}", user);
//!
//!     // Buffered counter: one write per window, not per call
//!     users
//!         .set_inc(Query::new().where_eq("name", "John Doe"), "logins", 1, Some(60))
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod errors;
pub mod prelude;

// Re-export the main public types for convenience
pub use crate::core::Tablewerk;
pub use errors::TablewerkError;

// Re-export centralized config
pub use config::{AppConfig, CacheConfig, DatabaseConfig, GatewayConfig};

// Re-export member crates
pub use cache_system;
pub use table_gateway;
pub use type_mapping;

// Re-export external dependencies used in public API
pub use async_trait;
pub use sqlx;
