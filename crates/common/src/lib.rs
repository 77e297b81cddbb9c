//! Quire Common Library
//!
//! Shared code for the Quire content API including:
//! - Database entities, connection pool and schema bootstrap
//! - Post aggregate service and post filtering
//! - Tag resolution, orphan collection and the deferred sweeper
//! - Section management
//! - Error types and handling
//! - Configuration management
//! - Metrics

pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod posts;
pub mod sections;
pub mod tags;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::DbPool;
pub use errors::{AppError, Result};
pub use posts::{PostDetail, PostFilter};
pub use tags::OrphanSweeper;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
