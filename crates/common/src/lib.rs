//! RxCatalog Common Library
//!
//! Shared code for the RxCatalog services including:
//! - Catalog entity models and the store access trait
//! - Postgres-backed store implementation
//! - Error types and handling
//! - Configuration management
//! - Metrics helpers

pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{CatalogStore, DbPool, PgCatalogStore, UpsertStats};
pub use errors::{AppError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default upsert batch size for small reference tables
pub const DEFAULT_REFERENCE_BATCH_SIZE: usize = 100;

/// Default upsert batch size for the medicines table
pub const DEFAULT_MEDICINE_BATCH_SIZE: usize = 500;
