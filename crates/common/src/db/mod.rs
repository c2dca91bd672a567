//! Database layer for RxCatalog
//!
//! Provides:
//! - Catalog entity models
//! - The `CatalogStore` trait (the pipeline's only boundary with the store)
//! - Postgres-backed store implementation
//! - Connection pool management and embedded migrations

pub mod models;
mod store;

pub use store::{CatalogStore, PgCatalogStore, UpsertStats};

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    /// Primary connection pool (for writes)
    pub primary: PgPool,

    /// Read replica pool (optional)
    pub replica: Option<PgPool>,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to primary database...");

        let primary = Self::connect(&config.url, config).await?;

        // Connect to replica if configured
        let replica = if let Some(ref read_url) = config.read_url {
            info!("Connecting to read replica...");
            Some(Self::connect(read_url, config).await?)
        } else {
            None
        };

        info!("Database connections established");

        Ok(Self { primary, replica })
    }

    async fn connect(url: &str, config: &DatabaseConfig) -> Result<PgPool> {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect(url)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect: {}", e),
            })
    }

    /// Run embedded migrations against the primary
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.primary).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Get the pool for reads (replica if available, otherwise primary)
    pub fn read(&self) -> &PgPool {
        self.replica.as_ref().unwrap_or(&self.primary)
    }

    /// Get the pool for writes (always primary)
    pub fn write(&self) -> &PgPool {
        &self.primary
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.primary)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Primary ping failed: {}", e),
            })?;

        if let Some(ref replica) = self.replica {
            sqlx::query("SELECT 1")
                .execute(replica)
                .await
                .map_err(|e| AppError::DatabaseConnection {
                    message: format!("Replica ping failed: {}", e),
                })?;
        }

        Ok(())
    }
}
