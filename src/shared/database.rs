//! PostgreSQL connection pool setup

use crate::shared::{config::DatabaseConfig, error::AppError, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::info;

pub async fn create_db_pool(config: &DatabaseConfig) -> Result<PgPool> {
    info!(
        "Initializing database pool with {} max connections",
        config.max_connections
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        .max_lifetime(Duration::from_secs(config.max_lifetime_seconds))
        .test_before_acquire(true)
        .connect(&config.url)
        .await
        .map_err(|e| AppError::configuration(format!("Failed to connect to database: {}", e)))?;

    // Test the connection
    sqlx::query("SELECT 1")
        .fetch_one(&pool)
        .await
        .map_err(|e| AppError::configuration(format!("Database health check failed: {}", e)))?;

    info!("Database pool initialized successfully");

    Ok(pool)
}
