//! Configuration management

use ldp_common::{PipelineError, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::ingester::AdvancePolicy;

// ============================================================================
// Pipeline Configuration Constants
// ============================================================================

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/ldp";

/// Default source log file path (provisioning time only).
pub const DEFAULT_LOG_PATH: &str = "./data/access-logs.json";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Process configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,

    /// When a line's bytes count toward the checkpoint offset.
    pub advance_policy: AdvancePolicy,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load configuration from the environment (and `.env` when present)
    ///
    /// - `DATABASE_URL`: connection target
    /// - `DATABASE_MAX_CONNECTIONS`, `DATABASE_CONNECT_TIMEOUT`: pool sizing
    /// - `LDP_ADVANCE_POLICY`: `on-read` or `after-write`
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database = DatabaseConfig {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
            connect_timeout_secs: std::env::var("DATABASE_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS),
        };

        let advance_policy = match std::env::var("LDP_ADVANCE_POLICY") {
            Ok(value) => value.parse().map_err(PipelineError::configuration)?,
            Err(_) => AdvancePolicy::default(),
        };

        Ok(Config {
            database,
            advance_policy,
        })
    }
}

/// Open the process-wide connection pool.
///
/// Built once at startup and handed to the orchestrator; runs never open
/// connections of their own.
pub async fn connect_pool(config: &DatabaseConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect(&config.url)
        .await
        .map_err(|e| PipelineError::Database(format!("failed to open connection pool: {}", e)))
}
