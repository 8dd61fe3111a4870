//! Destination schema provisioning
//!
//! Creates the warehouse, staging, and checkpoint tables and seeds the single
//! checkpoint row at offset zero. Run once before the first ingest; refuses
//! to seed a second checkpoint.

use ldp_common::{PipelineError, Result};
use sqlx::PgPool;
use std::path::Path;
use tracing::info;

/// Warehouse table: one column per destination field of the flat record.
const CREATE_LOGS: &str = r#"
CREATE TABLE IF NOT EXISTS logs (
    id BIGSERIAL PRIMARY KEY,
    "ds" TIMESTAMPTZ,
    "ClientHost" VARCHAR(45),
    "ClientPort" VARCHAR(5),
    "ClientUsername" VARCHAR(25),
    "DownstreamContentSize" BIGINT,
    "DownstreamStatus" BIGINT,
    "Duration" BIGINT,
    "OriginContentSize" BIGINT,
    "OriginDuration" BIGINT,
    "OriginStatus" BIGINT,
    "Overhead" BIGINT,
    "RequestAddr" VARCHAR(50),
    "RequestContentSize" BIGINT,
    "RequestCount" BIGINT,
    "RequestHost" VARCHAR(50),
    "RequestMethod" VARCHAR(10),
    "RequestPath" TEXT,
    "RequestPort" VARCHAR(10),
    "RequestProtocol" VARCHAR(15),
    "RetryAttempts" BIGINT,
    "RouterName" VARCHAR(50),
    "ServiceAddr" VARCHAR(25),
    "ServiceName" VARCHAR(50),
    "ServiceScheme" VARCHAR(10),
    "ServiceUrlPath" TEXT,
    "ServiceUrlRawPath" TEXT,
    "ServiceUrlRawQuery" TEXT,
    "ServiceUrlFragment" TEXT,
    "entryPointName" VARCHAR(10),
    "level" VARCHAR(10),
    "msg" TEXT
)
"#;

/// Staging table: undecoded lines with their datestamp, for downstream jobs
/// that batch by date.
const CREATE_LOGS_STAGED: &str = r#"
CREATE TABLE IF NOT EXISTS logs_staged (
    id BIGSERIAL PRIMARY KEY,
    ds TIMESTAMPTZ,
    log TEXT NOT NULL
)
"#;

/// Checkpoint table. Holds exactly one row per pipeline instance.
const CREATE_PIPELINE_META: &str = r#"
CREATE TABLE IF NOT EXISTS pipeline_meta (
    id BIGSERIAL PRIMARY KEY,
    bytes_read BIGINT NOT NULL,
    log_file TEXT NOT NULL
)
"#;

/// Provision the destination schema and seed the checkpoint at offset zero.
pub async fn provision(pool: &PgPool, log_path: &Path) -> Result<()> {
    for statement in [CREATE_LOGS, CREATE_LOGS_STAGED, CREATE_PIPELINE_META] {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| PipelineError::Database(e.to_string()))?;
    }

    let (existing,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pipeline_meta")
        .fetch_one(pool)
        .await
        .map_err(|e| PipelineError::Database(e.to_string()))?;
    if existing > 0 {
        return Err(PipelineError::configuration(format!(
            "pipeline_meta already holds {} checkpoint(s); refusing to seed another",
            existing
        )));
    }

    sqlx::query("INSERT INTO pipeline_meta (bytes_read, log_file) VALUES (0, $1)")
        .bind(log_path.to_string_lossy().into_owned())
        .execute(pool)
        .await
        .map_err(|e| PipelineError::Database(e.to_string()))?;

    info!(log_file = %log_path.display(), "Database provisioned");
    Ok(())
}
