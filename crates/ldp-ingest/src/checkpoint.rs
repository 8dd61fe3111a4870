//! Checkpoint persistence and validation
//!
//! The checkpoint is the single durably stored byte offset marking how much
//! of the source log file has been consumed. It lives in the one-row
//! `pipeline_meta` table: zero rows means the pipeline was never provisioned,
//! more than one means two pipelines were pointed at the same table. Both are
//! fatal setup errors, never worked around.

use async_trait::async_trait;
use ldp_common::{PipelineError, Result};
use sqlx::{PgPool, Row};
use std::path::PathBuf;
use std::sync::Arc;

/// Consumption progress for one pipeline instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    /// Exact byte offset of the next unread byte in the source file.
    pub bytes_consumed: u64,

    /// The log file this checkpoint tracks.
    pub source_path: PathBuf,
}

/// Storage boundary for the checkpoint record.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the single checkpoint.
    ///
    /// Fails with [`PipelineError::Configuration`] when the store holds zero
    /// or more than one record.
    async fn load(&self) -> Result<Checkpoint>;

    /// Unconditionally overwrite the stored offset.
    ///
    /// This is the last action of every run and must stay callable while the
    /// caller is unwinding from an ingest error. No retry logic; a failure
    /// surfaces as [`PipelineError::CheckpointPersist`].
    async fn save(&self, bytes_consumed: u64) -> Result<()>;
}

#[async_trait]
impl<T: CheckpointStore + ?Sized> CheckpointStore for Arc<T> {
    async fn load(&self) -> Result<Checkpoint> {
        self.as_ref().load().await
    }

    async fn save(&self, bytes_consumed: u64) -> Result<()> {
        self.as_ref().save(bytes_consumed).await
    }
}

/// Checkpoint store backed by the single-row `pipeline_meta` table.
pub struct PgCheckpointStore {
    pool: PgPool,
}

impl PgCheckpointStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CheckpointStore for PgCheckpointStore {
    async fn load(&self) -> Result<Checkpoint> {
        let rows = sqlx::query("SELECT bytes_read, log_file FROM pipeline_meta")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PipelineError::Database(e.to_string()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let bytes_read: i64 = row
                .try_get("bytes_read")
                .map_err(|e| PipelineError::Database(e.to_string()))?;
            let log_file: String = row
                .try_get("log_file")
                .map_err(|e| PipelineError::Database(e.to_string()))?;
            records.push((bytes_read, log_file));
        }

        single_checkpoint(records)
    }

    async fn save(&self, bytes_consumed: u64) -> Result<()> {
        let bytes = i64::try_from(bytes_consumed).map_err(|_| {
            PipelineError::CheckpointPersist(format!(
                "offset {} does not fit the bytes_read column",
                bytes_consumed
            ))
        })?;

        // No WHERE clause: the single-row invariant makes one the only
        // acceptable update count, so a drifted table is caught here too.
        let result = sqlx::query("UPDATE pipeline_meta SET bytes_read = $1")
            .bind(bytes)
            .execute(&self.pool)
            .await
            .map_err(|e| PipelineError::CheckpointPersist(e.to_string()))?;

        match result.rows_affected() {
            1 => Ok(()),
            n => Err(PipelineError::CheckpointPersist(format!(
                "expected to update exactly one pipeline_meta row, updated {}",
                n
            ))),
        }
    }
}

/// Reduce the rows of `pipeline_meta` to the one checkpoint they must hold.
fn single_checkpoint(records: Vec<(i64, String)>) -> Result<Checkpoint> {
    match records.len() {
        0 => Err(PipelineError::configuration(
            "pipeline_meta holds no checkpoint; run `ldp provision` first",
        )),
        1 => {
            let (bytes_read, log_file) = records.into_iter().next().ok_or_else(|| {
                PipelineError::configuration("pipeline_meta row vanished while loading")
            })?;
            let bytes_consumed = u64::try_from(bytes_read).map_err(|_| {
                PipelineError::configuration(format!(
                    "stored byte offset {} is negative",
                    bytes_read
                ))
            })?;
            Ok(Checkpoint {
                bytes_consumed,
                source_path: PathBuf::from(log_file),
            })
        },
        n => Err(PipelineError::configuration(format!(
            "pipeline_meta holds {} checkpoints, expected exactly one",
            n
        ))),
    }
}
