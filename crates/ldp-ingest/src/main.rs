//! LDP - incremental log file ingestion pipeline

use anyhow::Result;
use clap::{Parser, Subcommand};
use ldp_common::logging::{init_logging, LogConfig, LogLevel};
use ldp_ingest::checkpoint::{CheckpointStore, PgCheckpointStore};
use ldp_ingest::config::{self, Config};
use ldp_ingest::ingester::{IngestMode, Ingester};
use ldp_ingest::pipeline::Pipeline;
use ldp_ingest::progress::format_bytes;
use ldp_ingest::provision;
use ldp_ingest::sink::{PgSinkWriter, PgStagingSink, SinkWriter};
use sqlx::PgPool;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "ldp")]
#[command(author, version, about = "Incremental log file ingestion pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the destination schema and seed the checkpoint at offset zero
    Provision {
        /// Log file to track
        #[arg(short, long, env = "LOG_PATH", default_value = config::DEFAULT_LOG_PATH)]
        log_file: PathBuf,
    },

    /// Run one warehouse ingest batch (transformed records into `logs`)
    Run,

    /// Run one staging ingest batch (raw lines into `logs_staged`)
    Stage,

    /// Show checkpoint position, source size, and pending bytes
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env()
        .unwrap_or_default()
        .with_file_prefix("ldp");
    if cli.verbose {
        log_config = log_config.with_level(LogLevel::Debug);
    }
    init_logging(&log_config)?;

    let config = Config::load()?;
    let pool = config::connect_pool(&config.database).await?;

    match cli.command {
        Command::Provision { log_file } => {
            provision::provision(&pool, &log_file).await?;
        },
        Command::Run => {
            let sink = PgSinkWriter::new(pool.clone());
            run_pipeline(&config, pool.clone(), sink, IngestMode::Warehouse).await?;
        },
        Command::Stage => {
            let sink = PgStagingSink::new(pool.clone());
            run_pipeline(&config, pool.clone(), sink, IngestMode::Staging).await?;
        },
        Command::Status => {
            status(pool.clone()).await?;
        },
    }

    pool.close().await;
    Ok(())
}

/// Build the pipeline for one run and execute it.
///
/// A run error propagates after the checkpoint save, so the process exit
/// status tells the scheduler to alert or retry.
async fn run_pipeline<S: SinkWriter>(
    config: &Config,
    pool: PgPool,
    sink: S,
    mode: IngestMode,
) -> Result<()> {
    let ingester = Ingester::new(mode)
        .with_policy(config.advance_policy)
        .with_progress(true);
    let pipeline = Pipeline::new(PgCheckpointStore::new(pool), sink, ingester);

    let summary = pipeline.run().await?;
    info!(
        records = summary.records_written,
        bytes = %format_bytes(summary.bytes_ingested),
        position = summary.bytes_consumed,
        "Run complete"
    );
    Ok(())
}

/// Print the checkpoint position against the current source size.
async fn status(pool: PgPool) -> Result<()> {
    let store = PgCheckpointStore::new(pool);
    let checkpoint = store.load().await?;
    let checked_at = chrono::Utc::now().to_rfc3339();

    match tokio::fs::metadata(&checkpoint.source_path).await {
        Ok(metadata) => {
            let size = metadata.len();
            info!(
                checked_at = %checked_at,
                source = %checkpoint.source_path.display(),
                position = checkpoint.bytes_consumed,
                size,
                pending = %format_bytes(size.saturating_sub(checkpoint.bytes_consumed)),
                "Pipeline status"
            );
        },
        Err(_) => {
            warn!(
                checked_at = %checked_at,
                source = %checkpoint.source_path.display(),
                position = checkpoint.bytes_consumed,
                "Source file is missing"
            );
        },
    }
    Ok(())
}
