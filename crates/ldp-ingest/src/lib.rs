//! LDP Ingest Library
//!
//! Incremental, resumable ingestion of an append-only, line-delimited JSON
//! log file into Postgres, with crash-safe checkpointing of consumption
//! progress. Designed to be run frequently from a scheduler; each run
//! processes only the bytes appended since the last run.
//!
//! # Components
//!
//! - [`checkpoint`]: the durably stored byte offset and its store boundary
//! - [`transform`]: per-line shaping into warehouse or staging records
//! - [`sink`]: destination writers (`logs` and `logs_staged`)
//! - [`ingester`]: the read-seek-process-advance loop
//! - [`pipeline`]: one run = load checkpoint, ingest, save checkpoint
//! - [`provision`]: schema creation and checkpoint seeding
//!
//! # Example
//!
//! ```no_run
//! use ldp_ingest::checkpoint::PgCheckpointStore;
//! use ldp_ingest::ingester::{IngestMode, Ingester};
//! use ldp_ingest::pipeline::Pipeline;
//! use ldp_ingest::sink::PgSinkWriter;
//!
//! # async fn run(pool: sqlx::PgPool) -> ldp_common::Result<()> {
//! let pipeline = Pipeline::new(
//!     PgCheckpointStore::new(pool.clone()),
//!     PgSinkWriter::new(pool),
//!     Ingester::new(IngestMode::Warehouse),
//! );
//! let _summary = pipeline.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod checkpoint;
pub mod config;
pub mod ingester;
pub mod pipeline;
pub mod progress;
pub mod provision;
pub mod sink;
pub mod transform;

pub use checkpoint::{Checkpoint, CheckpointStore, PgCheckpointStore};
pub use ingester::{AdvancePolicy, IngestMode, IngestReport, Ingester};
pub use pipeline::{Pipeline, RunSummary};
pub use sink::{PgSinkWriter, PgStagingSink, SinkWriter};
