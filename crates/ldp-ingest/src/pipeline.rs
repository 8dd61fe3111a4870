//! Pipeline orchestration for one ingest run
//!
//! Sequences `load checkpoint -> ingest -> save checkpoint`, with the save
//! executed on every exit path after a successful load. Only a load failure
//! leaves the store untouched; there is no prior position to protect then.

use ldp_common::Result;
use tracing::{debug, error, info};

use crate::checkpoint::CheckpointStore;
use crate::ingester::Ingester;
use crate::sink::SinkWriter;

/// Summary of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Absolute byte offset persisted at the end of the run.
    pub bytes_consumed: u64,
    /// Lines read, skipped blanks included.
    pub lines_read: u64,
    /// Records handed to the sink.
    pub records_written: u64,
    /// Bytes added to the checkpoint this run.
    pub bytes_ingested: u64,
}

/// One pipeline instance: a checkpoint store, a sink, and the ingester that
/// connects them. Both handles are injected at construction; the pipeline
/// never opens connections of its own.
pub struct Pipeline<C, S> {
    store: C,
    sink: S,
    ingester: Ingester,
}

impl<C, S> Pipeline<C, S>
where
    C: CheckpointStore,
    S: SinkWriter,
{
    pub fn new(store: C, sink: S, ingester: Ingester) -> Self {
        Self {
            store,
            sink,
            ingester,
        }
    }

    /// Execute one ingest run.
    ///
    /// The furthest offset the ingester reached is persisted whether the run
    /// completed or stopped on an error, so the next run resumes instead of
    /// restarting. A failed run surfaces its error only after the save.
    pub async fn run(&self) -> Result<RunSummary> {
        let checkpoint = self.store.load().await?;
        info!(
            position = checkpoint.bytes_consumed,
            source = %checkpoint.source_path.display(),
            "Starting ingest run"
        );

        let report = self.ingester.run(&checkpoint, &self.sink).await;

        if let Some(ref err) = report.error {
            error!(
                stage = err.stage(),
                bytes_ingested = report.bytes_ingested,
                error = %err,
                "Run stopped before reaching the end of the source"
            );
        }

        self.store.save(report.bytes_consumed).await?;
        debug!(position = report.bytes_consumed, "Checkpoint updated");

        match report.error {
            Some(err) => Err(err),
            None => {
                info!(
                    bytes_ingested = report.bytes_ingested,
                    records = report.records_written,
                    "Ingested batch"
                );
                Ok(RunSummary {
                    bytes_consumed: report.bytes_consumed,
                    lines_read: report.lines_read,
                    records_written: report.records_written,
                    bytes_ingested: report.bytes_ingested,
                })
            },
        }
    }
}
