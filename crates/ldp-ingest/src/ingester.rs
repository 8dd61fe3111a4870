//! Batch ingester: the read-seek-process-advance loop
//!
//! One run moves through `Validating -> Reading -> Done`, dropping into a
//! draining stop on the first line that fails. The byte counter is the heart
//! of the loop: every line read advances it by exactly the line's byte length
//! (terminator included), whether the line was skipped as blank or written to
//! the sink, so the stored offset stays byte-accurate across runs.

use indicatif::ProgressBar;
use ldp_common::{PipelineError, Result};
use serde_json::{Map, Value};
use std::io::SeekFrom;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tracing::{debug, info, warn};

use crate::checkpoint::Checkpoint;
use crate::progress;
use crate::sink::SinkWriter;
use crate::transform;

/// When a line's bytes count toward the checkpoint offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdvancePolicy {
    /// Count a line as consumed at read time, before its processing is known
    /// to succeed. A failing line is skipped, not retried, on the next run:
    /// at-most-once per line on error.
    OnRead,

    /// Count a line only once it is fully handled (skipped as blank, or
    /// written to the sink). A failing line is reprocessed on the next run:
    /// at-least-once, no silent loss.
    #[default]
    AfterWrite,
}

impl std::str::FromStr for AdvancePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "on-read" | "on_read" | "onread" => Ok(AdvancePolicy::OnRead),
            "after-write" | "after_write" | "afterwrite" => Ok(AdvancePolicy::AfterWrite),
            other => Err(format!("Invalid advance policy: {}", other)),
        }
    }
}

/// Which record shape a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestMode {
    /// Transform each line into the flat warehouse shape.
    #[default]
    Warehouse,
    /// Keep each raw line, paired with its timestamp.
    Staging,
}

/// Outcome of one ingester run.
///
/// Produced on every path, including failures, so the orchestrator always
/// has the furthest offset to persist.
#[derive(Debug)]
pub struct IngestReport {
    /// Absolute byte offset to checkpoint after this run.
    pub bytes_consumed: u64,

    /// Lines read this run, skipped blanks included.
    pub lines_read: u64,

    /// Records handed to the sink.
    pub records_written: u64,

    /// Bytes this run added to the checkpoint offset.
    pub bytes_ingested: u64,

    /// The error that stopped reading, if any.
    pub error: Option<PipelineError>,
}

/// The read-seek-process-advance loop over one source file.
pub struct Ingester {
    mode: IngestMode,
    policy: AdvancePolicy,
    show_progress: bool,
}

impl Ingester {
    pub fn new(mode: IngestMode) -> Self {
        Self {
            mode,
            policy: AdvancePolicy::default(),
            show_progress: false,
        }
    }

    pub fn with_policy(mut self, policy: AdvancePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Run once against the given checkpoint.
    ///
    /// Validates the stored position against the source, then reads forward
    /// line by line until the size snapshot is reached or a line fails. The
    /// returned report carries the furthest offset on every path.
    pub async fn run<S>(&self, checkpoint: &Checkpoint, sink: &S) -> IngestReport
    where
        S: SinkWriter + ?Sized,
    {
        let start = checkpoint.bytes_consumed;
        let mut report = IngestReport {
            bytes_consumed: start,
            lines_read: 0,
            records_written: 0,
            bytes_ingested: 0,
            error: None,
        };

        let outcome = match self.validate(checkpoint).await {
            Ok(None) => Ok(()),
            Ok(Some(size)) => {
                info!(size, position = start, "Reading source");
                self.read_from(checkpoint, size, sink, &mut report).await
            },
            Err(err) => Err(err),
        };

        if let Err(err) = outcome {
            report.error = Some(err);
        }
        report.bytes_ingested = report.bytes_consumed - start;
        report
    }

    /// Validate the checkpoint against the source file.
    ///
    /// Returns the size snapshot to read up to, or `None` when the source
    /// holds nothing new. Appends that land during the run are not chased;
    /// they are picked up by the next run.
    async fn validate(&self, checkpoint: &Checkpoint) -> Result<Option<u64>> {
        let path = &checkpoint.source_path;
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PipelineError::SourceMissing(path.display().to_string()));
            },
            Err(e) => return Err(e.into()),
        };

        let size = metadata.len();
        if checkpoint.bytes_consumed > size {
            // Position ahead of the data is corruption, never clamped.
            return Err(PipelineError::PositionInvalid {
                position: checkpoint.bytes_consumed,
                size,
            });
        }
        if checkpoint.bytes_consumed == size {
            info!(size, "No new logs to ingest");
            return Ok(None);
        }
        Ok(Some(size))
    }

    async fn read_from<S>(
        &self,
        checkpoint: &Checkpoint,
        size: u64,
        sink: &S,
        report: &mut IngestReport,
    ) -> Result<()>
    where
        S: SinkWriter + ?Sized,
    {
        let file = File::open(&checkpoint.source_path).await?;
        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(checkpoint.bytes_consumed)).await?;

        let bar = if self.show_progress {
            progress::ingest_progress(size - checkpoint.bytes_consumed)
        } else {
            ProgressBar::hidden()
        };

        let mut cursor = checkpoint.bytes_consumed;
        let mut buf = Vec::new();
        while cursor < size {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf).await? as u64;
            if read == 0 {
                // The snapshot says more bytes exist but the file ended:
                // the source shrank mid-run.
                warn!(cursor, size, "Source ended before the validated size");
                return Err(PipelineError::PositionInvalid {
                    position: size,
                    size: cursor,
                });
            }

            report.lines_read += 1;
            let offset = cursor;
            cursor += read;
            if self.policy == AdvancePolicy::OnRead {
                report.bytes_consumed = cursor;
            }

            self.handle_line(&buf, offset, sink, report).await?;

            report.bytes_consumed = cursor;
            bar.inc(read);
        }
        bar.finish_and_clear();

        debug!(lines = report.lines_read, cursor, "Reached size snapshot");
        Ok(())
    }

    /// Process one raw line: decode, shape, write.
    ///
    /// Blank lines are skipped here; the caller still counts their bytes so
    /// the offset stays byte-accurate.
    async fn handle_line<S>(
        &self,
        raw: &[u8],
        offset: u64,
        sink: &S,
        report: &mut IngestReport,
    ) -> Result<()>
    where
        S: SinkWriter + ?Sized,
    {
        let text = std::str::from_utf8(raw).map_err(|e| {
            PipelineError::malformed(format!("invalid UTF-8 at byte offset {}: {}", offset, e))
        })?;
        let line = text.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Ok(());
        }

        let decoded: Map<String, Value> = serde_json::from_str(line).map_err(|e| {
            PipelineError::malformed(format!("invalid JSON at byte offset {}: {}", offset, e))
        })?;

        let record = match self.mode {
            IngestMode::Warehouse => transform::transform(decoded)?,
            IngestMode::Staging => transform::stage(line, &decoded),
        };

        sink.write(&record).await?;
        report.records_written += 1;
        Ok(())
    }
}
