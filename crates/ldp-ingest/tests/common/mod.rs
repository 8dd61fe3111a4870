//! Shared test doubles for pipeline integration tests
//!
//! In-memory checkpoint store and sink with failure injection, plus helpers
//! for building log files in a temp directory.

use async_trait::async_trait;
use ldp_common::{PipelineError, Result};
use ldp_ingest::checkpoint::{Checkpoint, CheckpointStore};
use ldp_ingest::sink::SinkWriter;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// In-memory checkpoint store holding the single record.
pub struct MemoryCheckpointStore {
    checkpoint: Mutex<Checkpoint>,
    saved: Mutex<Vec<u64>>,
    fail_load: bool,
    fail_save: bool,
}

impl MemoryCheckpointStore {
    pub fn new(bytes_consumed: u64, source_path: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint: Mutex::new(Checkpoint {
                bytes_consumed,
                source_path: source_path.into(),
            }),
            saved: Mutex::new(Vec::new()),
            fail_load: false,
            fail_save: false,
        }
    }

    pub fn failing_load(mut self) -> Self {
        self.fail_load = true;
        self
    }

    pub fn failing_save(mut self) -> Self {
        self.fail_save = true;
        self
    }

    /// Every offset passed to `save`, in call order.
    pub fn saved_offsets(&self) -> Vec<u64> {
        self.saved.lock().unwrap().clone()
    }

    /// The currently stored offset.
    pub fn position(&self) -> u64 {
        self.checkpoint.lock().unwrap().bytes_consumed
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> Result<Checkpoint> {
        if self.fail_load {
            return Err(PipelineError::configuration("injected load failure"));
        }
        Ok(self.checkpoint.lock().unwrap().clone())
    }

    async fn save(&self, bytes_consumed: u64) -> Result<()> {
        if self.fail_save {
            return Err(PipelineError::CheckpointPersist(
                "injected save failure".to_string(),
            ));
        }
        self.saved.lock().unwrap().push(bytes_consumed);
        self.checkpoint.lock().unwrap().bytes_consumed = bytes_consumed;
        Ok(())
    }
}

/// In-memory sink, optionally rejecting writes after N successes.
pub struct MemorySink {
    records: Mutex<Vec<Map<String, Value>>>,
    fail_after: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail_after: None,
        }
    }

    /// Accept `count` writes, then fail every one after.
    pub fn failing_after(count: usize) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail_after: Some(count),
        }
    }

    pub fn records(&self) -> Vec<Map<String, Value>> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl SinkWriter for MemorySink {
    async fn write(&self, record: &Map<String, Value>) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        if let Some(limit) = self.fail_after {
            if records.len() >= limit {
                return Err(PipelineError::sink_write("injected sink failure"));
            }
        }
        records.push(record.clone());
        Ok(())
    }
}

/// Write `contents` to `name` under `dir`, returning the path.
pub fn write_log(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Append `contents` to an existing log file.
pub fn append_log(path: &Path, contents: &str) {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
}

/// A well-formed access-log line, newline-terminated.
pub fn log_line(n: u32) -> String {
    format!(
        "{{\"time\":\"2026-08-07T10:00:{:02}Z\",\"ClientHost\":\"10.0.0.{}\",\"DownstreamStatus\":200}}\n",
        n % 60,
        n
    )
}
