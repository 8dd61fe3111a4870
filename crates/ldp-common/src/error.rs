//! Error types for the log data pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline
///
/// Every failure a run can hit maps to one of these variants, so the
/// orchestrator can tell which stage stopped the run and whether the
/// checkpoint still needs to be persisted.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Checkpoint table holds zero or more than one row, or process
    /// configuration is unusable. Fatal before the source is touched.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The tracked log file does not exist at the recorded path.
    #[error("Source log file not found: {0}")]
    SourceMissing(String),

    /// The stored offset points beyond the end of the source file.
    /// Never clamped; a position ahead of the data means corruption.
    #[error("Stored position {position} is beyond source size {size} bytes")]
    PositionInvalid { position: u64, size: u64 },

    /// A line failed UTF-8/JSON decoding or lacks a required field.
    #[error("Malformed log line: {0}")]
    Malformed(String),

    /// The destination rejected a record.
    #[error("Sink write failed: {0}")]
    SinkWrite(String),

    /// The final checkpoint save failed. The run's work was done but not
    /// recorded; the operator must intervene.
    #[error("Checkpoint persist failed: {0}")]
    CheckpointPersist(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(String),
}

impl PipelineError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a malformed-line error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Create a sink write error
    pub fn sink_write(message: impl Into<String>) -> Self {
        Self::SinkWrite(message.into())
    }

    /// Name of the pipeline stage this error stops, for run logs.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "setup",
            Self::SourceMissing(_) | Self::PositionInvalid { .. } => "validate",
            Self::Malformed(_) => "transform",
            Self::SinkWrite(_) => "sink",
            Self::CheckpointPersist(_) => "checkpoint",
            Self::Io(_) | Self::Serialization(_) | Self::Database(_) => "io",
        }
    }
}
