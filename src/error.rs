//! Error types shared by the pipeline stages.

use std::path::PathBuf;
use std::time::Duration;

/// Fatal errors that abort a pipeline stage.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("input file not found: {}", path.display())]
    SourceMissing { path: PathBuf },

    #[error("{} is missing required column '{column}'", path.display())]
    MissingColumn { path: PathBuf, column: &'static str },

    /// A record violates a guarantee the previous stage was supposed to uphold.
    #[error("row {row}: {reason}")]
    InvariantViolation { row: usize, reason: String },

    #[error("failed to move output into place at {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure of a single address lookup. Never fatal to a batch.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("undecodable response: {0}")]
    Decode(String),

    #[error("lookup timed out after {0:?}")]
    Timeout(Duration),

    #[error("coordinate out of range: ({lat}, {lon})")]
    InvalidCoordinate { lat: f64, lon: f64 },
}
