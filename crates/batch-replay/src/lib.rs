//! Batch Replay
//!
//! Replays pre-stored feature tables against locally stored models, one job
//! at a time, writing the same latency records the live session writes.

mod driver;
mod job;
mod table;

pub use driver::{BatchReplayDriver, JobReport, JobStats};
pub use job::{BatchJob, JobTemplate};
pub use table::{FeatureTable, DEFAULT_METADATA_COLUMNS};

use inference_engine::InferenceError;
use latency_recorder::RecorderError;
use thiserror::Error;

/// Metric names emitted by the replay path
pub mod metric {
    /// Rows replayed across all jobs
    pub const ROWS: &str = "lightcard_batch_rows_total";
    /// Jobs that stopped with an error
    pub const JOBS_FAILED: &str = "lightcard_batch_jobs_failed_total";
    /// Seconds spent inside the inference call
    pub const INFERENCE_SECONDS: &str = "lightcard_inference_seconds";
}

/// Errors that stop a single batch job
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Failed to load model {path}: {source}")]
    Model { path: String, source: InferenceError },

    #[error("Failed to read feature table {path}: {reason}")]
    Table { path: String, reason: String },

    #[error("Invalid feature table {path}: {reason}")]
    InvalidTable { path: String, reason: String },

    #[error("Inference failed on row {row}: {source}")]
    Inference { row: usize, source: InferenceError },

    #[error(transparent)]
    Recorder(#[from] RecorderError),
}
