//! Latency Recorder
//!
//! Persists one `(pred_time, pred)` row per inference to a CSV sink. Rows
//! are flushed as they are written so interrupted runs keep what they
//! measured.

mod recorder;

pub use recorder::{read_records, LatencyRecord, LatencyRecorder, SinkRow, SINK_HEADER};

use thiserror::Error;

/// Recorder errors
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("Sink I/O error on {path}: {reason}")]
    Io { path: String, reason: String },
    #[error("Malformed record in {path}: {reason}")]
    Malformed { path: String, reason: String },
}
