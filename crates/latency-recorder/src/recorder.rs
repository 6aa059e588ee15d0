//! Recorder Implementation

use crate::RecorderError;
use payload_codec::Prediction;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Column names written as the first row of every sink
pub const SINK_HEADER: [&str; 2] = ["pred_time", "pred"];

/// One measured inference
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyRecord {
    /// Seconds spent inside the inference call
    pub pred_time: f64,
    /// What the model predicted
    pub prediction: Prediction,
}

impl LatencyRecord {
    pub fn new(elapsed: Duration, prediction: Prediction) -> Self {
        Self {
            pred_time: elapsed.as_secs_f64(),
            prediction,
        }
    }
}

/// Row layout of the sink file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkRow {
    pub pred_time: f64,
    pub pred: String,
}

impl From<&LatencyRecord> for SinkRow {
    fn from(record: &LatencyRecord) -> Self {
        Self {
            pred_time: record.pred_time,
            pred: record.prediction.to_string(),
        }
    }
}

/// Append-only latency sink owned by one driver
pub struct LatencyRecorder {
    /// Sink location
    path: PathBuf,
    /// CSV writer over the open file
    writer: csv::Writer<File>,
    /// Rows appended since creation (header excluded)
    written: u64,
}

impl LatencyRecorder {
    /// Create or truncate the sink and write the header row
    pub fn create(path: impl AsRef<Path>) -> Result<Self, RecorderError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_error(&path, e))?;
        }

        let file = File::create(&path).map_err(|e| io_error(&path, e))?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(SINK_HEADER).map_err(|e| csv_error(&path, e))?;
        writer.flush().map_err(|e| io_error(&path, e))?;

        info!("Latency sink ready: {}", path.display());
        Ok(Self {
            path,
            writer,
            written: 0,
        })
    }

    /// Append one record and flush it to disk before returning
    pub fn record(&mut self, record: &LatencyRecord) -> Result<(), RecorderError> {
        self.writer
            .serialize(SinkRow::from(record))
            .map_err(|e| csv_error(&self.path, e))?;
        self.writer.flush().map_err(|e| io_error(&self.path, e))?;

        self.written += 1;
        debug!(
            "Recorded #{}: pred_time={:.6}s pred={}",
            self.written, record.pred_time, record.prediction
        );
        Ok(())
    }

    /// Number of records appended so far
    pub fn records_written(&self) -> u64 {
        self.written
    }

    /// Sink location
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read every row of a sink back, header excluded
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<SinkRow>, RecorderError> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path).map_err(|e| csv_error(path, e))?;

    reader
        .deserialize()
        .map(|row| {
            row.map_err(|e| RecorderError::Malformed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
        })
        .collect()
}

fn io_error(path: &Path, err: std::io::Error) -> RecorderError {
    RecorderError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

fn csv_error(path: &Path, err: csv::Error) -> RecorderError {
    RecorderError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}
