//! Framing Error Types

use thiserror::Error;

/// Errors that can occur while moving frames over the connection
#[derive(Debug, Error)]
pub enum FrameError {
    /// Underlying stream error (reset, broken pipe, ...)
    #[error("I/O error: {0}")]
    Io(String),

    /// No complete frame moved before the armed timeout expired
    #[error("Timeout waiting for frame after {0}ms")]
    Timeout(u64),

    /// Declared or outgoing length is over the configured limit
    #[error("Frame of {declared} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { declared: u64, limit: u64 },
}

impl FrameError {
    /// Whether this error came from an expired timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, FrameError::Timeout(_))
    }
}

impl From<std::io::Error> for FrameError {
    fn from(err: std::io::Error) -> Self {
        FrameError::Io(err.to_string())
    }
}
