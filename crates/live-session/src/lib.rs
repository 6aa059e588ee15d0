//! Live Inference Session
//!
//! Accepts exactly one peer, then answers framed feature vectors with framed
//! predictions until the peer goes away or stops talking. Every inference is
//! timed and appended to the latency sink before the next request is read.

mod client;
mod server;
mod session;

pub use client::RemoteClient;
pub use server::Server;
pub use session::{EndReason, Session, SessionConfig, SessionState, SessionSummary};

use frame_protocol::FrameError;
use inference_engine::InferenceError;
use latency_recorder::RecorderError;
use payload_codec::CodecError;
use thiserror::Error;

/// Metric names emitted by the live path
pub mod metric {
    /// Requests answered (or attempted) by the session
    pub const REQUESTS: &str = "lightcard_requests_total";
    /// Responses that could not be delivered
    pub const SEND_FAILURES: &str = "lightcard_send_failures_total";
    /// Seconds spent inside the inference call
    pub const INFERENCE_SECONDS: &str = "lightcard_inference_seconds";
}

/// Errors that end a session or client abnormally
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("Failed to accept connection: {0}")]
    Accept(String),

    #[error("Failed to connect to {addr}: {reason}")]
    Connect { addr: String, reason: String },

    #[error("Peer closed the connection")]
    PeerClosed,

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Recorder(#[from] RecorderError),
}
