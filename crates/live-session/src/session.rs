//! Session Driver

use crate::{metric, SessionError};
use frame_protocol::{FrameError, FramedTransport, Received, TransportStats, DEFAULT_MAX_FRAME_BYTES};
use inference_engine::InferencePort;
use latency_recorder::{LatencyRecord, LatencyRecorder};
use payload_codec::{FeatureVector, Prediction, WireFormat};
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

/// Default receive timeout armed when the peer connects
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of back-to-back failed sends that ends the session
pub const DEFAULT_MAX_SEND_FAILURES: u32 = 3;

/// Session tuning
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Limit for each receive, armed on connect
    pub read_timeout: Duration,
    /// Limit for each send
    pub write_timeout: Option<Duration>,
    /// Largest payload accepted from the peer
    pub max_frame_bytes: usize,
    /// Payload serialization shared with the peer
    pub wire_format: WireFormat,
    /// Consecutive failed sends tolerated before closing; `None` never closes
    pub max_consecutive_send_failures: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: Some(DEFAULT_READ_TIMEOUT),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            wire_format: WireFormat::default(),
            max_consecutive_send_failures: Some(DEFAULT_MAX_SEND_FAILURES),
        }
    }
}

/// Session lifecycle.
///
/// `Listening` is reported by [`Server`](crate::Server) until its single
/// peer is accepted; a [`Session`] starts in `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Listening,
    Connected,
    Serving,
    Closed,
}

impl SessionState {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Listening => "LISTENING",
            SessionState::Connected => "CONNECTED",
            SessionState::Serving => "SERVING",
            SessionState::Closed => "CLOSED",
        }
    }
}

/// Why the serve loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// Peer closed, possibly mid-frame
    PeerClosed,
    /// No complete request within the read timeout
    Timeout,
    /// Oversized length prefix
    Protocol(String),
    /// Stream error while receiving
    Transport(String),
    /// Payload was not a feature vector
    Decode(String),
    /// Too many consecutive responses could not be delivered
    SendFailures(u32),
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::PeerClosed => write!(f, "peer closed"),
            EndReason::Timeout => write!(f, "receive timeout"),
            EndReason::Protocol(reason) => write!(f, "protocol error: {}", reason),
            EndReason::Transport(reason) => write!(f, "transport error: {}", reason),
            EndReason::Decode(reason) => write!(f, "decode error: {}", reason),
            EndReason::SendFailures(count) => write!(f, "{} consecutive send failures", count),
        }
    }
}

/// Outcome of a completed session
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// Inferences performed (one latency record each)
    pub requests: u64,
    /// Responses that could not be sent
    pub send_failures: u64,
    /// Why serving stopped
    pub end_reason: EndReason,
    /// Transport counters at close
    pub stats: TransportStats,
}

/// One accepted connection and its serve loop
pub struct Session<S> {
    transport: FramedTransport<S>,
    peer: String,
    config: SessionConfig,
    state: SessionState,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Take ownership of an accepted connection and arm its timeouts
    pub fn new(stream: S, peer: impl Into<String>, config: SessionConfig) -> Self {
        let peer = peer.into();
        let mut transport = FramedTransport::new(stream);
        transport.set_read_timeout(Some(config.read_timeout));
        transport.set_write_timeout(config.write_timeout);
        transport.set_max_frame_bytes(config.max_frame_bytes);

        info!("Connection made with {}", peer);
        debug!("Session {}: {} -> {}", peer, SessionState::Listening.as_str(), SessionState::Connected.as_str());
        Self {
            transport,
            peer,
            config,
            state: SessionState::Connected,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Remote address of the peer
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Serve requests until the peer disconnects, times out or misbehaves.
    ///
    /// Receive-side failures end the loop and are reported in the summary.
    /// Inference and sink errors are returned as `Err`. The connection is
    /// shut down either way.
    pub async fn run<P>(
        &mut self,
        port: &P,
        recorder: &mut LatencyRecorder,
    ) -> Result<SessionSummary, SessionError>
    where
        P: InferencePort + ?Sized,
    {
        self.transition(SessionState::Serving);
        let outcome = self.serve(port, recorder).await;
        self.close().await;

        match &outcome {
            Ok(summary) => info!(
                "Session with {} ended ({}): {} requests, {} send failures",
                self.peer, summary.end_reason, summary.requests, summary.send_failures
            ),
            Err(e) => error!("Session with {} aborted: {}", self.peer, e),
        }
        outcome
    }

    async fn serve<P>(
        &mut self,
        port: &P,
        recorder: &mut LatencyRecorder,
    ) -> Result<SessionSummary, SessionError>
    where
        P: InferencePort + ?Sized,
    {
        let mut requests = 0u64;
        let mut send_failures = 0u64;
        let mut consecutive_failures = 0u32;

        let end_reason = loop {
            let payload = match self.transport.recv_frame().await {
                Ok(Received::Frame(payload)) => payload,
                Ok(Received::EndOfStream) => {
                    info!(">>> [Rx] Peer closed the connection");
                    break EndReason::PeerClosed;
                }
                Err(FrameError::Timeout(ms)) => {
                    warn!(">>> [Rx] No request within {}ms", ms);
                    break EndReason::Timeout;
                }
                Err(e @ FrameError::FrameTooLarge { .. }) => {
                    error!(">>> [Rx] Rejected frame: {}", e);
                    break EndReason::Protocol(e.to_string());
                }
                Err(e) => {
                    warn!(">>> [Rx] Error receiving data: {}", e);
                    break EndReason::Transport(e.to_string());
                }
            };

            let features: FeatureVector = match self.config.wire_format.decode(&payload) {
                Ok(features) => features,
                Err(e) => {
                    warn!(">>> [Rx] Undecodable request: {}", e);
                    break EndReason::Decode(e.to_string());
                }
            };
            debug!(">>> [Rx] Received data: {:?}", features.values());

            let result = port.infer(&features)?;
            requests += 1;
            metrics::counter!(metric::REQUESTS).increment(1);
            metrics::histogram!(metric::INFERENCE_SECONDS).record(result.latency_secs());
            debug!(
                ">>> [Rx] Prediction: {} in {:.4} seconds",
                result.prediction,
                result.latency_secs()
            );

            match self.send_prediction(&result.prediction).await {
                Ok(()) => consecutive_failures = 0,
                Err(e) => {
                    warn!(">>> [Tx] Error sending data: {}", e);
                    send_failures += 1;
                    consecutive_failures += 1;
                    metrics::counter!(metric::SEND_FAILURES).increment(1);
                }
            }

            recorder.record(&LatencyRecord::new(result.latency, result.prediction))?;

            if let Some(limit) = self.config.max_consecutive_send_failures {
                if consecutive_failures >= limit {
                    error!(">>> [Tx] Giving up after {} failed sends", consecutive_failures);
                    break EndReason::SendFailures(consecutive_failures);
                }
            }
        };

        Ok(SessionSummary {
            requests,
            send_failures,
            end_reason,
            stats: self.transport.stats(),
        })
    }

    async fn send_prediction(&mut self, prediction: &Prediction) -> Result<(), SessionError> {
        let payload = self.config.wire_format.encode(prediction)?;
        self.transport.send_frame(&payload).await?;
        debug!(">>> [Tx] Sent data: {} ({} bytes)", prediction, payload.len());
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(e) = self.transport.get_mut().shutdown().await {
            debug!("Shutdown of {} failed: {}", self.peer, e);
        }
        self.transition(SessionState::Closed);
        info!("Connection closed.");
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session {}: {} -> {}", self.peer, self.state.as_str(), next.as_str());
        self.state = next;
    }
}
