//! Length-Prefixed Frame Protocol
//!
//! Reads and writes `[u32 big-endian length][payload]` messages over a single
//! async byte stream. Payload contents are opaque to this crate.

mod error;
mod frame;
mod transport;

pub use error::FrameError;
pub use frame::{check_frame_len, decode_header, encode_frame, DEFAULT_MAX_FRAME_BYTES, HEADER_LEN};
pub use transport::{FramedTransport, Received, TransportStats};
