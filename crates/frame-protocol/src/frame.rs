//! Frame Layout

use crate::error::FrameError;

/// Size of the big-endian length prefix
pub const HEADER_LEN: usize = 4;

/// Default upper bound for a single payload (16 MiB)
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Build a complete frame: length prefix followed by the payload.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    let len = u32::try_from(payload.len()).map_err(|_| FrameError::FrameTooLarge {
        declared: payload.len() as u64,
        limit: u64::from(u32::MAX),
    })?;

    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Decode the payload length from a length prefix
pub fn decode_header(header: [u8; HEADER_LEN]) -> u32 {
    u32::from_be_bytes(header)
}

/// Validate a declared payload length against the limit.
///
/// The peer controls the prefix, so this must run before any payload
/// buffer is allocated.
pub fn check_frame_len(declared: u32, limit: usize) -> Result<usize, FrameError> {
    let declared_len = declared as usize;
    if declared_len > limit {
        return Err(FrameError::FrameTooLarge {
            declared: u64::from(declared),
            limit: limit as u64,
        });
    }
    Ok(declared_len)
}
