//! Framed Transport
//!
//! Moves whole frames over one async byte stream with optional timeouts.

use crate::error::FrameError;
use crate::frame::{check_frame_len, decode_header, encode_frame, DEFAULT_MAX_FRAME_BYTES, HEADER_LEN};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::debug;

/// Outcome of a receive attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// A complete payload
    Frame(Vec<u8>),
    /// The peer closed before a complete frame arrived
    EndOfStream,
}

/// Frame and byte counters for one connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub frames_sent: u64,
    pub frames_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

/// Length-prefixed framing over a single connection
pub struct FramedTransport<S> {
    /// Underlying byte stream
    stream: S,
    /// Limit for receiving one whole frame
    read_timeout: Option<Duration>,
    /// Limit for sending one whole frame
    write_timeout: Option<Duration>,
    /// Largest payload accepted in either direction
    max_frame_bytes: usize,
    /// Traffic counters
    stats: TransportStats,
}

impl<S> FramedTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a connected stream with no timeouts and the default frame limit
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            read_timeout: None,
            write_timeout: None,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            stats: TransportStats::default(),
        }
    }

    /// Arm the receive timeout
    pub fn set_read_timeout(&mut self, limit: Option<Duration>) {
        self.read_timeout = limit;
    }

    /// Arm the send timeout
    pub fn set_write_timeout(&mut self, limit: Option<Duration>) {
        self.write_timeout = limit;
    }

    /// Set the largest accepted payload
    pub fn set_max_frame_bytes(&mut self, limit: usize) {
        self.max_frame_bytes = limit;
    }

    /// Receive one frame.
    ///
    /// Returns [`Received::EndOfStream`] when the peer closes before the
    /// header or the payload is complete. A declared length over the limit
    /// is rejected without reading the payload.
    pub async fn recv_frame(&mut self) -> Result<Received, FrameError> {
        match self.read_timeout {
            Some(limit) => timeout(limit, self.read_frame())
                .await
                .map_err(|_| FrameError::Timeout(limit.as_millis() as u64))?,
            None => self.read_frame().await,
        }
    }

    /// Send one frame as a single logical write
    pub async fn send_frame(&mut self, payload: &[u8]) -> Result<(), FrameError> {
        if payload.len() > self.max_frame_bytes {
            return Err(FrameError::FrameTooLarge {
                declared: payload.len() as u64,
                limit: self.max_frame_bytes as u64,
            });
        }

        let frame = encode_frame(payload)?;
        match self.write_timeout {
            Some(limit) => timeout(limit, self.write_frame(&frame))
                .await
                .map_err(|_| FrameError::Timeout(limit.as_millis() as u64))??,
            None => self.write_frame(&frame).await?,
        }

        self.stats.frames_sent += 1;
        self.stats.bytes_sent += frame.len() as u64;
        debug!("Sent frame: {} payload bytes", payload.len());
        Ok(())
    }

    /// Traffic counters so far
    pub fn stats(&self) -> TransportStats {
        self.stats
    }

    /// Currently armed receive timeout
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Borrow the underlying stream
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Mutably borrow the underlying stream
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Release the underlying stream
    pub fn into_inner(self) -> S {
        self.stream
    }

    async fn read_frame(&mut self) -> Result<Received, FrameError> {
        let mut header = [0u8; HEADER_LEN];
        if !read_exact_or_eof(&mut self.stream, &mut header).await? {
            debug!("Peer closed before frame header");
            return Ok(Received::EndOfStream);
        }

        let len = check_frame_len(decode_header(header), self.max_frame_bytes)?;
        let mut payload = vec![0u8; len];
        if !read_exact_or_eof(&mut self.stream, &mut payload).await? {
            debug!("Peer closed mid-frame (expected {} bytes)", len);
            return Ok(Received::EndOfStream);
        }

        self.stats.frames_received += 1;
        self.stats.bytes_received += (HEADER_LEN + len) as u64;
        debug!("Received frame: {} payload bytes", len);
        Ok(Received::Frame(payload))
    }

    async fn write_frame(&mut self, frame: &[u8]) -> Result<(), FrameError> {
        self.stream.write_all(frame).await?;
        self.stream.flush().await?;
        Ok(())
    }
}

/// Fill `buf` completely, retrying short reads. `false` means the peer
/// closed first.
async fn read_exact_or_eof<R>(reader: &mut R, buf: &mut [u8]) -> Result<bool, FrameError>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_send_then_receive() {
        let (a, b) = duplex(1024);
        let mut tx = FramedTransport::new(a);
        let mut rx = FramedTransport::new(b);

        tx.send_frame(b"hello").await.unwrap();
        tx.send_frame(b"").await.unwrap();

        assert_eq!(rx.recv_frame().await.unwrap(), Received::Frame(b"hello".to_vec()));
        assert_eq!(rx.recv_frame().await.unwrap(), Received::Frame(Vec::new()));
        assert_eq!(tx.stats().frames_sent, 2);
        assert_eq!(rx.stats().frames_received, 2);
        assert_eq!(rx.stats().bytes_received, 13);
    }

    #[tokio::test]
    async fn test_fragmented_header_and_payload() {
        let (mut a, b) = duplex(1024);
        let mut rx = FramedTransport::new(b);

        let writer = tokio::spawn(async move {
            a.write_all(&[0, 0]).await.unwrap();
            tokio::task::yield_now().await;
            a.write_all(&[0, 4, b'a']).await.unwrap();
            tokio::task::yield_now().await;
            a.write_all(b"bcd").await.unwrap();
            a
        });

        assert_eq!(rx.recv_frame().await.unwrap(), Received::Frame(b"abcd".to_vec()));
        writer.await.unwrap();
    }

    #[tokio::test]
    async fn test_close_before_header() {
        let (a, b) = duplex(64);
        drop(a);
        let mut rx = FramedTransport::new(b);
        assert_eq!(rx.recv_frame().await.unwrap(), Received::EndOfStream);
    }

    #[tokio::test]
    async fn test_truncated_payload_is_end_of_stream() {
        let (mut a, b) = duplex(64);
        a.write_all(&[0, 0, 0, 10, 1, 2, 3]).await.unwrap();
        drop(a);

        let mut rx = FramedTransport::new(b);
        assert_eq!(rx.recv_frame().await.unwrap(), Received::EndOfStream);
        assert_eq!(rx.stats().frames_received, 0);
    }

    #[tokio::test]
    async fn test_oversized_prefix_rejected() {
        let (mut a, b) = duplex(64);
        a.write_all(&[0xFF, 0xFF, 0xFF, 0xFF]).await.unwrap();

        let mut rx = FramedTransport::new(b);
        rx.set_max_frame_bytes(1024);
        let err = rx.recv_frame().await.unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { limit: 1024, .. }));
    }

    #[tokio::test]
    async fn test_oversized_send_rejected() {
        let (a, _b) = duplex(64);
        let mut tx = FramedTransport::new(a);
        tx.set_max_frame_bytes(4);
        assert!(tx.send_frame(b"too long").await.is_err());
        assert_eq!(tx.stats().frames_sent, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout() {
        let (_a, b) = duplex(64);
        let mut rx = FramedTransport::new(b);
        rx.set_read_timeout(Some(Duration::from_secs(10)));

        let err = rx.recv_frame().await.unwrap_err();
        assert!(err.is_timeout());
    }
}
