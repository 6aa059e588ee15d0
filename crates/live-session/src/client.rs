//! Remote Inference Client
//!
//! The peer side of a [`Session`](crate::Session): one request frame out,
//! one prediction frame back.

use crate::session::SessionConfig;
use crate::SessionError;
use frame_protocol::{FramedTransport, Received};
use payload_codec::{FeatureVector, Prediction, WireFormat};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Client connection to a live inference server
pub struct RemoteClient {
    transport: FramedTransport<TcpStream>,
    wire_format: WireFormat,
}

impl RemoteClient {
    /// Connect and apply the same timeouts and limits a session uses
    pub async fn connect(addr: &str, config: &SessionConfig) -> Result<Self, SessionError> {
        let stream = TcpStream::connect(addr).await.map_err(|e| SessionError::Connect {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
        info!("Connected to inference server at {}", addr);

        let mut transport = FramedTransport::new(stream);
        transport.set_read_timeout(Some(config.read_timeout));
        transport.set_write_timeout(config.write_timeout);
        transport.set_max_frame_bytes(config.max_frame_bytes);

        Ok(Self {
            transport,
            wire_format: config.wire_format,
        })
    }

    /// Send one feature vector and wait for its prediction
    pub async fn predict(&mut self, features: &FeatureVector) -> Result<Prediction, SessionError> {
        let payload = self.wire_format.encode(features)?;
        self.transport.send_frame(&payload).await?;

        match self.transport.recv_frame().await? {
            Received::Frame(bytes) => {
                let prediction = self.wire_format.decode(&bytes)?;
                debug!("Server predicted {}", prediction);
                Ok(prediction)
            }
            Received::EndOfStream => Err(SessionError::PeerClosed),
        }
    }

    /// Close the connection, ending the server's session
    pub async fn close(mut self) -> Result<(), SessionError> {
        self.transport
            .get_mut()
            .shutdown()
            .await
            .map_err(|e| SessionError::Frame(e.into()))
    }
}
