//! Single-Accept Listener

use crate::session::{Session, SessionConfig, SessionState};
use crate::SessionError;
use std::net::SocketAddr;
use tokio::net::{lookup_host, TcpListener, TcpSocket, TcpStream};
use tracing::{debug, info};

/// Listening socket that hands out exactly one [`Session`]
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: SessionConfig,
}

impl Server {
    /// Bind `host:port` with address reuse and a backlog of one
    pub async fn bind(host: &str, port: u16, config: SessionConfig) -> Result<Self, SessionError> {
        let display = format!("{}:{}", host, port);
        let bind_error = |reason: String| SessionError::Bind {
            addr: display.clone(),
            reason,
        };

        let addr = lookup_host((host, port))
            .await
            .map_err(|e| bind_error(e.to_string()))?
            .next()
            .ok_or_else(|| bind_error("no address resolved".to_string()))?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(|e| bind_error(e.to_string()))?;

        socket.set_reuseaddr(true).map_err(|e| bind_error(e.to_string()))?;
        socket.bind(addr).map_err(|e| bind_error(e.to_string()))?;
        let listener = socket.listen(1).map_err(|e| bind_error(e.to_string()))?;
        let local_addr = listener.local_addr().map_err(|e| bind_error(e.to_string()))?;

        info!("Server listening in {}", local_addr);
        Ok(Self {
            listener,
            local_addr,
            config,
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Lifecycle stage of the listener. Accepting consumes the server, so a
    /// live `Server` is always listening.
    pub fn state(&self) -> SessionState {
        SessionState::Listening
    }

    /// Wait for the single allowed peer.
    ///
    /// Consumes the server: the listening socket is closed once the peer is
    /// accepted, so no second connection can ever be served.
    pub async fn accept_one(self) -> Result<Session<TcpStream>, SessionError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(|e| SessionError::Accept(e.to_string()))?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle on {}: {}", peer, e);
        }

        Ok(Session::new(stream, peer.to_string(), self.config))
    }
}
