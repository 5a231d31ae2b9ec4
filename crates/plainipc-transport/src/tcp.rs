use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::stream::StreamTransport;
use crate::traits::Transport;

/// Connect to a listening TCP endpoint.
pub async fn connect(addr: &str, config: &TransportConfig) -> Result<Transport> {
    let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| TransportError::ConnectTimeout {
            addr: addr.to_string(),
            timeout: config.connect_timeout,
        })?
        .map_err(|source| TransportError::Connect {
            addr: addr.to_string(),
            source,
        })?;
    stream.set_nodelay(true)?;

    let peer = stream
        .peer_addr()
        .map(|peer| peer.to_string())
        .unwrap_or_else(|_| addr.to_string());
    debug!(%peer, "connected to tcp endpoint");
    Ok(StreamTransport::spawn(stream, config, peer))
}

/// TCP listener producing one [`Transport`] per accepted connection.
pub struct TcpIpcListener {
    listener: TcpListener,
    config: TransportConfig,
}

impl TcpIpcListener {
    /// Bind and listen on `addr` (e.g. `127.0.0.1:0`).
    pub async fn bind(addr: &str, config: TransportConfig) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        info!(addr = %listener.local_addr()?, "listening on tcp");
        Ok(Self { listener, config })
    }

    /// Accept the next connection.
    pub async fn accept(&self) -> Result<Transport> {
        let (stream, peer) = self.listener.accept().await.map_err(TransportError::Accept)?;
        stream.set_nodelay(true)?;
        debug!(%peer, "accepted tcp connection");
        Ok(StreamTransport::spawn(stream, &self.config, peer.to_string()))
    }

    /// The bound local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "tcp"
    }
}
