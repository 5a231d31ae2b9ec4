use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{Result, TransportError};

/// Outbound half of a connection.
///
/// Each call to [`DataSender::send`] transmits exactly one logical payload; the
/// transport is responsible for delimiting it on the wire.
#[async_trait]
pub trait DataSender: Send + Sync + 'static {
    /// Transmit one complete payload.
    async fn send(&self, payload: Bytes) -> Result<()>;

    /// Whether the connection is believed to be usable.
    fn is_connected(&self) -> bool;

    /// Announce shutdown to the peer and release the connection.
    async fn close(&self) -> Result<()>;
}

/// Inbound notification from a transport.
#[derive(Debug)]
pub enum TransportEvent {
    /// One fully assembled payload.
    Data(Bytes),
    /// The transport failed; no further data will follow.
    Error(TransportError),
    /// The peer closed the connection.
    Closed,
}

/// A connected transport: the send half plus the inbound event stream.
pub struct Transport {
    pub sender: Arc<dyn DataSender>,
    pub events: mpsc::Receiver<TransportEvent>,
}

impl Transport {
    /// Assemble a transport from custom halves.
    pub fn new(sender: Arc<dyn DataSender>, events: mpsc::Receiver<TransportEvent>) -> Self {
        Self { sender, events }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("connected", &self.sender.is_connected())
            .finish()
    }
}
