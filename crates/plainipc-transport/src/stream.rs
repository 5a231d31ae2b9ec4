use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::{mpsc, Mutex};
use tokio::task::AbortHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, warn};

use crate::codec::{LengthPrefixCodec, Packet};
use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::traits::{DataSender, Transport, TransportEvent};

/// Length-prefixed transport over any async byte stream.
///
/// Must be spawned from within a tokio runtime: the read side runs as its own task
/// and publishes one [`TransportEvent::Data`] per received payload.
pub struct StreamTransport;

impl StreamTransport {
    /// Split `stream`, start the read loop, and return the connected transport.
    pub fn spawn<S>(stream: S, config: &TransportConfig, peer: impl Into<String>) -> Transport
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let peer = peer.into();
        let (read_half, write_half) = tokio::io::split(stream);
        let codec = LengthPrefixCodec::new(config.max_payload_size);
        let connected = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::channel(config.inbound_capacity.max(1));

        let reader = FramedRead::new(read_half, codec.clone());
        let read_task = tokio::spawn(read_loop(reader, tx, Arc::clone(&connected), peer.clone()));

        let sender = StreamSender {
            writer: Mutex::new(FramedWrite::new(write_half, codec)),
            connected,
            read_task: read_task.abort_handle(),
            peer,
        };

        Transport::new(Arc::new(sender), rx)
    }
}

/// Send half of a [`StreamTransport`].
pub struct StreamSender<S> {
    writer: Mutex<FramedWrite<WriteHalf<S>, LengthPrefixCodec>>,
    connected: Arc<AtomicBool>,
    read_task: AbortHandle,
    peer: String,
}

#[async_trait]
impl<S> DataSender for StreamSender<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn send(&self, payload: Bytes) -> Result<()> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(TransportError::NotConnected);
        }

        let mut writer = self.writer.lock().await;
        let size = payload.len();
        match writer.send(Packet::Payload(payload)).await {
            Ok(()) => {
                debug!(peer = %self.peer, size, "payload sent");
                Ok(())
            }
            // Oversized payloads never reach the stream, so the connection stays usable.
            Err(err @ TransportError::PayloadTooLarge { .. }) => Err(err),
            Err(err) => {
                self.connected.store(false, Ordering::Release);
                warn!(peer = %self.peer, error = %err, "send failed; marking transport disconnected");
                Err(err)
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn close(&self) -> Result<()> {
        let was_connected = self.connected.swap(false, Ordering::AcqRel);
        self.read_task.abort();
        if !was_connected {
            return Ok(());
        }

        let mut writer = self.writer.lock().await;
        if let Err(err) = writer.send(Packet::Goodbye).await {
            debug!(peer = %self.peer, error = %err, "goodbye not delivered");
        }
        writer.get_mut().shutdown().await?;
        debug!(peer = %self.peer, "transport closed");
        Ok(())
    }
}

impl<S> Drop for StreamSender<S> {
    fn drop(&mut self) {
        self.read_task.abort();
    }
}

async fn read_loop<S>(
    mut reader: FramedRead<ReadHalf<S>, LengthPrefixCodec>,
    events: mpsc::Sender<TransportEvent>,
    connected: Arc<AtomicBool>,
    peer: String,
) where
    S: AsyncRead,
{
    while let Some(item) = reader.next().await {
        match item {
            Ok(Packet::Payload(payload)) => {
                if events.send(TransportEvent::Data(payload)).await.is_err() {
                    debug!(peer = %peer, "inbound consumer dropped; stopping read loop");
                    connected.store(false, Ordering::Release);
                    return;
                }
            }
            Ok(Packet::Goodbye) => {
                debug!(peer = %peer, "peer announced shutdown");
                break;
            }
            Err(err) => {
                // The stream position is unknown after a framing error; stop reading.
                warn!(peer = %peer, error = %err, "read failed");
                connected.store(false, Ordering::Release);
                let _ = events.send(TransportEvent::Error(err)).await;
                return;
            }
        }
    }

    connected.store(false, Ordering::Release);
    let _ = events.send(TransportEvent::Closed).await;
}
