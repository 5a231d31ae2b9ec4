use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use plainipc_frame::{encode_object, encode_raw, encode_remote_message, encode_string};
use plainipc_rpc::{BoxError, EnvelopeSink, ObjectConverter, RemoteType};
use plainipc_transport::DataSender;
use tokio::sync::Mutex;
use tracing::trace;

use crate::error::Result;

/// Outbound side of a connection.
///
/// Frames are encoded by the caller's task; only the transport write is
/// serialized, so a frame is always written whole before the next one starts.
pub struct IpcSender {
    data: Arc<dyn DataSender>,
    converter: Arc<dyn ObjectConverter>,
    slot: Mutex<()>,
}

impl IpcSender {
    pub fn new(data: Arc<dyn DataSender>, converter: Arc<dyn ObjectConverter>) -> Self {
        Self {
            data,
            converter,
            slot: Mutex::new(()),
        }
    }

    /// Send an opaque byte message.
    pub async fn send_raw(&self, data: &[u8]) -> Result<()> {
        self.write(encode_raw(data)).await
    }

    /// Send a text message.
    pub async fn send_string(&self, text: &str) -> Result<()> {
        self.write(encode_string(text)).await
    }

    /// Send a typed object tagged with its type identifier.
    pub async fn send_object<T: RemoteType>(&self, value: &T) -> Result<()> {
        let data = self.converter.serialize(value)?;
        let frame = encode_object(&T::type_identifier().to_string(), &data)?;
        self.write(frame).await
    }

    /// Send an encoded RPC envelope.
    pub async fn send_remote(&self, envelope: &[u8]) -> Result<()> {
        self.write(encode_remote_message(envelope)).await
    }

    pub fn is_connected(&self) -> bool {
        self.data.is_connected()
    }

    /// Send the goodbye marker and release the connection.
    pub async fn close(&self) -> Result<()> {
        let _slot = self.slot.lock().await;
        self.data.close().await?;
        Ok(())
    }

    async fn write(&self, frame: Bytes) -> Result<()> {
        let size = frame.len();
        let _slot = self.slot.lock().await;
        self.data.send(frame).await?;
        trace!(size, "frame sent");
        Ok(())
    }
}

#[async_trait]
impl EnvelopeSink for IpcSender {
    async fn send_envelope(&self, envelope: Bytes) -> std::result::Result<(), BoxError> {
        self.send_remote(&envelope).await.map_err(|err| Box::new(err) as BoxError)
    }
}

impl std::fmt::Debug for IpcSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcSender")
            .field("connected", &self.is_connected())
            .field("converter", &self.converter.name())
            .finish()
    }
}
