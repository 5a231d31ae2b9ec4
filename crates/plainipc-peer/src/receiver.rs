use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use plainipc_frame::{decode_frame, FrameKind, FramePayload};
use plainipc_rpc::{
    Correlator, Dispatcher, ObjectConverter, RemoteCall, RemoteMessage, TypeRegistry,
};
use plainipc_transport::TransportEvent;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::event::{
    ErrorEventCode, ErrorOccurred, IpcEvent, IpcMessage, MessageValue, ObjectValue,
};
use crate::sender::IpcSender;

const PROCESSING_FAILED: &str = "Processing of received data failed.";

/// Inbound side of a connection: classifies frames and routes them.
pub(crate) struct Receiver {
    pub(crate) sender: Arc<IpcSender>,
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) correlator: Arc<Correlator>,
    pub(crate) types: Arc<RwLock<TypeRegistry>>,
    pub(crate) converter: Arc<dyn ObjectConverter>,
    pub(crate) events: mpsc::UnboundedSender<IpcEvent>,
}

impl Receiver {
    /// Consume transport events until the connection ends.
    pub(crate) async fn run(self, mut inbound: mpsc::Receiver<TransportEvent>) {
        loop {
            match inbound.recv().await {
                Some(TransportEvent::Data(payload)) => self.on_data(payload),
                Some(TransportEvent::Error(err)) => {
                    warn!(error = %err, "connection failed");
                    self.raise(ErrorEventCode::ConnectionLost, format!("Connection lost: {err}"));
                    break;
                }
                Some(TransportEvent::Closed) | None => {
                    info!("connection closed by peer");
                    self.raise(ErrorEventCode::ConnectionLost, "Connection closed by peer.");
                    break;
                }
            }
        }
    }

    fn on_data(&self, payload: Bytes) {
        let frame = match decode_frame(payload) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "dropping undecodable frame");
                self.raise_processing_error(err);
                return;
            }
        };
        if frame.kind == FrameKind::RemoteMessage {
            self.on_remote(frame.payload);
            return;
        }

        let kind = frame.kind;
        let value = match frame.into_payload() {
            Ok(FramePayload::Raw(data)) => MessageValue::Raw(data),
            Ok(FramePayload::String(text)) => MessageValue::String(text),
            Ok(FramePayload::Object { type_name, data }) => {
                match self
                    .types
                    .read()
                    .materialize(&type_name, self.converter.as_ref(), &data)
                {
                    Ok((type_id, value)) => MessageValue::Object(ObjectValue::new(type_id, value)),
                    Err(err) => {
                        warn!(type_name = %type_name, error = %err, "dropping object");
                        self.raise_processing_error(err);
                        return;
                    }
                }
            }
            Ok(FramePayload::RemoteMessage(_)) => return,
            Err(err) => {
                warn!(kind = %kind, error = %err, "dropping malformed frame");
                self.raise_processing_error(err);
                return;
            }
        };
        debug!(kind = %kind, "message received");
        let _ = self.events.send(IpcEvent::Message(IpcMessage { kind, value }));
    }

    fn on_remote(&self, envelope: Bytes) {
        match RemoteMessage::decode(envelope) {
            Ok(RemoteMessage::Call(call)) => self.spawn_dispatch(call),
            Ok(answer) => {
                let id = answer.id();
                if !self.correlator.resolve(answer) {
                    debug!(%id, "discarding answer for unknown call");
                }
            }
            Err(err) => {
                warn!(error = %err, "dropping malformed envelope");
                self.raise_processing_error(err);
            }
        }
    }

    fn spawn_dispatch(&self, call: RemoteCall) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let sender = Arc::clone(&self.sender);
        let events = self.events.clone();
        tokio::spawn(async move {
            let id = call.id;
            let reply = dispatcher.dispatch(call).await;
            if let Err(err) = send_reply(&sender, reply).await {
                warn!(%id, error = %err, "failed to send reply");
                let _ = events.send(IpcEvent::Error(ErrorOccurred::new(
                    ErrorEventCode::UnexpectedError,
                    format!("Failed to send reply for call {id}. {err}"),
                )));
                let fallback = RemoteMessage::Error {
                    id,
                    message: format!("Failed to send result: {err}"),
                };
                if let Err(err) = send_reply(&sender, fallback).await {
                    warn!(%id, error = %err, "failed to send error reply");
                }
            }
        });
    }

    fn raise_processing_error(&self, err: impl std::fmt::Display) {
        self.raise(
            ErrorEventCode::DataProcessingError,
            format!("{PROCESSING_FAILED} {err}"),
        );
    }

    fn raise(&self, code: ErrorEventCode, message: impl Into<String>) {
        let _ = self
            .events
            .send(IpcEvent::Error(ErrorOccurred::new(code, message)));
    }
}

async fn send_reply(sender: &IpcSender, reply: RemoteMessage) -> crate::Result<()> {
    let envelope = reply.encode().map_err(plainipc_rpc::RpcError::from)?;
    sender.send_remote(&envelope).await
}
