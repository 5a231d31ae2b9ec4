use std::fmt;

use bytes::Bytes;
use plainipc_frame::FrameKind;
use plainipc_rpc::{AnyObject, TypeIdentifier};
use tokio::sync::mpsc;

/// Category of an error event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorEventCode {
    /// The transport closed or failed. No further events follow.
    ConnectionLost = -1,
    /// An inbound frame could not be decoded or materialized. The connection stays up.
    DataProcessingError = 100,
    UnexpectedError = 1000,
}

impl ErrorEventCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// An error raised by the connection rather than returned to a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorOccurred {
    pub code: ErrorEventCode,
    pub message: String,
}

impl ErrorOccurred {
    pub fn new(code: ErrorEventCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorOccurred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({}): {}", self.code, self.code.code(), self.message)
    }
}

/// A typed object received from the peer.
pub struct ObjectValue {
    type_id: TypeIdentifier,
    value: AnyObject,
}

impl ObjectValue {
    pub(crate) fn new(type_id: TypeIdentifier, value: AnyObject) -> Self {
        Self { type_id, value }
    }

    /// Identifier the sender tagged the object with.
    pub fn type_identifier(&self) -> &TypeIdentifier {
        &self.type_id
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }

    /// Take the value out as `T`, or get the object back unchanged.
    pub fn downcast<T: 'static>(self) -> Result<T, Self> {
        let type_id = self.type_id;
        match self.value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(value) => Err(Self { type_id, value }),
        }
    }
}

impl fmt::Debug for ObjectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectValue")
            .field("type_id", &self.type_id.to_string())
            .finish_non_exhaustive()
    }
}

/// Decoded value of a received message.
#[derive(Debug)]
pub enum MessageValue {
    Raw(Bytes),
    String(String),
    Object(ObjectValue),
}

/// A non-RPC message received from the peer.
#[derive(Debug)]
pub struct IpcMessage {
    pub kind: FrameKind,
    pub value: MessageValue,
}

impl IpcMessage {
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match &self.value {
            MessageValue::Raw(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            MessageValue::String(text) => Some(text),
            _ => None,
        }
    }

    /// The object, if this message carries one of type `T`.
    pub fn object<T: 'static>(&self) -> Option<&T> {
        match &self.value {
            MessageValue::Object(object) => object.downcast_ref(),
            _ => None,
        }
    }

    /// Identifier of the object type, for object messages.
    pub fn type_identifier(&self) -> Option<&TypeIdentifier> {
        match &self.value {
            MessageValue::Object(object) => Some(object.type_identifier()),
            _ => None,
        }
    }
}

/// Notification from a connection handler.
#[derive(Debug)]
pub enum IpcEvent {
    Message(IpcMessage),
    Error(ErrorOccurred),
}

/// Event stream of one connection, in arrival order.
///
/// Events are buffered without bound; dropping this handle discards them.
#[derive(Debug)]
pub struct IpcEvents {
    rx: mpsc::UnboundedReceiver<IpcEvent>,
}

impl IpcEvents {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<IpcEvent>) -> Self {
        Self { rx }
    }

    /// Next event, or `None` once the connection is gone and all events are drained.
    pub async fn recv(&mut self) -> Option<IpcEvent> {
        self.rx.recv().await
    }

    /// Next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<IpcEvent> {
        self.rx.try_recv().ok()
    }

    /// Next message, skipping error events other than a lost connection.
    pub async fn next_message(&mut self) -> Option<IpcMessage> {
        while let Some(event) = self.rx.recv().await {
            match event {
                IpcEvent::Message(message) => return Some(message),
                IpcEvent::Error(error) if error.code == ErrorEventCode::ConnectionLost => {
                    return None
                }
                IpcEvent::Error(_) => {}
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorEventCode::ConnectionLost.code(), -1);
        assert_eq!(ErrorEventCode::DataProcessingError.code(), 100);
        assert_eq!(ErrorEventCode::UnexpectedError.code(), 1000);
    }

    #[test]
    fn test_error_display() {
        let error = ErrorOccurred::new(ErrorEventCode::DataProcessingError, "bad frame");
        assert_eq!(error.to_string(), "DataProcessingError (100): bad frame");
    }

    #[test]
    fn test_object_downcast() {
        let object = ObjectValue::new(
            TypeIdentifier::new("std", "i32"),
            Box::new(7i32) as AnyObject,
        );
        assert!(object.is::<i32>());
        assert_eq!(object.downcast_ref::<i32>(), Some(&7));

        let object = object.downcast::<String>().unwrap_err();
        assert_eq!(object.downcast::<i32>().unwrap(), 7);
    }

    #[tokio::test]
    async fn test_next_message_stops_on_connection_lost() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut events = IpcEvents::new(rx);
        tx.send(IpcEvent::Error(ErrorOccurred::new(
            ErrorEventCode::DataProcessingError,
            "skipped",
        )))
        .unwrap();
        tx.send(IpcEvent::Message(IpcMessage {
            kind: FrameKind::String,
            value: MessageValue::String("hello".into()),
        }))
        .unwrap();
        tx.send(IpcEvent::Error(ErrorOccurred::new(
            ErrorEventCode::ConnectionLost,
            "closed",
        )))
        .unwrap();

        let message = events.next_message().await.unwrap();
        assert_eq!(message.as_str(), Some("hello"));
        assert!(events.next_message().await.is_none());
    }
}
