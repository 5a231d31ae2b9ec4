//! Demo chat service.
//!
//! The callee registers [`ChatService`]; callers talk to it through the
//! hand-written [`ChatClient`] proxy, the way any application interface is exposed.

use std::convert::Infallible;
use std::sync::Arc;

use parking_lot::Mutex;
use plainipc_peer::{IpcHandler, Result};
use plainipc_rpc::{remote_type, CallRequest, RemoteType, Service, ServiceBuilder, TypeIdentifier};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Most messages a [`ChatService`] keeps.
pub const HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub from: String,
    pub text: String,
}

remote_type!(ChatMessage, "plainipc", "plainipc.ChatMessage");

impl ChatMessage {
    pub fn new(from: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            text: text.into(),
        }
    }
}

pub fn chat_service_id() -> TypeIdentifier {
    TypeIdentifier::new("plainipc", "plainipc.IChatService")
}

/// Keeps the most recent messages it was sent.
#[derive(Debug, Default)]
pub struct ChatService {
    history: Mutex<Vec<ChatMessage>>,
}

impl ChatService {
    pub fn new() -> Self {
        Self::default()
    }

    fn send_message(&self, message: ChatMessage) -> std::result::Result<String, String> {
        if message.text.trim().is_empty() {
            return Err("Message text must not be empty.".to_string());
        }
        info!(from = %message.from, text = %message.text, "chat message");
        let reply = format!("{} said: {}", message.from, message.text);
        let mut history = self.history.lock();
        history.push(message);
        if history.len() > HISTORY_LIMIT {
            let excess = history.len() - HISTORY_LIMIT;
            history.drain(..excess);
        }
        Ok(reply)
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.history.lock().clone()
    }

    /// Methods: `SendMessage(ChatMessage) -> String`, `History() -> ChatMessage[]`,
    /// `Clear()`, and `Echo<T>(T) -> T` for `String` and `ChatMessage`.
    pub fn into_service(self: Arc<Self>) -> Service {
        ServiceBuilder::from_arc(chat_service_id(), self)
            .method("SendMessage", |chat, (message,): (ChatMessage,)| {
                chat.send_message(message)
            })
            .method("History", |chat, (): ()| Ok::<_, Infallible>(chat.history()))
            .method("Clear", |chat, (): ()| {
                chat.history.lock().clear();
                Ok::<_, Infallible>(())
            })
            .generic_method(
                "Echo",
                [String::type_identifier()],
                |_, (value,): (String,)| Ok::<_, Infallible>(value),
            )
            .generic_method(
                "Echo",
                [ChatMessage::type_identifier()],
                |_, (value,): (ChatMessage,)| Ok::<_, Infallible>(value),
            )
            .build()
    }
}

/// Proxy for a remote [`ChatService`].
#[derive(Debug, Clone, Copy)]
pub struct ChatClient<'a> {
    handler: &'a IpcHandler,
}

impl<'a> ChatClient<'a> {
    pub fn new(handler: &'a IpcHandler) -> Self {
        Self { handler }
    }

    pub async fn send_message(&self, message: &ChatMessage) -> Result<String> {
        let request = CallRequest::builder(chat_service_id(), "SendMessage")
            .arg(message)
            .build()?;
        self.handler.execute_remote(request).await
    }

    pub async fn history(&self) -> Result<Vec<ChatMessage>> {
        let request = CallRequest::builder(chat_service_id(), "History").build()?;
        self.handler.execute_remote(request).await
    }

    pub async fn clear(&self) -> Result<()> {
        let request = CallRequest::builder(chat_service_id(), "Clear").build()?;
        self.handler.execute_remote_void(request).await
    }

    pub async fn echo<T: RemoteType>(&self, value: &T) -> Result<T> {
        let request = CallRequest::builder(chat_service_id(), "Echo")
            .generic::<T>()
            .arg(value)
            .build()?;
        self.handler.execute_remote(request).await
    }
}
