//! Connection handler for plainipc.
//!
//! An [`IpcHandler`] owns one connection and lets both ends:
//! - send raw bytes, strings and typed objects, received as [`IpcEvent`]s
//! - register services the peer can call
//! - call the peer's services with a per-call deadline
//!
//! Handlers come from [`connect`] on the client side and [`IpcListener::accept`] on
//! the server side; both are symmetric once connected.

pub mod config;
pub mod connector;
pub mod endpoint;
pub mod error;
pub mod event;
pub mod handler;
pub mod listener;
mod receiver;
pub mod sender;

pub use config::IpcConfig;
pub use connector::{connect, connect_tcp, memory_pair};
#[cfg(unix)]
pub use connector::connect_unix;
#[cfg(windows)]
pub use connector::connect_named_pipe;
pub use endpoint::Endpoint;
pub use error::{PeerError, Result};
pub use event::{ErrorEventCode, ErrorOccurred, IpcEvent, IpcEvents, IpcMessage, MessageValue, ObjectValue};
pub use handler::IpcHandler;
pub use listener::IpcListener;
pub use sender::IpcSender;
