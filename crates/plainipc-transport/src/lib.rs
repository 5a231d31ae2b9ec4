//! Byte transports for plainipc.
//!
//! Every transport carries discrete payloads: one [`DataSender::send`] on one end
//! produces exactly one [`TransportEvent::Data`] on the other. Over byte streams the
//! payloads are delimited with a 4-byte little-endian length prefix
//! ([`LengthPrefixCodec`]).
//!
//! Provided transports:
//! - TCP ([`tcp`])
//! - Unix domain sockets ([`uds`], Linux/macOS)
//! - Named pipes ([`named_pipe`], Windows)
//! - In-process pairs ([`memory`])
//!
//! This is the lowest layer of plainipc. Everything else builds on top of
//! the [`Transport`] type provided here.

pub mod codec;
pub mod config;
pub mod error;
pub mod memory;
pub mod stream;
pub mod tcp;
pub mod traits;

#[cfg(unix)]
pub mod uds;

#[cfg(windows)]
pub mod named_pipe;

pub use codec::{LengthPrefixCodec, Packet, DEFAULT_MAX_PAYLOAD};
pub use config::TransportConfig;
pub use error::{Result, TransportError};
pub use stream::{StreamSender, StreamTransport};
pub use tcp::TcpIpcListener;
pub use traits::{DataSender, Transport, TransportEvent};

#[cfg(unix)]
pub use uds::UnixIpcListener;

#[cfg(windows)]
pub use named_pipe::NamedPipeListener;
