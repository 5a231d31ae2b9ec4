//! Messages, typed objects and remote calls between processes.
//!
//! plainipc carries raw bytes, strings, typed objects and RPC envelopes over one
//! duplex connection (TCP, Unix domain socket, Windows named pipe). Both ends are
//! symmetric: either side can register services and call the other's.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte transports and the length-prefixed stream codec
//! - [`frame`]: the tagged frame codec
//! - [`rpc`]: type identifiers, envelopes, services, dispatcher and correlator
//! - [`peer`]: the connection handler, connect/listen factories (behind `peer`)
//! - [`chat`]: a small demo service with a hand-written proxy (behind `peer`)

/// Re-export transport types.
pub mod transport {
    pub use plainipc_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use plainipc_frame::*;
}

/// Re-export RPC types.
pub mod rpc {
    pub use plainipc_rpc::*;
}

/// Re-export connection handler types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use plainipc_peer::*;
}

#[cfg(feature = "peer")]
pub mod chat;

pub use plainipc_rpc::remote_type;
