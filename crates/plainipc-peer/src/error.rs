use plainipc_rpc::RpcError;

/// Errors that can occur in connection handler operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error. The connection may be degraded after a failed send.
    #[error("transport error: {0}")]
    Transport(#[from] plainipc_transport::TransportError),

    /// A frame could not be built.
    #[error("frame error: {0}")]
    Frame(#[from] plainipc_frame::FrameError),

    /// Remote call, conversion or service registration failure.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// The handler was disposed.
    #[error("ipc handler is disposed")]
    Disposed,

    /// An endpoint string could not be parsed.
    #[error("invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    /// The endpoint kind is not available on this platform.
    #[error("{0} endpoints are not supported on this platform")]
    Unsupported(&'static str),
}

impl PeerError {
    /// The callee reported this failure.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Rpc(RpcError::Remote { .. }))
    }

    /// The call's deadline elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Rpc(RpcError::Timeout(_)))
    }

    /// Text of a remote failure.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            Self::Rpc(RpcError::Remote { message }) => Some(message),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PeerError>;
