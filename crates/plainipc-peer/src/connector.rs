use plainipc_transport::tcp;
use tracing::debug;

use crate::config::IpcConfig;
use crate::endpoint::Endpoint;
use crate::error::{PeerError, Result};
use crate::event::IpcEvents;
use crate::handler::IpcHandler;

/// Connect to a listening peer.
pub async fn connect(endpoint: &Endpoint, config: IpcConfig) -> Result<(IpcHandler, IpcEvents)> {
    let transport = match endpoint {
        Endpoint::Tcp(addr) => tcp::connect(addr, &config.transport).await?,
        #[cfg(unix)]
        Endpoint::Unix(path) => plainipc_transport::uds::connect(path, &config.transport).await?,
        #[cfg(windows)]
        Endpoint::NamedPipe(name) => {
            plainipc_transport::named_pipe::connect(name, &config.transport).await?
        }
        #[allow(unreachable_patterns)]
        other => return Err(PeerError::Unsupported(other.transport_name())),
    };
    debug!(endpoint = %endpoint, "connected");
    Ok(IpcHandler::from_transport(transport, config))
}

/// Connect over TCP.
pub async fn connect_tcp(addr: &str, config: IpcConfig) -> Result<(IpcHandler, IpcEvents)> {
    connect(&Endpoint::Tcp(addr.to_string()), config).await
}

/// Connect over a Unix domain socket.
#[cfg(unix)]
pub async fn connect_unix(
    path: impl AsRef<std::path::Path>,
    config: IpcConfig,
) -> Result<(IpcHandler, IpcEvents)> {
    connect(&Endpoint::Unix(path.as_ref().to_path_buf()), config).await
}

/// Connect over a named pipe.
#[cfg(windows)]
pub async fn connect_named_pipe(name: &str, config: IpcConfig) -> Result<(IpcHandler, IpcEvents)> {
    connect(&Endpoint::NamedPipe(name.to_string()), config).await
}

/// Two handlers joined in process, for tests and embedding.
pub fn memory_pair(config: IpcConfig) -> ((IpcHandler, IpcEvents), (IpcHandler, IpcEvents)) {
    let (left, right) = plainipc_transport::memory::pair(&config.transport);
    (
        IpcHandler::from_transport(left, config.clone()),
        IpcHandler::from_transport(right, config),
    )
}
