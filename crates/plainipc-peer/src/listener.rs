use std::sync::atomic::{AtomicU64, Ordering};

use plainipc_transport::TcpIpcListener;
use tracing::info;

use crate::config::IpcConfig;
use crate::endpoint::Endpoint;
use crate::error::{PeerError, Result};
use crate::event::IpcEvents;
use crate::handler::IpcHandler;

enum Inner {
    Tcp(TcpIpcListener),
    #[cfg(unix)]
    Unix(plainipc_transport::UnixIpcListener),
    #[cfg(windows)]
    NamedPipe(plainipc_transport::NamedPipeListener),
}

/// Listens for and accepts connections, wrapping each in an [`IpcHandler`].
pub struct IpcListener {
    inner: Inner,
    config: IpcConfig,
    accepted: AtomicU64,
}

impl IpcListener {
    /// Bind to `endpoint`.
    pub async fn bind(endpoint: &Endpoint, config: IpcConfig) -> Result<Self> {
        let inner = match endpoint {
            Endpoint::Tcp(addr) => Inner::Tcp(TcpIpcListener::bind(addr, config.transport.clone()).await?),
            #[cfg(unix)]
            Endpoint::Unix(path) => Inner::Unix(plainipc_transport::UnixIpcListener::bind(
                path,
                config.transport.clone(),
            )?),
            #[cfg(windows)]
            Endpoint::NamedPipe(name) => Inner::NamedPipe(
                plainipc_transport::NamedPipeListener::bind(name, config.transport.clone())?,
            ),
            #[allow(unreachable_patterns)]
            other => return Err(PeerError::Unsupported(other.transport_name())),
        };
        let listener = Self {
            inner,
            config,
            accepted: AtomicU64::new(0),
        };
        info!(endpoint = %listener.local_endpoint()?, "listening");
        Ok(listener)
    }

    /// Bind a TCP listener. Port 0 picks a free port; see [`IpcListener::local_endpoint`].
    pub async fn bind_tcp(addr: &str, config: IpcConfig) -> Result<Self> {
        Self::bind(&Endpoint::Tcp(addr.to_string()), config).await
    }

    /// Bind a Unix domain socket, replacing a stale socket file.
    #[cfg(unix)]
    pub async fn bind_unix(path: impl AsRef<std::path::Path>, config: IpcConfig) -> Result<Self> {
        Self::bind(&Endpoint::Unix(path.as_ref().to_path_buf()), config).await
    }

    /// Bind a named pipe.
    #[cfg(windows)]
    pub async fn bind_named_pipe(name: &str, config: IpcConfig) -> Result<Self> {
        Self::bind(&Endpoint::NamedPipe(name.to_string()), config).await
    }

    /// Wait for the next connection.
    pub async fn accept(&self) -> Result<(IpcHandler, IpcEvents)> {
        let transport = match &self.inner {
            Inner::Tcp(listener) => listener.accept().await?,
            #[cfg(unix)]
            Inner::Unix(listener) => listener.accept().await?,
            #[cfg(windows)]
            Inner::NamedPipe(listener) => listener.accept().await?,
        };
        let count = self.accepted.fetch_add(1, Ordering::Relaxed) + 1;
        info!(transport = self.transport_name(), accepted = count, "connection accepted");
        Ok(IpcHandler::from_transport(transport, self.config.clone()))
    }

    /// The endpoint clients should connect to.
    pub fn local_endpoint(&self) -> Result<Endpoint> {
        Ok(match &self.inner {
            Inner::Tcp(listener) => Endpoint::Tcp(listener.local_addr()?.to_string()),
            #[cfg(unix)]
            Inner::Unix(listener) => Endpoint::Unix(listener.path().to_path_buf()),
            #[cfg(windows)]
            Inner::NamedPipe(listener) => Endpoint::NamedPipe(listener.path().to_string()),
        })
    }

    /// Connections accepted so far.
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            Inner::Tcp(listener) => listener.transport_name(),
            #[cfg(unix)]
            Inner::Unix(listener) => listener.transport_name(),
            #[cfg(windows)]
            Inner::NamedPipe(listener) => listener.transport_name(),
        }
    }
}
