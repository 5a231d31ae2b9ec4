use std::time::Duration;

use tokio::net::windows::named_pipe::{ClientOptions, NamedPipeServer, ServerOptions};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::stream::StreamTransport;
use crate::traits::Transport;

/// `ERROR_PIPE_BUSY`: every server instance is currently taken.
const ERROR_PIPE_BUSY: i32 = 231;

const BUSY_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Normalize a bare pipe name to the `\\.\pipe\` namespace.
pub fn pipe_path(name: &str) -> String {
    if name.starts_with(r"\\") {
        name.to_string()
    } else {
        format!(r"\\.\pipe\{name}")
    }
}

/// Connect to a named pipe server, retrying while all instances are busy.
pub async fn connect(name: &str, config: &TransportConfig) -> Result<Transport> {
    let path = pipe_path(name);
    let deadline = tokio::time::Instant::now() + config.connect_timeout;

    let client = loop {
        match ClientOptions::new().open(&path) {
            Ok(client) => break client,
            Err(err) if err.raw_os_error() == Some(ERROR_PIPE_BUSY) => {
                if tokio::time::Instant::now() >= deadline {
                    return Err(TransportError::ConnectTimeout {
                        addr: path,
                        timeout: config.connect_timeout,
                    });
                }
                tokio::time::sleep(BUSY_RETRY_DELAY).await;
            }
            Err(source) => return Err(TransportError::Connect { addr: path, source }),
        }
    };

    debug!(%path, "connected to named pipe");
    Ok(StreamTransport::spawn(client, config, path))
}

/// Named pipe server. Each accepted connection consumes the waiting server instance
/// and a fresh one is created for the next client.
pub struct NamedPipeListener {
    path: String,
    next: Mutex<NamedPipeServer>,
    config: TransportConfig,
}

impl NamedPipeListener {
    /// Create the first pipe instance. Must be called from within a tokio runtime.
    pub fn bind(name: &str, config: TransportConfig) -> Result<Self> {
        let path = pipe_path(name);
        let server = ServerOptions::new()
            .first_pipe_instance(true)
            .create(&path)
            .map_err(|source| TransportError::Bind {
                addr: path.clone(),
                source,
            })?;
        info!(%path, "listening on named pipe");
        Ok(Self {
            path,
            next: Mutex::new(server),
            config,
        })
    }

    /// Wait for a client on the current instance.
    pub async fn accept(&self) -> Result<Transport> {
        let mut next = self.next.lock().await;
        next.connect().await.map_err(TransportError::Accept)?;

        let fresh = ServerOptions::new()
            .create(&self.path)
            .map_err(TransportError::Accept)?;
        let connected = std::mem::replace(&mut *next, fresh);
        debug!(path = %self.path, "accepted named pipe client");
        Ok(StreamTransport::spawn(connected, &self.config, self.path.clone()))
    }

    /// Full pipe path (`\\.\pipe\...`).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        "named-pipe"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipe_path_normalization() {
        assert_eq!(pipe_path("chat"), r"\\.\pipe\chat");
        assert_eq!(pipe_path(r"\\.\pipe\chat"), r"\\.\pipe\chat");
    }
}
