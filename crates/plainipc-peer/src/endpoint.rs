use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::PeerError;

/// Where a connection lives.
///
/// Parsed from `tcp://host:port`, `unix:///path/to.sock` or `pipe://name`. A string
/// without a scheme is a socket path on Unix and a pipe name on Windows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Tcp(String),
    Unix(PathBuf),
    NamedPipe(String),
}

impl Endpoint {
    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match self {
            Self::Tcp(_) => "tcp",
            Self::Unix(_) => "unix",
            Self::NamedPipe(_) => "pipe",
        }
    }
}

impl FromStr for Endpoint {
    type Err = PeerError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || PeerError::InvalidEndpoint(input.to_string());
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid());
        }
        if let Some(addr) = trimmed.strip_prefix("tcp://") {
            if addr.is_empty() || !addr.contains(':') {
                return Err(invalid());
            }
            return Ok(Self::Tcp(addr.to_string()));
        }
        if let Some(path) = trimmed.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(invalid());
            }
            return Ok(Self::Unix(PathBuf::from(path)));
        }
        if let Some(name) = trimmed.strip_prefix("pipe://") {
            if name.is_empty() {
                return Err(invalid());
            }
            return Ok(Self::NamedPipe(name.to_string()));
        }
        if trimmed.contains("://") {
            return Err(invalid());
        }
        if cfg!(windows) {
            Ok(Self::NamedPipe(trimmed.to_string()))
        } else {
            Ok(Self::Unix(PathBuf::from(trimmed)))
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
            Self::NamedPipe(name) => write!(f, "pipe://{name}"),
        }
    }
}
