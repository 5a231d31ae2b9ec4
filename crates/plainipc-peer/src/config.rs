use std::sync::Arc;
use std::time::Duration;

use plainipc_rpc::{CorrelatorConfig, JsonConverter, ObjectConverter};
use plainipc_transport::TransportConfig;

/// Settings for one connection handler.
#[derive(Clone)]
pub struct IpcConfig {
    pub transport: TransportConfig,
    pub correlator: CorrelatorConfig,
    /// Format for objects, arguments and return values. Default: compact JSON.
    pub converter: Arc<dyn ObjectConverter>,
}

impl IpcConfig {
    /// Override the remote call deadline.
    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.correlator.remote_timeout = timeout;
        self
    }

    /// Override the transport settings.
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Use a different object converter. Both ends must agree on it.
    pub fn with_converter(mut self, converter: impl ObjectConverter) -> Self {
        self.converter = Arc::new(converter);
        self
    }
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            correlator: CorrelatorConfig::default(),
            converter: Arc::new(JsonConverter::new()),
        }
    }
}

impl std::fmt::Debug for IpcConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcConfig")
            .field("transport", &self.transport)
            .field("correlator", &self.correlator)
            .field("converter", &self.converter.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IpcConfig::default();
        assert_eq!(config.correlator.remote_timeout, Duration::from_secs(10));
        assert_eq!(config.transport.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.converter.name(), "json");
    }

    #[test]
    fn test_overrides() {
        let config = IpcConfig::default()
            .with_remote_timeout(Duration::from_millis(250))
            .with_converter(JsonConverter::pretty());
        assert_eq!(config.correlator.remote_timeout, Duration::from_millis(250));
        assert!(format!("{config:?}").contains("json"));
    }
}
