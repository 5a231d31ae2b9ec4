use std::time::Duration;

use crate::codec::DEFAULT_MAX_PAYLOAD;

/// Default number of inbound payloads buffered ahead of the consumer.
pub const DEFAULT_INBOUND_CAPACITY: usize = 256;

/// Settings shared by all stream transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// How long a client waits for the remote end to accept. Default: 5 s.
    pub connect_timeout: Duration,
    /// Inbound payloads buffered before the read loop applies backpressure.
    pub inbound_capacity: usize,
}

impl TransportConfig {
    /// Override the payload ceiling.
    pub fn with_max_payload_size(mut self, max_payload_size: usize) -> Self {
        self.max_payload_size = max_payload_size;
        self
    }

    /// Override the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Override the inbound buffer depth (at least one).
    pub fn with_inbound_capacity(mut self, capacity: usize) -> Self {
        self.inbound_capacity = capacity.max(1);
        self
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            connect_timeout: Duration::from_secs(5),
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
        }
    }
}
