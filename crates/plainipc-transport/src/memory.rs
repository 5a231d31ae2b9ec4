//! In-process transport pair, mainly for tests and same-process wiring.

use crate::config::TransportConfig;
use crate::stream::StreamTransport;
use crate::traits::Transport;

const DUPLEX_BUFFER: usize = 64 * 1024;

/// Create two transports connected to each other through an in-memory pipe.
///
/// Must be called from within a tokio runtime.
pub fn pair(config: &TransportConfig) -> (Transport, Transport) {
    let (left, right) = tokio::io::duplex(DUPLEX_BUFFER);
    (
        StreamTransport::spawn(left, config, "memory-left"),
        StreamTransport::spawn(right, config, "memory-right"),
    )
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::traits::TransportEvent;

    #[tokio::test]
    async fn pair_is_bidirectional() {
        let (mut left, mut right) = pair(&TransportConfig::default());

        left.sender.send(Bytes::from_static(b"to-right")).await.unwrap();
        right.sender.send(Bytes::from_static(b"to-left")).await.unwrap();

        assert!(matches!(
            right.events.recv().await,
            Some(TransportEvent::Data(data)) if data.as_ref() == b"to-right"
        ));
        assert!(matches!(
            left.events.recv().await,
            Some(TransportEvent::Data(data)) if data.as_ref() == b"to-left"
        ));
    }
}
