use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::TransportError;

/// Length prefix: a 4-byte little-endian signed integer.
pub const PREFIX_SIZE: usize = 4;

/// Length value announcing an orderly close of the sending side.
pub const GOODBYE_MARKER: i32 = -1;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// One decoded unit read off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// A complete logical payload.
    Payload(Bytes),
    /// The peer announced it is closing the connection.
    Goodbye,
}

/// Length-prefix codec shared by every stream transport.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────────┐
/// │ Length       │ Payload          │
/// │ (4B LE i32)  │ (Length bytes)   │
/// └──────────────┴──────────────────┘
/// ```
///
/// A length of `-1` carries no payload and marks an orderly shutdown.
#[derive(Debug, Clone)]
pub struct LengthPrefixCodec {
    max_payload_size: usize,
}

impl LengthPrefixCodec {
    /// Create a codec that rejects payloads above `max_payload_size`.
    pub fn new(max_payload_size: usize) -> Self {
        Self { max_payload_size }
    }

    /// Configured payload ceiling.
    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }
}

impl Default for LengthPrefixCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD)
    }
}

impl Decoder for LengthPrefixCodec {
    type Item = Packet;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, TransportError> {
        if src.len() < PREFIX_SIZE {
            return Ok(None); // Need more data
        }

        let declared = i32::from_le_bytes([src[0], src[1], src[2], src[3]]);
        if declared == GOODBYE_MARKER {
            src.advance(PREFIX_SIZE);
            return Ok(Some(Packet::Goodbye));
        }
        if declared < 0 {
            return Err(TransportError::InvalidLength(declared));
        }

        let payload_len = declared as usize;
        if payload_len > self.max_payload_size {
            return Err(TransportError::PayloadTooLarge {
                size: payload_len,
                max: self.max_payload_size,
            });
        }

        let total = PREFIX_SIZE + payload_len;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None); // Need more data
        }

        src.advance(PREFIX_SIZE);
        Ok(Some(Packet::Payload(src.split_to(payload_len).freeze())))
    }
}

impl Encoder<Packet> for LengthPrefixCodec {
    type Error = TransportError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), TransportError> {
        match item {
            Packet::Payload(payload) => {
                let max = self.max_payload_size.min(i32::MAX as usize);
                if payload.len() > max {
                    return Err(TransportError::PayloadTooLarge {
                        size: payload.len(),
                        max,
                    });
                }
                dst.reserve(PREFIX_SIZE + payload.len());
                dst.put_i32_le(payload.len() as i32);
                dst.put_slice(&payload);
            }
            Packet::Goodbye => dst.put_i32_le(GOODBYE_MARKER),
        }
        Ok(())
    }
}
