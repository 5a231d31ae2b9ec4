use bytes::{Buf, BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::error::EnvelopeError;
use crate::type_id::TypeIdentifier;

/// Fixed envelope header: total length (8) + kind (4) + correlation id (16).
pub const HEADER_SIZE: usize = 8 + 4 + 16;

type Result<T> = std::result::Result<T, EnvelopeError>;

/// Envelope discriminant as written on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum EnvelopeKind {
    Call = 0,
    Result = 1,
    Error = 2,
}

impl TryFrom<i32> for EnvelopeKind {
    type Error = EnvelopeError;

    fn try_from(value: i32) -> Result<Self> {
        match value {
            0 => Ok(Self::Call),
            1 => Ok(Self::Result),
            2 => Ok(Self::Error),
            other => Err(EnvelopeError::UnknownKind(other)),
        }
    }
}

/// A request to invoke `method` on the service registered for `interface`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    pub id: Uuid,
    pub interface: TypeIdentifier,
    pub method: String,
    /// One serialized value per parameter, in declaration order.
    pub arguments: Vec<Bytes>,
    pub generic_arguments: Vec<TypeIdentifier>,
}

/// RPC envelope carried inside a remote-message frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteMessage {
    Call(RemoteCall),
    /// Serialized return value; empty for methods without one.
    Result { id: Uuid, payload: Bytes },
    Error { id: Uuid, message: String },
}

impl RemoteMessage {
    /// Correlation id shared by a Call and its Result or Error.
    pub fn id(&self) -> Uuid {
        match self {
            Self::Call(call) => call.id,
            Self::Result { id, .. } | Self::Error { id, .. } => *id,
        }
    }

    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Self::Call(_) => EnvelopeKind::Call,
            Self::Result { .. } => EnvelopeKind::Result,
            Self::Error { .. } => EnvelopeKind::Error,
        }
    }

    /// Encode into the wire layout.
    ///
    /// ```text
    /// [i64 total length][i32 kind][16-byte correlation id][body]
    /// Call:   [str interface][str method][i32 n][n x (i32 len + bytes)][i32 m][m x str type]
    /// Result: [i32 len + bytes]
    /// Error:  [str message]
    /// ```
    ///
    /// Integers are little-endian; `str` is an `i32` byte length followed by UTF-8.
    pub fn encode(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(HEADER_SIZE + 64);
        dst.put_i64_le(0); // patched below
        dst.put_i32_le(self.kind() as i32);
        dst.put_slice(&self.id().to_bytes_le());

        match self {
            Self::Call(call) => {
                put_str(&mut dst, &call.interface.to_string(), "interface id")?;
                put_str(&mut dst, &call.method, "method name")?;
                put_count(&mut dst, call.arguments.len(), "argument count")?;
                for argument in &call.arguments {
                    put_blob(&mut dst, argument, "argument")?;
                }
                put_count(&mut dst, call.generic_arguments.len(), "generic argument count")?;
                for generic in &call.generic_arguments {
                    put_str(&mut dst, &generic.to_string(), "generic argument")?;
                }
            }
            Self::Result { payload, .. } => put_blob(&mut dst, payload, "result payload")?,
            Self::Error { message, .. } => put_str(&mut dst, message, "error message")?,
        }

        let total = dst.len() as i64;
        dst[..8].copy_from_slice(&total.to_le_bytes());
        Ok(dst.freeze())
    }

    /// Decode one envelope; the buffer must hold exactly one envelope.
    pub fn decode(src: Bytes) -> Result<Self> {
        let mut reader = Reader::new(src);

        let declared = reader.i64()?;
        let actual = reader.len();
        if declared != actual as i64 {
            return Err(EnvelopeError::LengthMismatch { declared, actual });
        }
        let kind = EnvelopeKind::try_from(reader.i32()?)?;
        let id = reader.uuid()?;

        let message = match kind {
            EnvelopeKind::Call => {
                let interface = TypeIdentifier::parse(&reader.string("interface id")?)?;
                let method = reader.string("method name")?;
                let argument_count = reader.count("argument count")?;
                let mut arguments = Vec::with_capacity(argument_count.min(reader.remaining()));
                for _ in 0..argument_count {
                    arguments.push(reader.blob("argument")?);
                }
                let generic_count = reader.count("generic argument count")?;
                let mut generic_arguments =
                    Vec::with_capacity(generic_count.min(reader.remaining()));
                for _ in 0..generic_count {
                    generic_arguments
                        .push(TypeIdentifier::parse(&reader.string("generic argument")?)?);
                }
                Self::Call(RemoteCall {
                    id,
                    interface,
                    method,
                    arguments,
                    generic_arguments,
                })
            }
            EnvelopeKind::Result => Self::Result {
                id,
                payload: reader.blob("result payload")?,
            },
            EnvelopeKind::Error => Self::Error {
                id,
                message: reader.string("error message")?,
            },
        };

        if reader.remaining() != 0 {
            return Err(EnvelopeError::TrailingBytes(reader.remaining()));
        }
        Ok(message)
    }
}

fn put_count(dst: &mut BytesMut, count: usize, field: &'static str) -> Result<()> {
    let count = i32::try_from(count).map_err(|_| EnvelopeError::FieldTooLarge { field, size: count })?;
    dst.put_i32_le(count);
    Ok(())
}

fn put_blob(dst: &mut BytesMut, data: &[u8], field: &'static str) -> Result<()> {
    put_count(dst, data.len(), field)?;
    dst.put_slice(data);
    Ok(())
}

fn put_str(dst: &mut BytesMut, text: &str, field: &'static str) -> Result<()> {
    put_blob(dst, text.as_bytes(), field)
}

/// Bounds-checked cursor over an envelope.
struct Reader {
    buf: Bytes,
    total: usize,
}

impl Reader {
    fn new(buf: Bytes) -> Self {
        let total = buf.len();
        Self { buf, total }
    }

    fn len(&self) -> usize {
        self.total
    }

    fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn need(&self, needed: usize) -> Result<()> {
        if self.buf.remaining() < needed {
            return Err(EnvelopeError::Truncated {
                offset: self.total - self.buf.remaining(),
                needed: needed - self.buf.remaining(),
            });
        }
        Ok(())
    }

    fn i32(&mut self) -> Result<i32> {
        self.need(4)?;
        Ok(self.buf.get_i32_le())
    }

    fn i64(&mut self) -> Result<i64> {
        self.need(8)?;
        Ok(self.buf.get_i64_le())
    }

    fn uuid(&mut self) -> Result<Uuid> {
        self.need(16)?;
        let mut raw = [0u8; 16];
        self.buf.copy_to_slice(&mut raw);
        Ok(Uuid::from_bytes_le(raw))
    }

    fn count(&mut self, field: &'static str) -> Result<usize> {
        let value = self.i32()?;
        usize::try_from(value).map_err(|_| EnvelopeError::NegativeLength { field, value })
    }

    fn blob(&mut self, field: &'static str) -> Result<Bytes> {
        let len = self.count(field)?;
        self.need(len)?;
        Ok(self.buf.split_to(len))
    }

    fn string(&mut self, field: &'static str) -> Result<String> {
        let raw = self.blob(field)?;
        String::from_utf8(raw.to_vec()).map_err(|_| EnvelopeError::InvalidUtf8 { field })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn sample_call() -> RemoteMessage {
        RemoteMessage::Call(RemoteCall {
            id: Uuid::new_v4(),
            interface: TypeIdentifier::new("tests", "tests.IRpcTestService"),
            method: "Generic".to_string(),
            arguments: vec![Bytes::from_static(b"\"x\""), Bytes::new()],
            generic_arguments: vec![
                TypeIdentifier::new("std", "String"),
                TypeIdentifier::new("std", "Option")
                    .with_generic_arguments([TypeIdentifier::new("std", "i32")]),
            ],
        })
    }

    #[test]
    fn test_call_roundtrip() {
        let call = sample_call();
        let wire = call.encode().unwrap();
        assert_eq!(RemoteMessage::decode(wire).unwrap(), call);
    }

    #[test]
    fn test_header_layout() {
        let id = Uuid::new_v4();
        let wire = RemoteMessage::Error {
            id,
            message: "boom".to_string(),
        }
        .encode()
        .unwrap();

        assert_eq!(wire.len(), HEADER_SIZE + 4 + 4);
        assert_eq!(&wire[..8], &(wire.len() as i64).to_le_bytes());
        assert_eq!(&wire[8..12], &2i32.to_le_bytes());
        assert_eq!(&wire[12..28], &id.to_bytes_le());
        assert_eq!(&wire[28..32], &4i32.to_le_bytes());
        assert_eq!(&wire[32..], b"boom");
    }

    #[test]
    fn test_empty_result_payload() {
        let message = RemoteMessage::Result {
            id: Uuid::new_v4(),
            payload: Bytes::new(),
        };
        let decoded = RemoteMessage::decode(message.encode().unwrap()).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(decoded.kind(), EnvelopeKind::Result);
    }

    #[test]
    fn test_truncated_envelope_rejected() {
        let wire = sample_call().encode().unwrap();
        let truncated = wire.slice(..wire.len() - 3);
        assert!(matches!(
            RemoteMessage::decode(truncated),
            Err(EnvelopeError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_short_header_rejected() {
        assert!(matches!(
            RemoteMessage::decode(Bytes::from_static(&[1, 2, 3])),
            Err(EnvelopeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let mut wire = BytesMut::from(
            RemoteMessage::Result {
                id: Uuid::nil(),
                payload: Bytes::new(),
            }
            .encode()
            .unwrap()
            .as_ref(),
        );
        wire[8..12].copy_from_slice(&7i32.to_le_bytes());
        assert!(matches!(
            RemoteMessage::decode(wire.freeze()),
            Err(EnvelopeError::UnknownKind(7))
        ));
    }

    #[test]
    fn test_inner_length_overrun_rejected() {
        let mut wire = BytesMut::from(
            RemoteMessage::Error {
                id: Uuid::nil(),
                message: "abc".to_string(),
            }
            .encode()
            .unwrap()
            .as_ref(),
        );
        wire[28..32].copy_from_slice(&1000i32.to_le_bytes());
        assert!(matches!(
            RemoteMessage::decode(wire.freeze()),
            Err(EnvelopeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut wire = BytesMut::from(
            RemoteMessage::Error {
                id: Uuid::nil(),
                message: "abc".to_string(),
            }
            .encode()
            .unwrap()
            .as_ref(),
        );
        // Shorten the declared string but keep the total length intact.
        wire[28..32].copy_from_slice(&1i32.to_le_bytes());
        assert!(matches!(
            RemoteMessage::decode(wire.freeze()),
            Err(EnvelopeError::TrailingBytes(2))
        ));
    }

    #[test]
    fn test_negative_argument_count_rejected() {
        let wire = RemoteMessage::Call(RemoteCall {
            id: Uuid::nil(),
            interface: TypeIdentifier::new("a", "b"),
            method: "m".to_string(),
            arguments: vec![],
            generic_arguments: vec![],
        })
        .encode()
        .unwrap();
        let mut wire = BytesMut::from(wire.as_ref());
        // header + "a b" + "m"
        let offset = HEADER_SIZE + 4 + 3 + 4 + 1;
        wire[offset..offset + 4].copy_from_slice(&(-5i32).to_le_bytes());
        assert!(matches!(
            RemoteMessage::decode(wire.freeze()),
            Err(EnvelopeError::NegativeLength {
                field: "argument count",
                value: -5
            })
        ));
    }

    #[test]
    fn test_invalid_interface_identifier_rejected() {
        let wire = RemoteMessage::Call(RemoteCall {
            id: Uuid::nil(),
            interface: TypeIdentifier::new("a", "b"),
            method: "m".to_string(),
            arguments: vec![],
            generic_arguments: vec![],
        })
        .encode()
        .unwrap();
        let mut wire = BytesMut::from(wire.as_ref());
        // Replace the separating space of "a b" with a bracket.
        wire[HEADER_SIZE + 4 + 1] = b']';
        assert!(matches!(
            RemoteMessage::decode(wire.freeze()),
            Err(EnvelopeError::TypeIdentifier(_))
        ));
    }
}
