use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Tag byte size.
pub const TAG_SIZE: usize = 1;

/// Object length field size (`i32` LE).
pub const OBJECT_LENGTH_SIZE: usize = 4;

/// What a frame carries, encoded as its leading tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameKind {
    /// Opaque bytes.
    Raw = 0,
    /// A NUL-terminated UTF-8 string.
    String = 1,
    /// A serialized object preceded by its type identifier.
    Object = 2,
    /// An RPC envelope.
    RemoteMessage = 3,
}

impl FrameKind {
    /// Human-readable name for diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::String => "string",
            Self::Object => "object",
            Self::RemoteMessage => "remote-message",
        }
    }
}

impl TryFrom<u8> for FrameKind {
    type Error = FrameError;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::Raw),
            1 => Ok(Self::String),
            2 => Ok(Self::Object),
            3 => Ok(Self::RemoteMessage),
            other => Err(FrameError::UnknownKind(other)),
        }
    }
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A tagged message as it travels over one transport payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// What the payload holds.
    pub kind: FrameKind,
    /// Everything after the tag byte.
    pub payload: Bytes,
}

/// Decoded frame contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePayload {
    Raw(Bytes),
    String(String),
    Object { type_name: String, data: Bytes },
    RemoteMessage(Bytes),
}

impl FramePayload {
    /// The kind this payload is sent as.
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::Raw(_) => FrameKind::Raw,
            Self::String(_) => FrameKind::String,
            Self::Object { .. } => FrameKind::Object,
            Self::RemoteMessage(_) => FrameKind::RemoteMessage,
        }
    }
}

impl Frame {
    /// Create a new frame.
    pub fn new(kind: FrameKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (tag + payload).
    pub fn wire_size(&self) -> usize {
        TAG_SIZE + self.payload.len()
    }

    /// Interpret the payload according to the frame kind.
    pub fn into_payload(self) -> Result<FramePayload> {
        match self.kind {
            FrameKind::Raw => Ok(FramePayload::Raw(self.payload)),
            FrameKind::RemoteMessage => Ok(FramePayload::RemoteMessage(self.payload)),
            FrameKind::String => {
                let text = match self.payload.split_last() {
                    Some((0, text)) => text,
                    _ => return Err(FrameError::MissingTerminator { field: "string" }),
                };
                let text = std::str::from_utf8(text)
                    .map_err(|_| FrameError::InvalidUtf8 { field: "string" })?;
                Ok(FramePayload::String(text.to_owned()))
            }
            FrameKind::Object => {
                let mut payload = self.payload;
                let type_name = read_nul_terminated(&mut payload, "object type name")?;
                if payload.remaining() < OBJECT_LENGTH_SIZE {
                    return Err(FrameError::LengthMismatch {
                        declared: -1,
                        actual: payload.remaining(),
                    });
                }
                let declared = payload.get_i32_le();
                if declared < 0 || declared as usize != payload.remaining() {
                    return Err(FrameError::LengthMismatch {
                        declared: declared.into(),
                        actual: payload.remaining(),
                    });
                }
                Ok(FramePayload::Object {
                    type_name,
                    data: payload,
                })
            }
        }
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────────────────────────────────────────┐
/// │ Tag (1B) │ Payload                                      │
/// │ 0..=3    │ raw bytes / UTF-8 + NUL / object / envelope  │
/// └──────────┴──────────────────────────────────────────────┘
/// ```
///
/// Object payloads are laid out as:
/// ```text
/// ┌────────────────────────┬──────────────┬────────────────┐
/// │ Type name (UTF-8, NUL) │ Length (4B)  │ Data           │
/// └────────────────────────┴──────────────┴────────────────┘
/// ```
pub fn encode_frame(kind: FrameKind, payload: &[u8]) -> Bytes {
    let mut dst = BytesMut::with_capacity(TAG_SIZE + payload.len());
    dst.put_u8(kind as u8);
    dst.put_slice(payload);
    dst.freeze()
}

/// Encode a raw byte frame.
pub fn encode_raw(data: &[u8]) -> Bytes {
    encode_frame(FrameKind::Raw, data)
}

/// Encode a string frame. The text is written as UTF-8 followed by a NUL byte.
///
/// Only the final byte is the terminator, so text containing NUL survives intact.
pub fn encode_string(text: &str) -> Bytes {
    let mut dst = BytesMut::with_capacity(TAG_SIZE + text.len() + 1);
    dst.put_u8(FrameKind::String as u8);
    dst.put_slice(text.as_bytes());
    dst.put_u8(0);
    dst.freeze()
}

/// Encode an object frame from an already serialized value.
pub fn encode_object(type_name: &str, data: &[u8]) -> Result<Bytes> {
    if type_name.as_bytes().contains(&0) {
        return Err(FrameError::EmbeddedNul);
    }
    let max = i32::MAX as usize;
    if data.len() > max {
        return Err(FrameError::PayloadTooLarge {
            size: data.len(),
            max,
        });
    }

    let mut dst =
        BytesMut::with_capacity(TAG_SIZE + type_name.len() + 1 + OBJECT_LENGTH_SIZE + data.len());
    dst.put_u8(FrameKind::Object as u8);
    dst.put_slice(type_name.as_bytes());
    dst.put_u8(0);
    dst.put_i32_le(data.len() as i32);
    dst.put_slice(data);
    Ok(dst.freeze())
}

/// Encode an RPC envelope frame.
pub fn encode_remote_message(envelope: &[u8]) -> Bytes {
    encode_frame(FrameKind::RemoteMessage, envelope)
}

/// Encode a decoded payload back into its frame.
pub fn encode_payload(payload: &FramePayload) -> Result<Bytes> {
    match payload {
        FramePayload::Raw(data) => Ok(encode_raw(data)),
        FramePayload::String(text) => Ok(encode_string(text)),
        FramePayload::Object { type_name, data } => encode_object(type_name, data),
        FramePayload::RemoteMessage(envelope) => Ok(encode_remote_message(envelope)),
    }
}

/// Split one received transport payload into tag and body.
pub fn decode_frame(mut src: Bytes) -> Result<Frame> {
    if src.is_empty() {
        return Err(FrameError::Empty);
    }
    let kind = FrameKind::try_from(src.get_u8())?;
    Ok(Frame { kind, payload: src })
}

/// Decode a received transport payload all the way to its contents.
pub fn decode_payload(src: Bytes) -> Result<FramePayload> {
    decode_frame(src)?.into_payload()
}

fn read_nul_terminated(src: &mut Bytes, field: &'static str) -> Result<String> {
    let end = src
        .iter()
        .position(|&b| b == 0)
        .ok_or(FrameError::MissingTerminator { field })?;
    let text = src.split_to(end);
    src.advance(1);
    String::from_utf8(text.to_vec()).map_err(|_| FrameError::InvalidUtf8 { field })
}
