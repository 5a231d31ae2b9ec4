/// Errors that can occur during frame encoding/decoding.
///
/// A decode failure concerns a single frame only; the connection it arrived on stays
/// usable.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame carried no bytes at all, not even a tag.
    #[error("empty frame")]
    Empty,

    /// The leading tag byte is not a known frame kind.
    #[error("unknown frame kind {0}")]
    UnknownKind(u8),

    /// A NUL-terminated string field has no terminator.
    #[error("missing NUL terminator in {field}")]
    MissingTerminator { field: &'static str },

    /// A string field is not valid UTF-8.
    #[error("invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    /// An object type name must not contain NUL bytes.
    #[error("type name contains a NUL byte")]
    EmbeddedNul,

    /// The object's declared length does not match the bytes that follow it.
    #[error("object length mismatch (declared {declared}, actual {actual})")]
    LengthMismatch { declared: i64, actual: usize },

    /// The payload cannot be described by a 32-bit length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
