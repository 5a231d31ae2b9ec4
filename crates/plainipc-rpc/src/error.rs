use std::time::Duration;

/// Boxed error returned by envelope sinks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A type identifier string that does not follow the `"<assembly> <name>[<args>]"` grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid type identifier '{input}': {reason}")]
pub struct TypeIdParseError {
    pub input: String,
    pub reason: &'static str,
}

/// Malformed RPC envelope. The frame carrying it is dropped.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// The buffer ends before a field is complete.
    #[error("envelope truncated at offset {offset} ({needed} more bytes needed)")]
    Truncated { offset: usize, needed: usize },

    /// The leading total length disagrees with the buffer size.
    #[error("envelope length mismatch (declared {declared}, actual {actual})")]
    LengthMismatch { declared: i64, actual: usize },

    /// The envelope kind is not Call, Result or Error.
    #[error("unknown envelope kind {0}")]
    UnknownKind(i32),

    /// A length or count field is negative.
    #[error("negative {field} ({value})")]
    NegativeLength { field: &'static str, value: i32 },

    /// A string field is not valid UTF-8.
    #[error("invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    /// Bytes remain after the last field of the envelope.
    #[error("{0} trailing bytes after envelope body")]
    TrailingBytes(usize),

    /// A field cannot be described by a 32-bit length.
    #[error("{field} too large ({size} bytes)")]
    FieldTooLarge { field: &'static str, size: usize },

    /// A type identifier inside a Call does not parse.
    #[error(transparent)]
    TypeIdentifier(#[from] TypeIdParseError),
}

/// Errors surfaced by the RPC layer.
///
/// Remote faults, timeouts and local failures are distinct variants so callers can
/// choose different retry policies for each.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// The callee reported a failure.
    #[error("remote error: {message}")]
    Remote { message: String },

    /// No Result or Error arrived before the call's deadline.
    #[error("remote call timed out after {0:?}")]
    Timeout(Duration),

    /// A type identifier is not part of the closed set known to this process.
    #[error("cannot resolve type '{type_name}': {reason}")]
    TypeResolution { type_name: String, reason: String },

    /// The correlator was disposed before or during the call.
    #[error("remote executor is disposed")]
    Disposed,

    /// A service is already registered for this interface.
    #[error("service for interface '{0}' is already registered")]
    DuplicateService(String),

    /// Serializing or deserializing a value failed.
    #[error("object conversion failed: {0}")]
    Conversion(#[from] serde_json::Error),

    /// Encoding or decoding an envelope failed.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// The Call envelope could not be handed to the connection.
    #[error("failed to send call: {0}")]
    Send(#[source] BoxError),
}

pub type Result<T> = std::result::Result<T, RpcError>;
