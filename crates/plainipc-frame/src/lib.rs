//! Tagged message frames for plainipc.
//!
//! Each transport payload holds exactly one frame:
//! - A 1-byte tag naming the [`FrameKind`]
//! - The kind-specific body (raw bytes, NUL-terminated UTF-8, a typed object, or an
//!   RPC envelope)
//!
//! Decoding never panics on hostile input; malformed frames surface as
//! [`FrameError`] so the receiver can drop them and keep the connection.

pub mod codec;
pub mod error;

pub use codec::{
    decode_frame, decode_payload, encode_frame, encode_object, encode_payload, encode_raw,
    encode_remote_message, encode_string, Frame, FrameKind, FramePayload,
};
pub use error::{FrameError, Result};
