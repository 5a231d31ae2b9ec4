//! Remote procedure calls over a plainipc connection.
//!
//! Callee side:
//! - [`ServiceBuilder`] turns an implementation into a [`Service`] of typed invokers
//! - [`Dispatcher`] executes Call envelopes and always answers with a Result or Error
//!
//! Caller side:
//! - [`CallRequest::builder`] assembles a call (the building block of proxies)
//! - [`Correlator`] issues calls, matches answers by correlation id and enforces
//!   per-call deadlines
//!
//! Shared:
//! - [`RemoteMessage`] and its binary envelope codec
//! - [`TypeIdentifier`], [`RemoteType`] and the closed [`TypeRegistry`]
//! - [`ObjectConverter`] with the default [`JsonConverter`] and a binary [`CborConverter`]

pub mod converter;
pub mod correlator;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod registry;
pub mod service;
pub mod type_id;
pub mod types;

pub use converter::{CborConverter, JsonConverter, ObjectConverter};
pub use correlator::{Correlator, CorrelatorConfig, EnvelopeSink, DEFAULT_REMOTE_TIMEOUT};
pub use dispatcher::{Dispatcher, ServiceRegistry};
pub use envelope::{EnvelopeKind, RemoteCall, RemoteMessage};
pub use error::{BoxError, EnvelopeError, Result, RpcError, TypeIdParseError};
pub use registry::{AnyObject, TypeRegistry};
pub use service::{ArgList, ArgumentError, CallBuilder, CallRequest, Service, ServiceBuilder};
pub use type_id::TypeIdentifier;
pub use types::RemoteType;
