use std::any::TypeId;

use bytes::Bytes;
use serde::de::{DeserializeOwned, Error as _};
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// Pluggable wire format for objects, arguments and return values.
///
/// Values cross this trait as [`serde_json::Value`] so that it stays object safe;
/// use the typed helpers on `dyn ObjectConverter` to go from and to concrete types.
pub trait ObjectConverter: Send + Sync + 'static {
    /// Short format name for diagnostics.
    fn name(&self) -> &'static str;

    /// Encode a value tree.
    fn encode(&self, value: &Value) -> Result<Vec<u8>>;

    /// Decode bytes produced by [`ObjectConverter::encode`] on the other end.
    fn decode(&self, data: &[u8]) -> Result<Value>;
}

impl<'a> dyn ObjectConverter + 'a {
    /// Serialize a concrete value.
    pub fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Bytes> {
        let tree = serde_json::to_value(value)?;
        Ok(Bytes::from(self.encode(&tree)?))
    }

    /// Deserialize into a concrete type.
    pub fn deserialize<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T> {
        let tree = self.decode(data)?;
        Ok(serde_json::from_value(tree)?)
    }

    /// Serialize a method return value. `()` becomes an empty payload.
    pub fn serialize_return<R: Serialize + 'static>(&self, value: &R) -> Result<Bytes> {
        if TypeId::of::<R>() == TypeId::of::<()>() {
            return Ok(Bytes::new());
        }
        self.serialize(value)
    }

    /// Deserialize a method return value. An empty payload is accepted for `()`.
    pub fn deserialize_return<R: DeserializeOwned + 'static>(&self, data: &[u8]) -> Result<R> {
        if data.is_empty() && TypeId::of::<R>() == TypeId::of::<()>() {
            return Ok(serde_json::from_value(Value::Null)?);
        }
        self.deserialize(data)
    }
}

/// UTF-8 JSON, the default format.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConverter {
    pretty: bool,
}

impl JsonConverter {
    /// Compact JSON.
    pub fn new() -> Self {
        Self::default()
    }

    /// Indented JSON; easier to read in packet captures.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl ObjectConverter for JsonConverter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        let encoded = if self.pretty {
            serde_json::to_vec_pretty(value)?
        } else {
            serde_json::to_vec(value)?
        };
        Ok(encoded)
    }

    fn decode(&self, data: &[u8]) -> Result<Value> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// CBOR, a compact binary format. Both ends must use it.
#[derive(Debug, Clone, Copy, Default)]
pub struct CborConverter;

impl CborConverter {
    pub fn new() -> Self {
        Self
    }
}

impl ObjectConverter for CborConverter {
    fn name(&self) -> &'static str {
        "cbor"
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        let mut encoded = Vec::new();
        ciborium::into_writer(value, &mut encoded)
            .map_err(|err| serde_json::Error::custom(format!("cbor encode: {err}")))?;
        Ok(encoded)
    }

    fn decode(&self, data: &[u8]) -> Result<Value> {
        let value = ciborium::from_reader(data)
            .map_err(|err| serde_json::Error::custom(format!("cbor decode: {err}")))?;
        Ok(value)
    }
}
