use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::converter::ObjectConverter;
use crate::error::{Result, RpcError};
use crate::type_id::TypeIdentifier;
use crate::types::RemoteType;
use uuid::Uuid;

/// A received object, materialized as its registered Rust type.
pub type AnyObject = Box<dyn Any + Send + Sync>;

type Materializer =
    Arc<dyn Fn(&dyn ObjectConverter, &[u8]) -> Result<AnyObject> + Send + Sync + 'static>;

#[derive(Clone)]
struct Entry {
    rust_name: &'static str,
    materialize: Materializer,
}

/// Closed set of types this process accepts in object frames.
///
/// Identifiers that were never registered are rejected with
/// [`RpcError::TypeResolution`]; nothing is resolved on demand.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    entries: HashMap<TypeIdentifier, Entry>,
}

impl TypeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the scalar built-ins and `String`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register::<bool>()
            .register::<i8>()
            .register::<i16>()
            .register::<i32>()
            .register::<i64>()
            .register::<u8>()
            .register::<u16>()
            .register::<u32>()
            .register::<u64>()
            .register::<f32>()
            .register::<f64>()
            .register::<char>()
            .register::<String>()
            .register::<Uuid>()
            .register::<Vec<u8>>()
            .register::<Vec<String>>();
        registry
    }

    /// Accept `T` in inbound object frames.
    pub fn register<T: RemoteType>(&mut self) -> &mut Self {
        let entry = Entry {
            rust_name: std::any::type_name::<T>(),
            materialize: Arc::new(|converter: &dyn ObjectConverter, data: &[u8]| {
                let value: T = converter.deserialize(data)?;
                Ok(Box::new(value) as AnyObject)
            }),
        };
        self.entries.insert(T::type_identifier(), entry);
        self
    }

    /// Whether `id` has been registered.
    pub fn contains(&self, id: &TypeIdentifier) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rust type registered for `id`.
    pub fn rust_type_name(&self, id: &TypeIdentifier) -> Option<&'static str> {
        self.entries.get(id).map(|entry| entry.rust_name)
    }

    /// Parse an encoded identifier and confirm that it is registered.
    pub fn resolve(&self, type_name: &str) -> Result<TypeIdentifier> {
        let id = TypeIdentifier::parse(type_name).map_err(|err| RpcError::TypeResolution {
            type_name: type_name.to_string(),
            reason: err.reason.to_string(),
        })?;
        if !self.contains(&id) {
            return Err(RpcError::TypeResolution {
                type_name: type_name.to_string(),
                reason: "type is not registered".to_string(),
            });
        }
        Ok(id)
    }

    /// Deserialize `data` into the type registered under `type_name`.
    pub fn materialize(
        &self,
        type_name: &str,
        converter: &dyn ObjectConverter,
        data: &[u8],
    ) -> Result<(TypeIdentifier, AnyObject)> {
        let id = self.resolve(type_name)?;
        let entry = self
            .entries
            .get(&id)
            .ok_or_else(|| RpcError::TypeResolution {
                type_name: type_name.to_string(),
                reason: "type is not registered".to_string(),
            })?;
        let value = (entry.materialize)(converter, data)?;
        Ok((id, value))
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set()
            .entries(self.entries.keys().map(ToString::to_string))
            .finish()
    }
}
