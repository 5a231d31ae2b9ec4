use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::converter::ObjectConverter;
use crate::envelope::{RemoteCall, RemoteMessage};
use crate::error::{Result, RpcError};
use crate::service::Service;
use crate::type_id::TypeIdentifier;

/// Services reachable on one connection, one per interface.
#[derive(Default)]
pub struct ServiceRegistry {
    services: RwLock<HashMap<TypeIdentifier, Arc<Service>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a service. A second service for the same interface is rejected and the
    /// first one stays in place.
    pub fn register(&self, service: Service) -> Result<()> {
        let mut services = self.services.write();
        let interface = service.interface().clone();
        if services.contains_key(&interface) {
            return Err(RpcError::DuplicateService(interface.to_string()));
        }
        debug!(interface = %interface, methods = ?service.method_names(), "service registered");
        services.insert(interface, Arc::new(service));
        Ok(())
    }

    /// Remove the service for `interface`. Calls already running are not affected.
    pub fn unregister(&self, interface: &TypeIdentifier) -> bool {
        self.services.write().remove(interface).is_some()
    }

    pub fn get(&self, interface: &TypeIdentifier) -> Option<Arc<Service>> {
        self.services.read().get(interface).cloned()
    }

    /// Registered interfaces, sorted.
    pub fn interfaces(&self) -> Vec<TypeIdentifier> {
        let mut interfaces: Vec<TypeIdentifier> = self.services.read().keys().cloned().collect();
        interfaces.sort();
        interfaces
    }

    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }
}

/// Callee side of RPC: executes Call envelopes against registered services.
pub struct Dispatcher {
    registry: ServiceRegistry,
    converter: Arc<dyn ObjectConverter>,
}

impl Dispatcher {
    pub fn new(converter: Arc<dyn ObjectConverter>) -> Self {
        Self {
            registry: ServiceRegistry::new(),
            converter,
        }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Shorthand for `registry().register(service)`.
    pub fn register(&self, service: Service) -> Result<()> {
        self.registry.register(service)
    }

    /// Execute one call and produce its answer.
    ///
    /// Always yields a Result or an Error envelope carrying the call's id; no failure
    /// of the lookup, the argument decoding or the method itself escapes.
    pub async fn dispatch(&self, call: RemoteCall) -> RemoteMessage {
        let id = call.id;
        let method = call.method.clone();
        match self.execute(call).await {
            Ok(payload) => {
                debug!(%id, method = %method, size = payload.len(), "call completed");
                RemoteMessage::Result { id, payload }
            }
            Err(message) => {
                warn!(%id, method = %method, error = %message, "call failed");
                RemoteMessage::Error { id, message }
            }
        }
    }

    async fn execute(&self, call: RemoteCall) -> std::result::Result<Bytes, String> {
        let service = self.registry.get(&call.interface).ok_or_else(|| {
            format!(
                "No implementation registered for interface '{}'.",
                call.interface
            )
        })?;
        let invoker =
            service.resolve(&call.method, &call.generic_arguments, call.arguments.len())?;
        invoker(Arc::clone(&self.converter), call.arguments).await
    }
}
