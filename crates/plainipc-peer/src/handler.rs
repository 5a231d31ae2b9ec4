use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use plainipc_rpc::{
    CallRequest, Correlator, Dispatcher, ObjectConverter, RemoteType, RpcError, Service,
    TypeIdentifier, TypeRegistry,
};
use plainipc_transport::Transport;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::IpcConfig;
use crate::error::{PeerError, Result};
use crate::event::IpcEvents;
use crate::receiver::Receiver;
use crate::sender::IpcSender;

/// One connection: messages, typed objects and remote calls in both directions.
///
/// Inbound frames are processed by a background task started on construction;
/// their outcomes arrive on the [`IpcEvents`] returned alongside the handler.
/// Incoming calls run concurrently with each other and with outgoing calls.
pub struct IpcHandler {
    sender: Arc<IpcSender>,
    dispatcher: Arc<Dispatcher>,
    correlator: Arc<Correlator>,
    types: Arc<RwLock<TypeRegistry>>,
    converter: Arc<dyn ObjectConverter>,
    receive_task: JoinHandle<()>,
    disposed: AtomicBool,
}

impl IpcHandler {
    /// Wrap a connected transport. Must be called within a tokio runtime.
    pub fn from_transport(transport: Transport, config: IpcConfig) -> (Self, IpcEvents) {
        let converter = config.converter;
        let sender = Arc::new(IpcSender::new(transport.sender, Arc::clone(&converter)));
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&converter)));
        let correlator = Arc::new(Correlator::new(config.correlator));
        let types = Arc::new(RwLock::new(TypeRegistry::with_builtins()));
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let receiver = Receiver {
            sender: Arc::clone(&sender),
            dispatcher: Arc::clone(&dispatcher),
            correlator: Arc::clone(&correlator),
            types: Arc::clone(&types),
            converter: Arc::clone(&converter),
            events: events_tx,
        };
        let receive_task = tokio::spawn(receiver.run(transport.events));

        let handler = Self {
            sender,
            dispatcher,
            correlator,
            types,
            converter,
            receive_task,
            disposed: AtomicBool::new(false),
        };
        (handler, IpcEvents::new(events_rx))
    }

    pub async fn send_raw(&self, data: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.sender.send_raw(data).await
    }

    pub async fn send_string(&self, text: &str) -> Result<()> {
        self.ensure_open()?;
        self.sender.send_string(text).await
    }

    /// Send a typed object. The receiver must have `T` registered.
    pub async fn send_object<T: RemoteType>(&self, value: &T) -> Result<()> {
        self.ensure_open()?;
        self.sender.send_object(value).await
    }

    /// Make a service callable by the peer. Fails if its interface is taken.
    pub fn register_service(&self, service: Service) -> Result<()> {
        self.ensure_open()?;
        self.dispatcher.register(service)?;
        Ok(())
    }

    pub fn unregister_service(&self, interface: &TypeIdentifier) -> bool {
        self.dispatcher.registry().unregister(interface)
    }

    /// Accept inbound objects of type `T`.
    pub fn register_type<T: RemoteType>(&self) -> &Self {
        self.types.write().register::<T>();
        self
    }

    /// Call a method on the peer and wait for its return value.
    pub async fn execute_remote<R: DeserializeOwned + 'static>(
        &self,
        request: CallRequest,
    ) -> Result<R> {
        let payload = self.execute(request).await?;
        Ok(self.converter.deserialize_return(&payload)?)
    }

    /// Call a method that returns nothing. Any payload that comes back is ignored.
    pub async fn execute_remote_void(&self, request: CallRequest) -> Result<()> {
        self.execute(request).await.map(drop)
    }

    async fn execute(&self, request: CallRequest) -> Result<Bytes> {
        self.ensure_open()?;
        let call = request.into_remote_call(self.converter.as_ref())?;
        match self.correlator.execute(self.sender.as_ref(), call).await {
            Ok(payload) => Ok(payload),
            Err(RpcError::Disposed) => Err(PeerError::Disposed),
            Err(err) => Err(err.into()),
        }
    }

    pub fn is_connected(&self) -> bool {
        !self.is_disposed() && self.sender.is_connected()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Outgoing calls still waiting for an answer.
    pub fn pending_calls(&self) -> usize {
        self.correlator.pending_count()
    }

    /// Fail all pending calls, stop receiving and close the connection.
    /// Calling it again does nothing.
    pub async fn dispose(&self) -> Result<()> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let failed = self.correlator.dispose();
        self.receive_task.abort();
        info!(failed, "ipc handler disposed");
        match self.sender.close().await {
            Ok(()) => Ok(()),
            Err(PeerError::Transport(err)) => {
                debug!(error = %err, "close after disconnect");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(PeerError::Disposed);
        }
        Ok(())
    }
}

impl Drop for IpcHandler {
    fn drop(&mut self) {
        self.correlator.dispose();
        self.receive_task.abort();
    }
}

impl std::fmt::Debug for IpcHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcHandler")
            .field("connected", &self.is_connected())
            .field("pending_calls", &self.pending_calls())
            .field("services", &self.dispatcher.registry().len())
            .finish()
    }
}
