use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::envelope::{RemoteCall, RemoteMessage};
use crate::error::{BoxError, Result, RpcError};

/// Default deadline for a remote call.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Caller-side settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelatorConfig {
    /// How long a call waits for its Result or Error. Default: 10 s.
    pub remote_timeout: Duration,
}

impl CorrelatorConfig {
    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }
}

/// Where encoded Call envelopes go.
#[async_trait]
pub trait EnvelopeSink: Send + Sync {
    async fn send_envelope(&self, envelope: Bytes) -> std::result::Result<(), BoxError>;
}

enum CallOutcome {
    Completed(Bytes),
    Failed(String),
    Disposed,
}

impl CallOutcome {
    fn into_result(self) -> Result<Bytes> {
        match self {
            Self::Completed(payload) => Ok(payload),
            Self::Failed(message) => Err(RpcError::Remote { message }),
            Self::Disposed => Err(RpcError::Disposed),
        }
    }
}

struct PendingCall {
    completion: oneshot::Sender<CallOutcome>,
    deadline: Instant,
    method: String,
}

#[derive(Default)]
struct State {
    pending: HashMap<Uuid, PendingCall>,
    disposed: bool,
}

/// Caller side of RPC: tracks outstanding calls by correlation id.
///
/// Every issued call ends exactly once: with its Result, its Error, its own timeout,
/// or disposal. Results for ids that are no longer pending are discarded.
pub struct Correlator {
    state: Mutex<State>,
    config: CorrelatorConfig,
}

impl Correlator {
    pub fn new(config: CorrelatorConfig) -> Self {
        Self {
            state: Mutex::new(State::default()),
            config,
        }
    }

    pub fn config(&self) -> &CorrelatorConfig {
        &self.config
    }

    /// Issue `call` through `sink` and wait for its outcome.
    ///
    /// The call is registered before it is sent, so an answer cannot overtake its own
    /// registration. `call.id` is replaced with a fresh correlation id.
    ///
    /// The deadline starts at registration and bounds the send as well as the wait,
    /// so a peer that stops reading cannot hold the call past its timeout.
    pub async fn execute(&self, sink: &dyn EnvelopeSink, mut call: RemoteCall) -> Result<Bytes> {
        let (id, deadline, completion) = self.register(&call.method)?;
        let _guard = PendingGuard { correlator: self, id };

        call.id = id;
        let method = call.method.clone();
        let envelope = RemoteMessage::Call(call).encode()?;
        debug!(%id, method = %method, size = envelope.len(), "sending call");
        match tokio::time::timeout_at(deadline, sink.send_envelope(envelope)).await {
            Ok(sent) => sent.map_err(RpcError::Send)?,
            Err(_) => {
                let timeout = self.config.remote_timeout;
                warn!(%id, method = %method, ?timeout, "remote call timed out while sending");
                return Err(RpcError::Timeout(timeout));
            }
        }

        self.wait(id, deadline, completion).await
    }

    /// Deliver a Result or Error envelope to its caller.
    ///
    /// Returns `false` when no call with that id is pending (already timed out,
    /// already answered, or never issued here).
    pub fn resolve(&self, message: RemoteMessage) -> bool {
        let (id, outcome) = match message {
            RemoteMessage::Result { id, payload } => (id, CallOutcome::Completed(payload)),
            RemoteMessage::Error { id, message } => (id, CallOutcome::Failed(message)),
            RemoteMessage::Call(call) => {
                warn!(id = %call.id, "call envelope handed to correlator; ignoring");
                return false;
            }
        };

        let mut state = self.state.lock();
        match state.pending.remove(&id) {
            Some(pending) => {
                debug!(%id, method = %pending.method, "call resolved");
                // The caller may have been dropped; nothing left to notify then.
                let _ = pending.completion.send(outcome);
                true
            }
            None => {
                debug!(%id, "discarding answer for unknown or finished call");
                false
            }
        }
    }

    /// Fail every pending call with [`RpcError::Disposed`] and refuse new ones.
    ///
    /// Returns how many calls were failed. Calling it again is a no-op.
    pub fn dispose(&self) -> usize {
        let drained: Vec<(Uuid, PendingCall)> = {
            let mut state = self.state.lock();
            if state.disposed {
                return 0;
            }
            state.disposed = true;
            state.pending.drain().collect()
        };

        let now = Instant::now();
        let count = drained.len();
        for (id, pending) in drained {
            debug!(
                %id,
                method = %pending.method,
                overdue = pending.deadline <= now,
                "failing pending call on dispose"
            );
            let _ = pending.completion.send(CallOutcome::Disposed);
        }
        info!(failed = count, "correlator disposed");
        count
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// Number of calls still waiting for an answer.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    fn register(&self, method: &str) -> Result<(Uuid, Instant, oneshot::Receiver<CallOutcome>)> {
        let (completion, receiver) = oneshot::channel();
        let mut state = self.state.lock();
        if state.disposed {
            return Err(RpcError::Disposed);
        }

        let mut id = Uuid::new_v4();
        while state.pending.contains_key(&id) {
            id = Uuid::new_v4();
        }
        let deadline = Instant::now() + self.config.remote_timeout;
        state.pending.insert(
            id,
            PendingCall {
                completion,
                deadline,
                method: method.to_string(),
            },
        );
        Ok((id, deadline, receiver))
    }

    async fn wait(
        &self,
        id: Uuid,
        deadline: Instant,
        mut completion: oneshot::Receiver<CallOutcome>,
    ) -> Result<Bytes> {
        let timeout = self.config.remote_timeout;
        match tokio::time::timeout_at(deadline, &mut completion).await {
            Ok(Ok(outcome)) => outcome.into_result(),
            Ok(Err(_)) => Err(RpcError::Disposed),
            Err(_) => {
                let removed = self.state.lock().pending.remove(&id).is_some();
                if removed {
                    warn!(%id, ?timeout, "remote call timed out");
                    return Err(RpcError::Timeout(timeout));
                }
                // Answered between the deadline and taking the lock; the outcome was
                // sent while the entry was removed, so it is already in the channel.
                match completion.try_recv() {
                    Ok(outcome) => outcome.into_result(),
                    Err(_) => Err(RpcError::Timeout(timeout)),
                }
            }
        }
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new(CorrelatorConfig::default())
    }
}

/// Removes the pending entry if the caller stops waiting early (send failure or the
/// caller's future being dropped).
struct PendingGuard<'a> {
    correlator: &'a Correlator,
    id: Uuid,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.correlator.state.lock().pending.remove(&self.id);
    }
}
