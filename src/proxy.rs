//! Remote evaluation proxy.
//!
//! [`PreviewProxy`] owns the host side of a [`Transport`]. It turns
//! "evaluate these fragments" into a future settled by the correlated
//! response, and routes unsolicited frames from the isolated side to an
//! [`EventHandlers`] table.
//!
//! # Settlement
//!
//! - a matching `eval-response-ok` resolves the future with `Ok(())`
//! - a matching `eval-response-error` resolves it with an evaluation error
//! - [`PreviewProxy::destroy`] abandons every pending future: they never
//!   resolve, unless an evaluation timeout was configured

use crate::error::PreviewError;
use crate::protocol::{
    ConsoleLog, EnvelopeKind, EvalFailure, MessageEnvelope, NavigationRequest, RuntimeEvent,
    CATCH_CLICKS,
};
use crate::transport::{Transport, TransportReceiver, TransportSender};
use crate::types::CorrelationId;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Callbacks invoked for unsolicited frames from the isolated side.
///
/// Every method defaults to a no-op so implementors only override the
/// events they care about. Callbacks run on the proxy's dispatch task, in
/// the order the frames arrived.
pub trait EventHandlers: Send + Sync {
    /// Number of module fetches still outstanding.
    fn on_fetch_progress(&self, _remaining: u64) {}

    /// An uncaught error; the value is a string or `{message, stack}`.
    fn on_error(&self, _value: &Value) {}

    /// An unhandled promise rejection.
    fn on_unhandled_rejection(&self, _value: &Value) {}

    /// A `console.*` call with its level and arguments.
    fn on_console(&self, _log: &ConsoleLog) {}

    /// `console.group` opened, with its optional label.
    fn on_console_group(&self, _label: Option<&str>) {}

    /// `console.groupCollapsed` opened, with its optional label.
    fn on_console_group_collapsed(&self, _label: Option<&str>) {}

    /// The innermost console group closed.
    fn on_console_group_end(&self) {}

    /// A link click the guest redirected to the host after `handle_links`.
    fn on_navigate(&self, _request: &NavigationRequest) {}
}

/// Handlers that ignore every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHandlers;

impl EventHandlers for NoopHandlers {}

type Settle = oneshot::Sender<Result<(), PreviewError>>;

#[derive(Default)]
struct ProxyState {
    pending: HashMap<CorrelationId, Settle>,
    destroyed: bool,
}

/// Forgets a pending evaluation when its future is dropped unsettled.
struct PendingEntry {
    state: Arc<Mutex<ProxyState>>,
    id: CorrelationId,
}

impl Drop for PendingEntry {
    fn drop(&mut self) {
        lock(&self.state).pending.remove(&self.id);
    }
}

/// Host-side endpoint for evaluating code inside an isolated host.
pub struct PreviewProxy {
    sender: TransportSender,
    state: Arc<Mutex<ProxyState>>,
    dispatch: Mutex<Option<JoinHandle<()>>>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for PreviewProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("PreviewProxy")
            .field("pending", &state.pending.len())
            .field("destroyed", &state.destroyed)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PreviewProxy {
    /// Wraps a transport endpoint and starts dispatching inbound frames.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(transport: Transport, handlers: Arc<dyn EventHandlers>) -> Self {
        let (sender, receiver) = transport.split();
        let state = Arc::new(Mutex::new(ProxyState::default()));
        let dispatch = tokio::spawn(dispatch_frames(receiver, Arc::clone(&state), handlers));

        Self {
            sender,
            state,
            dispatch: Mutex::new(Some(dispatch)),
            timeout: None,
        }
    }

    /// Fails pending evaluations after `timeout` instead of leaving them pending.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sends the fragments as one eval request and waits for its response.
    ///
    /// Fragment order is preserved exactly. Each call uses a fresh
    /// correlation id.
    ///
    /// Calling this after [`destroy`](Self::destroy) resolves immediately
    /// with a proxy-destroyed error.
    pub fn evaluate(&self, fragments: Vec<String>) -> BoxFuture<'static, Result<(), PreviewError>> {
        let id = CorrelationId::new();
        let (settle, settled) = oneshot::channel();

        {
            let mut state = lock(&self.state);
            if state.destroyed {
                return futures::future::ready(Err(PreviewError::proxy_destroyed())).boxed();
            }
            state.pending.insert(id.clone(), settle);
        }

        let request = MessageEnvelope::eval_request(id.clone(), &fragments);
        if let Err(e) = self.sender.send(&request) {
            lock(&self.state).pending.remove(&id);
            return futures::future::ready(Err(e)).boxed();
        }

        tracing::debug!(
            correlation_id = %id,
            fragments = fragments.len(),
            "Eval request sent"
        );

        let entry = PendingEntry {
            state: Arc::clone(&self.state),
            id,
        };
        let timeout = self.timeout;
        async move {
            let outcome = async {
                match settled.await {
                    Ok(result) => result,
                    // Abandoned by destroy: never settles.
                    Err(_) => std::future::pending().await,
                }
            };

            let result = match timeout {
                None => outcome.await,
                Some(after) => match tokio::time::timeout(after, outcome).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!(
                            correlation_id = %entry.id,
                            ?after,
                            "Evaluation timed out"
                        );
                        Err(PreviewError::evaluation_timed_out(after))
                    }
                },
            };
            drop(entry);
            result
        }
        .boxed()
    }

    /// Asks the isolated side to route link clicks back to the host.
    ///
    /// # Errors
    ///
    /// Fails if the proxy is destroyed or the transport is closed.
    pub fn handle_links(&self) -> Result<(), PreviewError> {
        if lock(&self.state).destroyed {
            return Err(PreviewError::proxy_destroyed());
        }
        self.sender.send(&MessageEnvelope::command(CATCH_CLICKS))
    }

    /// Detaches all listeners and abandons pending evaluations.
    ///
    /// Returns true the first time; later calls are no-ops returning false.
    pub fn destroy(&self) -> bool {
        let abandoned = {
            let mut state = lock(&self.state);
            if state.destroyed {
                return false;
            }
            state.destroyed = true;
            std::mem::take(&mut state.pending).len()
        };

        if let Some(dispatch) = lock(&self.dispatch).take() {
            dispatch.abort();
        }

        tracing::debug!(abandoned, "Preview proxy destroyed");
        true
    }

    /// Returns true once [`destroy`](Self::destroy) has run.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        lock(&self.state).destroyed
    }

    /// Number of evaluations awaiting a response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock(&self.state).pending.len()
    }
}

impl Drop for PreviewProxy {
    fn drop(&mut self) {
        if let Some(dispatch) = lock(&self.dispatch).take() {
            dispatch.abort();
        }
    }
}

async fn dispatch_frames(
    mut receiver: TransportReceiver,
    state: Arc<Mutex<ProxyState>>,
    handlers: Arc<dyn EventHandlers>,
) {
    while let Some(frame) = receiver.recv_frame().await {
        let envelope = match MessageEnvelope::from_frame(&frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed frame from preview host");
                continue;
            }
        };

        if lock(&state).destroyed {
            break;
        }

        match envelope.kind {
            EnvelopeKind::EvalResponseOk => settle(&state, envelope.id, Ok(())),
            EnvelopeKind::EvalResponseError => {
                let failure = EvalFailure::deserialize_lossy(&envelope.payload);
                settle(&state, envelope.id, Err(failure.into()));
            }
            EnvelopeKind::Event => match envelope.runtime_event() {
                Ok(event) => dispatch_event(handlers.as_ref(), event),
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping unrecognized runtime event");
                }
            },
            EnvelopeKind::Navigate => {
                match serde_json::from_value::<NavigationRequest>(envelope.payload) {
                    Ok(request) => handlers.on_navigate(&request),
                    Err(e) => tracing::warn!(error = %e, "Dropping malformed navigate frame"),
                }
            }
            EnvelopeKind::EvalRequest | EnvelopeKind::Command | EnvelopeKind::Load => {
                tracing::debug!(kind = ?envelope.kind, "Ignoring frame not addressed to the proxy");
            }
        }
    }

    tracing::debug!("Preview transport closed");
}

fn settle(
    state: &Mutex<ProxyState>,
    id: Option<CorrelationId>,
    result: Result<(), PreviewError>,
) {
    let Some(id) = id else {
        tracing::warn!("Dropping eval response without a correlation id");
        return;
    };

    match lock(state).pending.remove(&id) {
        Some(settle) => {
            let _ = settle.send(result);
        }
        None => {
            tracing::debug!(correlation_id = %id, "Dropping response for unknown evaluation");
        }
    }
}

/// Routes one event to its callback.
pub(crate) fn dispatch_event(handlers: &dyn EventHandlers, event: RuntimeEvent) {
    match event {
        RuntimeEvent::FetchProgress { remaining } => handlers.on_fetch_progress(remaining),
        RuntimeEvent::Error { value } => handlers.on_error(&value),
        RuntimeEvent::UnhandledRejection { value } => handlers.on_unhandled_rejection(&value),
        RuntimeEvent::Console { level, args } => {
            handlers.on_console(&ConsoleLog { level, args });
        }
        RuntimeEvent::ConsoleGroup { label } => handlers.on_console_group(label.as_deref()),
        RuntimeEvent::ConsoleGroupCollapsed { label } => {
            handlers.on_console_group_collapsed(label.as_deref());
        }
        RuntimeEvent::ConsoleGroupEnd => handlers.on_console_group_end(),
    }
}

impl EvalFailure {
    /// Reads an error payload, tolerating a bare string or missing fields.
    #[must_use]
    pub fn deserialize_lossy(payload: &Value) -> Self {
        match serde_json::from_value::<EvalFailure>(payload.clone()) {
            Ok(failure) => failure,
            Err(_) => Self {
                message: crate::protocol::error_message(payload),
                stack: None,
            },
        }
    }
}
