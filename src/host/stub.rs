//! Scripted in-memory execution host.
//!
//! The stub runs a small guest task on the far side of the transport that
//! answers eval requests according to a [`GuestScript`]. Every host the
//! factory builds is recorded so callers can inspect documents, evaluation
//! requests, commands and teardown counts.

use crate::error::PreviewError;
use crate::host::{ExecutionHost, HostFactory, HostLifecycle, HostSpec};
use crate::protocol::{EnvelopeKind, EvalFailure, MessageEnvelope, RuntimeEvent};
use crate::transport::{Transport, TransportSender};
use crate::types::HostId;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// How the guest answers an eval request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GuestReply {
    /// Respond `eval-response-ok`
    #[default]
    Ok,
    /// Respond `eval-response-error` with this message
    Error(String),
    /// Never respond
    Silent,
}

/// Scripted guest behavior shared by every host a factory creates.
#[derive(Debug, Clone, PartialEq)]
pub struct GuestScript {
    /// Events emitted while handling each eval request, before the reply
    pub on_eval: Vec<RuntimeEvent>,
    /// The reply sent for each eval request
    pub reply: GuestReply,
    /// Whether the load signal fires as soon as the host is created
    pub auto_load: bool,
}

impl Default for GuestScript {
    fn default() -> Self {
        Self {
            on_eval: Vec::new(),
            reply: GuestReply::Ok,
            auto_load: true,
        }
    }
}

impl GuestScript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn replying(mut self, reply: GuestReply) -> Self {
        self.reply = reply;
        self
    }

    #[must_use]
    pub fn emitting(mut self, event: RuntimeEvent) -> Self {
        self.on_eval.push(event);
        self
    }

    /// Holds the load signal until [`StubHostFactory::fire_load`] is called.
    #[must_use]
    pub fn manual_load(mut self) -> Self {
        self.auto_load = false;
        self
    }
}

#[derive(Debug)]
struct HostRecord {
    id: HostId,
    document: String,
    destroy_calls: u32,
    evaluations: Vec<Vec<String>>,
    commands: Vec<String>,
    guest: TransportSender,
    load: Option<oneshot::Sender<()>>,
}

#[derive(Debug, Default)]
struct StubLog {
    hosts: Vec<HostRecord>,
}

impl StubLog {
    fn host_mut(&mut self, id: &HostId) -> Option<&mut HostRecord> {
        self.hosts.iter_mut().find(|record| &record.id == id)
    }

    fn host(&self, id: &HostId) -> Option<&HostRecord> {
        self.hosts.iter().find(|record| &record.id == id)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Factory for [`StubHost`]s.
///
/// Clones share the same script and log.
#[derive(Debug, Clone, Default)]
pub struct StubHostFactory {
    script: Arc<Mutex<GuestScript>>,
    log: Arc<Mutex<StubLog>>,
    refuse: Arc<Mutex<Option<String>>>,
}

impl StubHostFactory {
    /// Creates a factory whose guests answer every evaluation with success.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a factory with the given guest script.
    #[must_use]
    pub fn with_script(script: GuestScript) -> Self {
        let factory = Self::new();
        factory.set_script(script);
        factory
    }

    /// Replaces the script; applies to requests handled from now on.
    pub fn set_script(&self, script: GuestScript) {
        *lock(&self.script) = script;
    }

    /// Makes subsequent `create` calls fail with this reason.
    pub fn refuse_creation(&self, reason: Option<String>) {
        *lock(&self.refuse) = reason;
    }

    /// Ids of every host created, oldest first.
    #[must_use]
    pub fn created(&self) -> Vec<HostId> {
        lock(&self.log).hosts.iter().map(|r| r.id.clone()).collect()
    }

    /// Bootstrap documents of every host created, oldest first.
    #[must_use]
    pub fn documents(&self) -> Vec<String> {
        lock(&self.log)
            .hosts
            .iter()
            .map(|r| r.document.clone())
            .collect()
    }

    /// How many times `destroy` was called on the host.
    #[must_use]
    pub fn destroy_calls(&self, id: &HostId) -> u32 {
        lock(&self.log).host(id).map_or(0, |r| r.destroy_calls)
    }

    /// Hosts created and not yet destroyed.
    #[must_use]
    pub fn live_hosts(&self) -> usize {
        lock(&self.log)
            .hosts
            .iter()
            .filter(|r| r.destroy_calls == 0)
            .count()
    }

    /// Fragment lists of every eval request the host received.
    #[must_use]
    pub fn evaluations(&self, id: &HostId) -> Vec<Vec<String>> {
        lock(&self.log)
            .host(id)
            .map(|r| r.evaluations.clone())
            .unwrap_or_default()
    }

    /// Total eval requests received across all hosts.
    #[must_use]
    pub fn evaluation_count(&self) -> usize {
        lock(&self.log)
            .hosts
            .iter()
            .map(|r| r.evaluations.len())
            .sum()
    }

    /// Command actions the host received.
    #[must_use]
    pub fn commands(&self, id: &HostId) -> Vec<String> {
        lock(&self.log)
            .host(id)
            .map(|r| r.commands.clone())
            .unwrap_or_default()
    }

    /// Fires a held load signal. Returns false if there was none.
    pub fn fire_load(&self, id: &HostId) -> bool {
        let sender = lock(&self.log).host_mut(id).and_then(|r| r.load.take());
        match sender {
            Some(sender) => sender.send(()).is_ok(),
            None => false,
        }
    }

    /// Drops a held load signal, as a guest that exits before loading would.
    pub fn abandon_load(&self, id: &HostId) -> bool {
        lock(&self.log)
            .host_mut(id)
            .and_then(|r| r.load.take())
            .is_some()
    }

    /// Emits an event from the newest live host's guest.
    pub fn emit(&self, event: &RuntimeEvent) -> bool {
        let log = lock(&self.log);
        log.hosts
            .iter()
            .rev()
            .find(|r| r.destroy_calls == 0)
            .is_some_and(|r| r.guest.send(&MessageEnvelope::event(event)).is_ok())
    }

    /// Sends a raw frame from the newest live host's guest.
    pub fn emit_frame(&self, frame: impl Into<String>) -> bool {
        let log = lock(&self.log);
        log.hosts
            .iter()
            .rev()
            .find(|r| r.destroy_calls == 0)
            .is_some_and(|r| r.guest.send_frame(frame.into()).is_ok())
    }
}

impl HostFactory for StubHostFactory {
    fn create(&self, spec: HostSpec) -> Result<Box<dyn ExecutionHost>, PreviewError> {
        if let Some(reason) = lock(&self.refuse).clone() {
            return Err(PreviewError::host_creation(reason));
        }

        let (host_side, guest_side) = Transport::pair();
        let (guest_sender, guest_receiver) = guest_side.split();
        let (load_tx, load_rx) = oneshot::channel();

        let auto_load = lock(&self.script).auto_load;
        let held_load = if auto_load {
            let _ = load_tx.send(());
            None
        } else {
            Some(load_tx)
        };

        lock(&self.log).hosts.push(HostRecord {
            id: spec.host_id.clone(),
            document: spec.document.clone(),
            destroy_calls: 0,
            evaluations: Vec::new(),
            commands: Vec::new(),
            guest: guest_sender.clone(),
            load: held_load,
        });

        let guest = tokio::spawn(run_guest(
            spec.host_id.clone(),
            guest_sender,
            guest_receiver,
            Arc::clone(&self.script),
            Arc::clone(&self.log),
        ));

        tracing::debug!(host_id = %spec.host_id, auto_load, "Stub host created");

        Ok(Box::new(StubHost {
            id: spec.host_id,
            document: spec.document,
            lifecycle: HostLifecycle::Constructing,
            transport: Some(host_side),
            load: Some(load_rx),
            guest: Some(guest),
            log: Arc::clone(&self.log),
        }))
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

async fn run_guest(
    id: HostId,
    sender: TransportSender,
    mut receiver: crate::transport::TransportReceiver,
    script: Arc<Mutex<GuestScript>>,
    log: Arc<Mutex<StubLog>>,
) {
    while let Some(frame) = receiver.recv_frame().await {
        let Ok(envelope) = MessageEnvelope::from_frame(&frame) else {
            continue;
        };

        match envelope.kind {
            EnvelopeKind::EvalRequest => {
                if let Some(record) = lock(&log).host_mut(&id) {
                    record.evaluations.push(envelope.script_fragments());
                }

                let current = lock(&script).clone();
                for event in &current.on_eval {
                    let _ = sender.send(&MessageEnvelope::event(event));
                }

                let Some(request_id) = envelope.id else {
                    continue;
                };
                let reply = match current.reply {
                    GuestReply::Ok => MessageEnvelope::eval_ok(request_id),
                    GuestReply::Error(message) => MessageEnvelope::eval_error(
                        request_id,
                        &EvalFailure {
                            message,
                            stack: None,
                        },
                    ),
                    GuestReply::Silent => continue,
                };
                let _ = sender.send(&reply);
            }
            EnvelopeKind::Command => {
                if let (Some(action), Some(record)) = (envelope.action(), lock(&log).host_mut(&id))
                {
                    record.commands.push(action.to_string());
                }
            }
            _ => {}
        }
    }
}

/// An in-memory host driven by a scripted guest task.
#[derive(Debug)]
pub struct StubHost {
    id: HostId,
    document: String,
    lifecycle: HostLifecycle,
    transport: Option<Transport>,
    load: Option<oneshot::Receiver<()>>,
    guest: Option<JoinHandle<()>>,
    log: Arc<Mutex<StubLog>>,
}

impl ExecutionHost for StubHost {
    fn id(&self) -> &HostId {
        &self.id
    }

    fn lifecycle(&self) -> HostLifecycle {
        self.lifecycle
    }

    fn document(&self) -> &str {
        &self.document
    }

    fn take_transport(&mut self) -> Option<Transport> {
        self.transport.take()
    }

    fn take_load_signal(&mut self) -> Option<oneshot::Receiver<()>> {
        self.load.take()
    }

    fn mark_ready(&mut self) {
        if self.lifecycle == HostLifecycle::Constructing {
            self.lifecycle = HostLifecycle::Ready;
        }
    }

    fn destroy(&mut self) {
        if let Some(record) = lock(&self.log).host_mut(&self.id) {
            record.destroy_calls += 1;
        }
        if self.lifecycle == HostLifecycle::Destroyed {
            return;
        }
        self.lifecycle = HostLifecycle::Destroyed;
        self.transport = None;
        self.load = None;
        if let Some(guest) = self.guest.take() {
            guest.abort();
        }
    }
}

impl Drop for StubHost {
    fn drop(&mut self) {
        if let Some(guest) = self.guest.take() {
            guest.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::SandboxPermissions;
    use crate::proxy::{NoopHandlers, PreviewProxy};

    fn spec() -> HostSpec {
        HostSpec {
            host_id: HostId::new(),
            document: "<html></html>".into(),
            permissions: SandboxPermissions::default(),
        }
    }

    #[tokio::test]
    async fn auto_load_fires_immediately() {
        let factory = StubHostFactory::new();
        let mut host = factory.create(spec()).unwrap();
        assert_eq!(host.lifecycle(), HostLifecycle::Constructing);

        host.take_load_signal().unwrap().await.unwrap();
        host.mark_ready();
        assert_eq!(host.lifecycle(), HostLifecycle::Ready);
        assert!(host.take_load_signal().is_none());
    }

    #[tokio::test]
    async fn manual_load_waits_for_fire() {
        let factory = StubHostFactory::with_script(GuestScript::new().manual_load());
        let mut host = factory.create(spec()).unwrap();
        let mut loaded = host.take_load_signal().unwrap();

        assert!(loaded.try_recv().is_err());
        assert!(factory.fire_load(host.id()));
        loaded.await.unwrap();
        assert!(!factory.fire_load(host.id()));
    }

    #[tokio::test]
    async fn abandoned_load_closes_the_signal() {
        let factory = StubHostFactory::with_script(GuestScript::new().manual_load());
        let mut host = factory.create(spec()).unwrap();
        let loaded = host.take_load_signal().unwrap();

        assert!(factory.abandon_load(host.id()));
        assert!(loaded.await.is_err());
        assert!(!factory.fire_load(host.id()));
    }

    #[tokio::test]
    async fn guest_answers_per_script() {
        let factory = StubHostFactory::with_script(
            GuestScript::new().replying(GuestReply::Error("nope".into())),
        );
        let mut host = factory.create(spec()).unwrap();
        let proxy = PreviewProxy::new(host.take_transport().unwrap(), Arc::new(NoopHandlers));

        let error = proxy.evaluate(vec!["x".into()]).await.unwrap_err();
        assert_eq!(error.user_message(), "nope");
        assert_eq!(factory.evaluations(host.id()), vec![vec!["x".to_string()]]);

        factory.set_script(GuestScript::new());
        assert!(proxy.evaluate(vec!["y".into()]).await.is_ok());
    }

    #[tokio::test]
    async fn destroy_is_recorded_and_idempotent() {
        let factory = StubHostFactory::new();
        let mut host = factory.create(spec()).unwrap();
        assert_eq!(factory.live_hosts(), 1);

        host.destroy();
        host.destroy();
        assert!(!host.is_alive());
        assert_eq!(factory.destroy_calls(host.id()), 2);
        assert_eq!(factory.live_hosts(), 0);
    }

    #[tokio::test]
    async fn refused_creation_is_host_creation_error() {
        let factory = StubHostFactory::new();
        factory.refuse_creation(Some("no display".into()));
        let error = factory.create(spec()).unwrap_err();
        assert!(error.to_string().contains("no display"));
        assert!(factory.created().is_empty());
    }
}
