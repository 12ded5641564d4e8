//! Preview controller actor implementation.

use crate::bridge;
use crate::collaborators::ModuleCompiler;
use crate::controller::diagnostics::Diagnostics;
use crate::controller::messages::{
    CycleFinished, DebounceElapsed, HostEventReceived, HostFailed, HostLoaded, ImportMapChanged,
    InitPreview, NavigationReceived, RuntimeVersionChanged, ShutdownPreview, SourcesChanged, StartPreview,
};
use crate::controller::state::{
    ControllerMetrics, ControllerPhase, ControllerStatus, Diagnostic, PreviewState,
};
use crate::controller::{ControllerConfig, ControllerDeps, PreviewChannels, PreviewHandle};
use crate::error::PreviewError;
use crate::host::{ExecutionHost, HostSpec};
use crate::import_map::{pinned_runtime_warning, ImportMap};
use crate::protocol::{ConsoleLog, NavigationRequest, RuntimeEvent};
use crate::proxy::{EventHandlers, PreviewProxy};
use crate::types::HostId;
use acton_reactive::prelude::*;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// The host the controller currently owns, with everything bound to its lifetime.
struct LiveHost {
    host: Box<dyn ExecutionHost>,
    proxy: Arc<PreviewProxy>,
    tasks: Vec<JoinHandle<()>>,
    cycle: Option<JoinHandle<()>>,
}

impl LiveHost {
    fn id(&self) -> &HostId {
        self.host.id()
    }
}

impl std::fmt::Debug for LiveHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveHost")
            .field("host", &self.host)
            .field("proxy", &self.proxy)
            .field("cycle_running", &self.cycle.is_some())
            .finish_non_exhaustive()
    }
}

/// Re-evaluation bookkeeping.
#[derive(Debug, Default)]
struct CycleState {
    seq: u64,
    in_flight: bool,
    debounce_token: u64,
}

impl CycleState {
    /// Forgets any running or scheduled cycle.
    fn stop(&mut self) {
        self.in_flight = false;
        self.debounce_token += 1;
    }
}

/// The preview controller actor state.
///
/// Owns at most one execution host. It is the only writer of the
/// [`PreviewState`] and the only caller of host construction and teardown.
#[acton_actor]
pub struct PreviewController {
    config: ControllerConfig,
    deps: Option<ControllerDeps>,
    channels: Option<PreviewChannels>,
    diagnostics: Option<Diagnostics>,
    phase: ControllerPhase,
    live: Option<LiveHost>,
    started: bool,
    last_import_map: Option<String>,
    cycle: CycleState,
    state: PreviewState,
    metrics: ControllerMetrics,
    last_navigation: Option<NavigationRequest>,
}

impl PreviewController {
    /// Spawns the controller and returns a handle to it.
    ///
    /// The controller is configured but idle; call
    /// [`PreviewHandle::start`] to build the first host.
    pub async fn spawn(
        runtime: &mut ActorRuntime,
        deps: ControllerDeps,
        config: ControllerConfig,
    ) -> PreviewHandle {
        let mut builder = runtime.new_actor_with_name::<PreviewController>("preview".to_string());

        builder
            .before_start(|_actor| {
                tracing::debug!("Preview controller initializing");
                Reply::ready()
            })
            .after_start(|_actor| {
                tracing::debug!("Preview controller started");
                Reply::ready()
            })
            .before_stop(|actor| {
                let model = &actor.model;
                if let Some(live) = &model.live {
                    live.proxy.destroy();
                    if let Some(deps) = &model.deps {
                        deps.surface.detach(live.id());
                    }
                }
                tracing::info!(
                    hosts_created = model.metrics.hosts_created,
                    cycles_started = model.metrics.cycles_started,
                    "Preview controller shutting down"
                );
                Reply::ready()
            });

        configure_handlers(&mut builder);

        let handle = builder.start().await;

        let (channels, state_rx, status_rx) = PreviewChannels::new();
        handle
            .send(InitPreview {
                deps,
                config,
                channels,
            })
            .await;

        PreviewHandle::new(handle, state_rx, status_rx)
    }

    fn publish_state(&self) {
        if let Some(channels) = &self.channels {
            channels.state.send_replace(self.state.clone());
        }
    }

    fn publish_status(&self) {
        if let Some(channels) = &self.channels {
            channels.status.send_replace(ControllerStatus {
                phase: self.phase,
                host_id: self.live.as_ref().map(|live| live.id().clone()),
                metrics: self.metrics.clone(),
                last_navigation: self.last_navigation.clone(),
            });
        }
    }

    fn is_current(&self, host_id: &HostId) -> bool {
        self.live.as_ref().is_some_and(|live| live.id() == host_id)
    }

    fn report_config_error(&self, message: String) {
        tracing::warn!(message = %message, "Import map rejected");
        if let Some(deps) = &self.deps {
            deps.store.report_errors(vec![message]);
        }
    }

    /// Destroys the proxy, stops re-evaluation, detaches and destroys the host.
    fn teardown(&mut self) {
        let Some(mut live) = self.live.take() else {
            return;
        };
        let host_id = live.id().clone();

        if live.proxy.destroy() {
            self.metrics.proxies_destroyed += 1;
        }

        self.cycle.stop();
        if let Some(cycle) = live.cycle.take() {
            cycle.abort();
        }
        for task in live.tasks.drain(..) {
            task.abort();
        }

        if let Some(deps) = &self.deps {
            deps.surface.detach(&host_id);
        }
        live.host.destroy();
        self.metrics.hosts_destroyed += 1;
        self.phase = ControllerPhase::NoHost;

        tracing::info!(host_id = %host_id, "Preview host torn down");
    }

    /// Replaces the current host with one built from `map`.
    fn rebuild(&mut self, map: ImportMap, handle: &ActorHandle) {
        let Some(deps) = self.deps.clone() else {
            tracing::warn!("Preview controller used before initialization");
            return;
        };

        let map = map.with_runtime(&self.config.runtime_key, &self.config.runtime_url);
        let document = deps.template.render(&map);

        self.teardown();

        let host_id = HostId::new();
        if !deps.hosts.is_available() {
            return self.construction_failed(
                &host_id,
                PreviewError::host_creation(format!(
                    "the {} host factory is not available on this system",
                    deps.hosts.name()
                )),
            );
        }
        self.phase = ControllerPhase::Constructing;

        let spec = HostSpec {
            host_id: host_id.clone(),
            document,
            permissions: self.config.permissions.clone(),
        };
        let mut host = match deps.hosts.create(spec) {
            Ok(host) => host,
            Err(e) => return self.construction_failed(&host_id, e),
        };

        if let Err(e) = deps.surface.attach(&host_id) {
            host.destroy();
            return self.construction_failed(&host_id, e);
        }

        let (Some(transport), Some(loaded)) = (host.take_transport(), host.take_load_signal())
        else {
            deps.surface.detach(&host_id);
            host.destroy();
            return self.construction_failed(
                &host_id,
                PreviewError::host_creation("host did not hand out its transport"),
            );
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let proxy = PreviewProxy::new(transport, Arc::new(ForwardingHandlers { events: events_tx }))
            .with_timeout(self.config.evaluation_timeout);

        let tasks = vec![
            tokio::spawn(forward_host_signals(
                host_id.clone(),
                events_rx,
                handle.clone(),
            )),
            tokio::spawn(wait_for_load(host_id.clone(), loaded, handle.clone())),
        ];

        self.live = Some(LiveHost {
            host,
            proxy: Arc::new(proxy),
            tasks,
            cycle: None,
        });
        self.metrics.hosts_created += 1;

        tracing::info!(
            host_id = %host_id,
            factory = deps.hosts.name(),
            runtime_url = %self.config.runtime_url,
            "Preview host constructing"
        );
        self.publish_status();
    }

    fn construction_failed(&mut self, host_id: &HostId, error: PreviewError) {
        tracing::error!(host_id = %host_id, error = %error, "Preview host construction failed");
        self.phase = ControllerPhase::NoHost;
        self.state.error = Some(error.to_string());
        self.publish_state();
        self.publish_status();
    }

    /// Rebuilds from whatever the store holds, tolerating a missing `imports`.
    fn rebuild_from_store(&mut self, handle: &ActorHandle) {
        let Some(deps) = self.deps.clone() else {
            tracing::warn!("Preview controller used before initialization");
            return;
        };
        let source = deps.store.import_map();
        match ImportMap::from_source(source.as_deref()) {
            Ok(map) => self.rebuild(map, handle),
            Err(e) => self.report_config_error(e.to_string()),
        }
    }

    fn request_cycle(&mut self, handle: &ActorHandle) {
        if self.phase != ControllerPhase::Ready {
            tracing::debug!(phase = ?self.phase, "Skipping evaluation until the host is ready");
            return;
        }
        if self.cycle.in_flight {
            // The running cycle evaluates stale sources and may never settle.
            if let Some(cycle) = self.live.as_mut().and_then(|live| live.cycle.take()) {
                cycle.abort();
            }
            self.cycle.in_flight = false;
            self.metrics.cycles_superseded += 1;
            tracing::debug!(seq = self.cycle.seq, "Evaluation cycle superseded");
        }
        self.start_cycle(handle);
    }

    fn start_cycle(&mut self, handle: &ActorHandle) {
        let Some(compiler) = self.deps.as_ref().map(|deps| Arc::clone(&deps.compiler)) else {
            return;
        };
        if self.live.is_none() {
            return;
        }

        self.cycle.seq += 1;
        self.cycle.in_flight = true;
        self.metrics.cycles_started += 1;
        self.state.reset();
        self.publish_state();

        let seq = self.cycle.seq;
        let runtime_key = self.config.runtime_key.clone();
        let entry_module = self.config.entry_module.clone();
        let handle = handle.clone();

        if let Some(live) = self.live.as_mut() {
            let host_id = live.id().clone();
            let proxy = Arc::clone(&live.proxy);
            tracing::debug!(host_id = %host_id, seq, "Evaluation cycle started");

            live.cycle = Some(tokio::spawn(async move {
                let outcome = run_cycle(compiler, proxy, &runtime_key, &entry_module).await;
                handle
                    .send(CycleFinished {
                        host_id,
                        seq,
                        outcome,
                    })
                    .await;
            }));
        }
    }
}

/// Compiles the current sources and evaluates them in one request.
async fn run_cycle(
    compiler: Arc<dyn ModuleCompiler>,
    proxy: Arc<PreviewProxy>,
    runtime_key: &str,
    entry_module: &str,
) -> Result<(), PreviewError> {
    let modules = tokio::task::spawn_blocking(move || compiler.compile_modules_for_preview())
        .await
        .map_err(|e| PreviewError::compilation(format!("module compiler did not finish: {e}")))??;

    tracing::debug!(modules = modules.len(), "Compiled modules for preview");

    proxy
        .evaluate(bridge::evaluation_script(modules, runtime_key, entry_module))
        .await
}

/// What the proxy's callbacks forward to the controller.
#[derive(Debug)]
enum HostSignal {
    Event(RuntimeEvent),
    Navigate(NavigationRequest),
}

/// Callback table that queues every event for the controller, in order.
struct ForwardingHandlers {
    events: mpsc::UnboundedSender<HostSignal>,
}

impl ForwardingHandlers {
    fn forward(&self, event: RuntimeEvent) {
        let _ = self.events.send(HostSignal::Event(event));
    }
}

impl EventHandlers for ForwardingHandlers {
    fn on_fetch_progress(&self, remaining: u64) {
        self.forward(RuntimeEvent::FetchProgress { remaining });
    }

    fn on_error(&self, value: &Value) {
        self.forward(RuntimeEvent::Error {
            value: value.clone(),
        });
    }

    fn on_unhandled_rejection(&self, value: &Value) {
        self.forward(RuntimeEvent::UnhandledRejection {
            value: value.clone(),
        });
    }

    fn on_console(&self, log: &ConsoleLog) {
        self.forward(RuntimeEvent::Console {
            level: log.level,
            args: log.args.clone(),
        });
    }

    fn on_console_group(&self, label: Option<&str>) {
        self.forward(RuntimeEvent::ConsoleGroup {
            label: label.map(str::to_string),
        });
    }

    fn on_console_group_collapsed(&self, label: Option<&str>) {
        self.forward(RuntimeEvent::ConsoleGroupCollapsed {
            label: label.map(str::to_string),
        });
    }

    fn on_console_group_end(&self) {
        self.forward(RuntimeEvent::ConsoleGroupEnd);
    }

    fn on_navigate(&self, request: &NavigationRequest) {
        let _ = self.events.send(HostSignal::Navigate(request.clone()));
    }
}

async fn forward_host_signals(
    host_id: HostId,
    mut signals: mpsc::UnboundedReceiver<HostSignal>,
    handle: ActorHandle,
) {
    while let Some(signal) = signals.recv().await {
        match signal {
            HostSignal::Event(event) => {
                handle
                    .send(HostEventReceived {
                        host_id: host_id.clone(),
                        event,
                    })
                    .await;
            }
            HostSignal::Navigate(request) => {
                handle
                    .send(NavigationReceived {
                        host_id: host_id.clone(),
                        request,
                    })
                    .await;
            }
        }
    }
}

async fn wait_for_load(host_id: HostId, loaded: oneshot::Receiver<()>, handle: ActorHandle) {
    match loaded.await {
        Ok(()) => handle.send(HostLoaded { host_id }).await,
        Err(_) => {
            tracing::warn!(host_id = %host_id, "Preview host dropped its load signal");
            handle.send(HostFailed { host_id }).await;
        }
    }
}

/// Configures message handlers for the preview controller.
fn configure_handlers(builder: &mut ManagedActor<Idle, PreviewController>) {
    builder.mutate_on::<InitPreview>(|actor, envelope| {
        let msg = envelope.message();
        let model = &mut actor.model;

        model.config = msg.config.clone();
        model.deps = Some(msg.deps.clone());
        model.channels = Some(msg.channels.clone());
        model.diagnostics = match Diagnostics::new(&model.config.warning_marker) {
            Ok(diagnostics) => Some(diagnostics),
            Err(e) => {
                tracing::error!(error = %e, "Runtime diagnostics disabled");
                None
            }
        };

        tracing::info!(
            runtime_url = %model.config.runtime_url,
            entry_module = %model.config.entry_module,
            factory = msg.deps.hosts.name(),
            "Preview controller configured"
        );
        model.publish_state();
        model.publish_status();
        Reply::ready()
    });

    builder.mutate_on::<StartPreview>(|actor, _envelope| {
        let handle = actor.handle().clone();
        let model = &mut actor.model;

        if model.started {
            tracing::warn!("Preview already started");
            return Reply::ready();
        }
        let Some(deps) = model.deps.clone() else {
            tracing::warn!("Preview controller used before initialization");
            return Reply::ready();
        };

        model.started = true;
        model.last_import_map = deps.store.import_map();
        model.rebuild_from_store(&handle);
        Reply::ready()
    });

    builder.mutate_on::<ImportMapChanged>(|actor, _envelope| {
        let handle = actor.handle().clone();
        let model = &mut actor.model;

        let Some(deps) = model.deps.clone() else {
            return Reply::ready();
        };
        let current = deps.store.import_map();
        let previous = std::mem::replace(&mut model.last_import_map, current.clone());
        if current == previous || !model.started {
            return Reply::ready();
        }

        match current {
            // Import map removed: rebuild with an empty one.
            None => model.rebuild(ImportMap::new(), &handle),
            Some(text) => match ImportMap::validate(&text) {
                Ok(map) => {
                    if map.pins(&model.config.runtime_key) {
                        model.report_config_error(pinned_runtime_warning(&model.config.runtime_key));
                    }
                    model.rebuild(map, &handle);
                }
                Err(e) => model.report_config_error(e.to_string()),
            },
        }
        Reply::ready()
    });

    builder.mutate_on::<RuntimeVersionChanged>(|actor, envelope| {
        let handle = actor.handle().clone();
        let runtime_url = envelope.message().runtime_url.clone();
        let model = &mut actor.model;

        if runtime_url == model.config.runtime_url {
            return Reply::ready();
        }
        tracing::info!(
            from = %model.config.runtime_url,
            to = %runtime_url,
            "Runtime version changed"
        );
        model.config.runtime_url = runtime_url;

        if model.started {
            model.rebuild_from_store(&handle);
        }
        Reply::ready()
    });

    builder.mutate_on::<SourcesChanged>(|actor, _envelope| {
        let handle = actor.handle().clone();
        let model = &mut actor.model;

        if model.phase != ControllerPhase::Ready {
            return Reply::ready();
        }

        match model.config.debounce {
            None => model.request_cycle(&handle),
            Some(delay) => {
                model.cycle.debounce_token += 1;
                let token = model.cycle.debounce_token;
                if let Some(live) = &model.live {
                    let host_id = live.id().clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        handle.send(DebounceElapsed { host_id, token }).await;
                    });
                }
            }
        }
        Reply::ready()
    });

    builder.mutate_on::<DebounceElapsed>(|actor, envelope| {
        let handle = actor.handle().clone();
        let msg = envelope.message();
        let model = &mut actor.model;

        if msg.token == model.cycle.debounce_token && model.is_current(&msg.host_id) {
            model.request_cycle(&handle);
        }
        Reply::ready()
    });

    builder.mutate_on::<HostLoaded>(|actor, envelope| {
        let handle = actor.handle().clone();
        let host_id = envelope.message().host_id.clone();
        let model = &mut actor.model;

        if !model.is_current(&host_id) || model.phase != ControllerPhase::Constructing {
            tracing::debug!(host_id = %host_id, "Ignoring load signal from stale host");
            return Reply::ready();
        }

        if let Some(live) = model.live.as_mut() {
            live.host.mark_ready();
            if let Err(e) = live.proxy.handle_links() {
                tracing::warn!(host_id = %host_id, error = %e, "Failed to enable link handling");
            }
        }
        model.phase = ControllerPhase::Ready;
        tracing::info!(host_id = %host_id, "Preview host ready");

        model.request_cycle(&handle);
        model.publish_status();
        Reply::ready()
    });

    builder.mutate_on::<HostFailed>(|actor, envelope| {
        let host_id = envelope.message().host_id.clone();
        let model = &mut actor.model;

        if !model.is_current(&host_id) || model.phase != ControllerPhase::Constructing {
            tracing::debug!(host_id = %host_id, "Ignoring failure of stale host");
            return Reply::ready();
        }

        model.teardown();
        model.construction_failed(
            &host_id,
            PreviewError::host_creation("preview host exited before loading"),
        );
        Reply::ready()
    });

    builder.mutate_on::<CycleFinished>(|actor, envelope| {
        let msg = envelope.message();
        let model = &mut actor.model;

        if !model.is_current(&msg.host_id) || msg.seq != model.cycle.seq || !model.cycle.in_flight
        {
            tracing::debug!(host_id = %msg.host_id, seq = msg.seq, "Ignoring stale cycle result");
            return Reply::ready();
        }

        if let Some(live) = model.live.as_mut() {
            live.cycle = None;
        }
        model.cycle.in_flight = false;

        match &msg.outcome {
            Ok(()) => {
                model.metrics.cycles_completed += 1;
                tracing::debug!(seq = msg.seq, "Evaluation cycle completed");
            }
            Err(e) => {
                model.metrics.cycles_failed += 1;
                tracing::debug!(seq = msg.seq, error = %e, "Evaluation cycle failed");
                let message = match &model.diagnostics {
                    Some(diagnostics) => {
                        diagnostics.runtime_error(&Value::String(e.user_message()))
                    }
                    None => e.user_message(),
                };
                if model.state.record(Diagnostic::Error(message)) {
                    model.publish_state();
                }
            }
        }
        model.publish_status();
        Reply::ready()
    });

    builder.mutate_on::<HostEventReceived>(|actor, envelope| {
        let msg = envelope.message();
        let model = &mut actor.model;

        if !model.is_current(&msg.host_id) {
            return Reply::ready();
        }
        model.metrics.events_received += 1;

        if let RuntimeEvent::Console { level, args } = &msg.event {
            tracing::debug!(level = ?level, args = args.len(), "Preview console");
        }

        let diagnostic = model
            .diagnostics
            .as_ref()
            .and_then(|diagnostics| diagnostics.diagnose(&msg.event));
        if let Some(diagnostic) = diagnostic {
            if model.state.record(diagnostic) {
                model.publish_state();
            }
        }
        model.publish_status();
        Reply::ready()
    });

    builder.mutate_on::<NavigationReceived>(|actor, envelope| {
        let msg = envelope.message();
        let model = &mut actor.model;

        if !model.is_current(&msg.host_id) {
            return Reply::ready();
        }
        tracing::info!(
            url = %msg.request.url,
            new_window = msg.request.new_window,
            "Preview requested navigation"
        );
        model.metrics.navigations += 1;
        model.last_navigation = Some(msg.request.clone());
        model.publish_status();
        Reply::ready()
    });

    builder.mutate_on::<ShutdownPreview>(|actor, _envelope| {
        let model = &mut actor.model;
        model.teardown();
        model.started = false;
        model.publish_status();
        Reply::ready()
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_stop_invalidates_debounce() {
        let mut cycle = CycleState {
            seq: 3,
            in_flight: true,
            debounce_token: 7,
        };
        cycle.stop();
        assert!(!cycle.in_flight);
        assert_eq!(cycle.debounce_token, 8);
        assert_eq!(cycle.seq, 3);
    }

    #[test]
    fn default_controller_has_no_host() {
        let controller = PreviewController::default();
        assert_eq!(controller.phase, ControllerPhase::NoHost);
        assert!(controller.live.is_none());
        assert!(!controller.started);
    }
}
