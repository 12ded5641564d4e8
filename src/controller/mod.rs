//! Reactive preview controller.
//!
//! The controller is an actor that owns the current execution host. It moves
//! between three phases:
//!
//! ```text
//!   NoHost ──start / import map / runtime change──▶ Constructing
//!   Constructing ──host load signal──▶ Ready
//!   Ready ──import map / runtime change──▶ Constructing (old host torn down first)
//! ```
//!
//! While Ready, every [`SourcesChanged`] runs an evaluation cycle: the
//! preview state is cleared, the compiler produces the modules, and one eval
//! request carries the registry reset, the modules and the mount trailer.
//! A change arriving while a cycle is in flight supersedes it, so an
//! evaluation that never settles cannot stall later edits. A host that
//! exits before loading drops back to `NoHost` with the error recorded.
//!
//! # Usage
//!
//! ```rust,ignore
//! use acton_preview::prelude::*;
//!
//! let mut runtime = ActonApp::launch_async().await;
//! let preview = PreviewController::spawn(&mut runtime, deps, ControllerConfig::default()).await;
//! preview.start().await;
//!
//! // after an edit
//! preview.sources_changed().await;
//! let state = preview.state();
//! ```

mod actor;
mod diagnostics;
mod messages;
mod state;

pub use actor::PreviewController;
pub use diagnostics::{unhandled_rejection, Diagnostics};
pub use messages::{
    ImportMapChanged, InitPreview, RuntimeVersionChanged, ShutdownPreview, SourcesChanged,
    StartPreview,
};
pub use state::{ControllerMetrics, ControllerPhase, ControllerStatus, Diagnostic, PreviewState};

use crate::collaborators::{ConfigStore, ModuleCompiler};
use crate::host::{HostFactory, MountSurface, SandboxPermissions};
use crate::import_map::{BootstrapTemplate, DEFAULT_RUNTIME_KEY};
use acton_reactive::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Default runtime URL pinned under the runtime key.
pub const DEFAULT_RUNTIME_URL: &str = "https://unpkg.com/vue@3/dist/vue.esm-browser.js";

/// Default module mounted by the trailer.
pub const DEFAULT_ENTRY_MODULE: &str = "App.vue";

/// Default marker identifying framework warnings on `console.warn`.
pub const DEFAULT_WARNING_MARKER: &str = "[Vue warn]";

/// Controller behavior settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// URL the runtime key resolves to
    pub runtime_url: String,
    /// Reserved import-map key pinning the runtime
    pub runtime_key: String,
    /// Registry name of the module whose default export is mounted
    pub entry_module: String,
    /// First-argument marker for framework warnings
    pub warning_marker: String,
    /// Capabilities granted to each host
    pub permissions: SandboxPermissions,
    /// Fail evaluations that do not settle in time; `None` waits forever
    pub evaluation_timeout: Option<Duration>,
    /// Delay before a source change starts a cycle
    pub debounce: Option<Duration>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            runtime_url: DEFAULT_RUNTIME_URL.to_string(),
            runtime_key: DEFAULT_RUNTIME_KEY.to_string(),
            entry_module: DEFAULT_ENTRY_MODULE.to_string(),
            warning_marker: DEFAULT_WARNING_MARKER.to_string(),
            permissions: SandboxPermissions::default(),
            evaluation_timeout: None,
            debounce: None,
        }
    }
}

impl ControllerConfig {
    #[must_use]
    pub fn with_runtime_url(mut self, url: impl Into<String>) -> Self {
        self.runtime_url = url.into();
        self
    }

    #[must_use]
    pub fn with_entry_module(mut self, entry: impl Into<String>) -> Self {
        self.entry_module = entry.into();
        self
    }

    #[must_use]
    pub fn with_evaluation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.evaluation_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_debounce(mut self, debounce: Option<Duration>) -> Self {
        self.debounce = debounce;
        self
    }
}

/// The collaborators the controller drives.
#[derive(Debug, Clone)]
pub struct ControllerDeps {
    pub hosts: Arc<dyn HostFactory>,
    pub surface: Arc<dyn MountSurface>,
    pub compiler: Arc<dyn ModuleCompiler>,
    pub store: Arc<dyn ConfigStore>,
    pub template: BootstrapTemplate,
}

/// Publishing side of the controller's watch channels.
#[derive(Debug, Clone)]
pub struct PreviewChannels {
    pub state: Arc<watch::Sender<PreviewState>>,
    pub status: Arc<watch::Sender<ControllerStatus>>,
}

impl PreviewChannels {
    /// Creates the channels and their first receivers.
    #[must_use]
    pub fn new() -> (
        Self,
        watch::Receiver<PreviewState>,
        watch::Receiver<ControllerStatus>,
    ) {
        let (state, state_rx) = watch::channel(PreviewState::default());
        let (status, status_rx) = watch::channel(ControllerStatus::default());
        (
            Self {
                state: Arc::new(state),
                status: Arc::new(status),
            },
            state_rx,
            status_rx,
        )
    }
}

/// Handle to a running preview controller.
#[derive(Debug, Clone)]
pub struct PreviewHandle {
    actor: ActorHandle,
    state: watch::Receiver<PreviewState>,
    status: watch::Receiver<ControllerStatus>,
}

impl PreviewHandle {
    pub(crate) fn new(
        actor: ActorHandle,
        state: watch::Receiver<PreviewState>,
        status: watch::Receiver<ControllerStatus>,
    ) -> Self {
        Self {
            actor,
            state,
            status,
        }
    }

    /// The underlying actor handle.
    #[must_use]
    pub fn actor(&self) -> &ActorHandle {
        &self.actor
    }

    /// Current error and warning.
    #[must_use]
    pub fn state(&self) -> PreviewState {
        self.state.borrow().clone()
    }

    /// Current phase, host and counters.
    #[must_use]
    pub fn status(&self) -> ControllerStatus {
        self.status.borrow().clone()
    }

    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<PreviewState> {
        self.state.clone()
    }

    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<ControllerStatus> {
        self.status.clone()
    }

    /// Waits until the published status satisfies `predicate`.
    ///
    /// Returns `None` if the controller is gone.
    pub async fn wait_for_status(
        &self,
        mut predicate: impl FnMut(&ControllerStatus) -> bool,
    ) -> Option<ControllerStatus> {
        let mut status = self.status.clone();
        let result = status.wait_for(|s| predicate(s)).await;
        result.ok().map(|s| s.clone())
    }

    pub async fn start(&self) {
        self.actor.send(StartPreview).await;
    }

    pub async fn import_map_changed(&self) {
        self.actor.send(ImportMapChanged).await;
    }

    pub async fn runtime_version_changed(&self, runtime_url: impl Into<String>) {
        self.actor
            .send(RuntimeVersionChanged {
                runtime_url: runtime_url.into(),
            })
            .await;
    }

    pub async fn sources_changed(&self) {
        self.actor.send(SourcesChanged).await;
    }

    /// Tears down the host, then stops the actor.
    pub async fn shutdown(&self) {
        self.actor.send(ShutdownPreview).await;
        let _ = self.wait_for_status(|s| s.host_id.is_none()).await;
        if let Err(e) = self.actor.stop().await {
            tracing::warn!(error = ?e, "Preview controller did not stop cleanly");
        }
    }
}

/// Forwards every change of a runtime-version value to the controller.
///
/// The task ends when the sender side is dropped.
pub fn watch_runtime_version(
    preview: PreviewHandle,
    mut runtime_url: watch::Receiver<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while runtime_url.changed().await.is_ok() {
            let url = runtime_url.borrow_and_update().clone();
            tracing::debug!(runtime_url = %url, "Runtime version selection changed");
            preview.runtime_version_changed(url).await;
        }
    })
}
