//! Messages handled by the preview controller actor.

use crate::controller::{ControllerConfig, ControllerDeps, PreviewChannels};
use crate::error::PreviewError;
use crate::protocol::{NavigationRequest, RuntimeEvent};
use crate::types::HostId;
use acton_reactive::prelude::*;

/// Configures the controller. Sent once by `PreviewController::spawn`.
#[acton_message]
pub struct InitPreview {
    pub deps: ControllerDeps,
    pub config: ControllerConfig,
    pub channels: PreviewChannels,
}

/// Creates the first host.
#[acton_message]
pub struct StartPreview;

/// The config store's import map may have changed.
#[acton_message]
pub struct ImportMapChanged;

/// The runtime-version selector picked a new runtime URL.
#[acton_message]
pub struct RuntimeVersionChanged {
    pub runtime_url: String,
}

/// Application sources changed; re-evaluate.
#[acton_message]
pub struct SourcesChanged;

/// Tears down the current host and stops reacting to changes.
#[acton_message]
pub struct ShutdownPreview;

/// The host's bootstrap document finished loading.
#[acton_message]
pub(crate) struct HostLoaded {
    pub host_id: HostId,
}

/// The host went away before signalling that it loaded.
#[acton_message]
pub(crate) struct HostFailed {
    pub host_id: HostId,
}

/// An evaluation cycle reached its outcome.
#[acton_message]
pub(crate) struct CycleFinished {
    pub host_id: HostId,
    pub seq: u64,
    pub outcome: Result<(), PreviewError>,
}

/// A runtime event arrived from the host's proxy.
#[acton_message]
pub(crate) struct HostEventReceived {
    pub host_id: HostId,
    pub event: RuntimeEvent,
}

/// The guest redirected a link click.
#[acton_message]
pub(crate) struct NavigationReceived {
    pub host_id: HostId,
    pub request: NavigationRequest,
}

/// A debounce window closed.
#[acton_message]
pub(crate) struct DebounceElapsed {
    pub host_id: HostId,
    pub token: u64,
}
