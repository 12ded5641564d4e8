//! Observable controller state.

use crate::protocol::NavigationRequest;
use crate::types::HostId;

/// What the user sees next to the preview: one error and one warning.
///
/// Both are cleared when an evaluation cycle starts. Within a cycle the
/// first error and the first warning observed win; later ones are logged
/// but do not replace them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewState {
    /// Current runtime or compile error
    pub error: Option<String>,
    /// Current framework warning
    pub warning: Option<String>,
}

/// A message destined for the [`PreviewState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    Error(String),
    Warning(String),
}

impl PreviewState {
    /// Records a diagnostic unless its slot is already taken.
    ///
    /// Returns true if the state changed.
    pub fn record(&mut self, diagnostic: Diagnostic) -> bool {
        match diagnostic {
            Diagnostic::Error(message) if self.error.is_none() => {
                self.error = Some(message);
                true
            }
            Diagnostic::Warning(message) if self.warning.is_none() => {
                self.warning = Some(message);
                true
            }
            _ => false,
        }
    }

    /// Clears both slots.
    pub fn reset(&mut self) {
        self.error = None;
        self.warning = None;
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.error.is_none() && self.warning.is_none()
    }
}

/// Lifecycle phase of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ControllerPhase {
    /// No host exists
    #[default]
    NoHost,
    /// A host was created and attached; waiting for its load signal
    Constructing,
    /// The host loaded; source changes trigger re-evaluation
    Ready,
}

/// Counters collected by the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerMetrics {
    pub hosts_created: u64,
    pub hosts_destroyed: u64,
    pub proxies_destroyed: u64,
    pub cycles_started: u64,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    /// Cycles abandoned because a newer change arrived first
    pub cycles_superseded: u64,
    pub events_received: u64,
    pub navigations: u64,
}

impl ControllerMetrics {
    /// Cycles that reached an outcome, successful or not.
    #[must_use]
    pub fn cycles_settled(&self) -> u64 {
        self.cycles_completed + self.cycles_failed
    }
}

/// Snapshot published after every controller transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControllerStatus {
    pub phase: ControllerPhase,
    /// The current host, in Constructing or Ready
    pub host_id: Option<HostId>,
    pub metrics: ControllerMetrics,
    /// Most recent link click the guest redirected to the host
    pub last_navigation: Option<NavigationRequest>,
}
