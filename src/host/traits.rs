//! Execution host trait definitions.
//!
//! An execution host is a disposable isolated context that runs injected
//! code under a restricted permission set. Its creator can only talk to it
//! through the [`Transport`] it hands out; there is no synchronous API.

use crate::error::PreviewError;
use crate::host::SandboxPermissions;
use crate::transport::Transport;
use crate::types::HostId;
use std::fmt::Debug;
use tokio::sync::oneshot;

/// Where a host is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostLifecycle {
    /// Created and attached, bootstrap document still loading
    Constructing,
    /// Load notification received
    Ready,
    /// Torn down; unusable
    Destroyed,
}

/// Everything needed to construct one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSpec {
    /// Identity assigned by the controller
    pub host_id: HostId,
    /// Bootstrap document with the import map already embedded
    pub document: String,
    /// Capabilities granted to the isolated context
    pub permissions: SandboxPermissions,
}

/// A live isolated execution context.
///
/// Hosts are replaced wholesale, never reconfigured. The owner takes the
/// transport and load signal once, right after creation.
///
/// # Example
///
/// ```rust,ignore
/// let mut host = factory.create(spec)?;
/// let transport = host.take_transport().expect("fresh host");
/// let loaded = host.take_load_signal().expect("fresh host");
/// loaded.await?;
/// host.mark_ready();
/// // ...
/// host.destroy();
/// ```
pub trait ExecutionHost: Send + Sync + Debug {
    /// The host's identity.
    fn id(&self) -> &HostId;

    /// The current lifecycle state.
    fn lifecycle(&self) -> HostLifecycle;

    /// The bootstrap document this host was built from.
    fn document(&self) -> &str;

    /// Hands out the host side of the transport. Returns `None` after the first call.
    fn take_transport(&mut self) -> Option<Transport>;

    /// Hands out the one-shot load notification. Returns `None` after the first call.
    fn take_load_signal(&mut self) -> Option<oneshot::Receiver<()>>;

    /// Records that the load notification was observed.
    fn mark_ready(&mut self);

    /// Tears the host down and releases its resources.
    ///
    /// Idempotent. In-flight evaluations can no longer be answered.
    fn destroy(&mut self);

    /// Returns false once the host is destroyed.
    fn is_alive(&self) -> bool {
        self.lifecycle() != HostLifecycle::Destroyed
    }
}

/// Constructs execution hosts.
///
/// This lets the controller run against child processes in production and
/// scripted in-memory hosts in tests without any other change.
pub trait HostFactory: Send + Sync + Debug {
    /// Creates a host from the given spec.
    ///
    /// # Errors
    ///
    /// Returns a host creation error if the isolated context cannot be built.
    fn create(&self, spec: HostSpec) -> Result<Box<dyn ExecutionHost>, PreviewError>;

    /// Returns whether this factory can create hosts on this system.
    fn is_available(&self) -> bool {
        true
    }

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}
