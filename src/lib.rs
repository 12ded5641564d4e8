//! # Acton-Preview: Live Component Preview Engine
//!
//! Renders an application's compiled modules inside a disposable, isolated
//! execution host and keeps it in sync with edits. The controller is an
//! actor built on acton-reactive.
//!
//! ## Architecture
//!
//! - **Host**: An isolated context built from a bootstrap document that embeds the import map
//! - **Transport**: The only channel between the engine and a host, carrying JSON envelopes
//! - **Proxy**: Correlates evaluation requests with their outcomes and dispatches runtime events
//! - **Controller**: Recreates hosts on configuration changes, re-evaluates on source changes,
//!   and publishes the current error and warning
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use acton_preview::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), PreviewError> {
//!     let mut app = ActonApp::launch_async().await;
//!
//!     let deps = ControllerDeps {
//!         hosts: Arc::new(ProcessHostFactory::new("preview-guest", vec![])),
//!         surface: Arc::new(PreviewSurface::new()),
//!         compiler: Arc::new(DirectoryCompiler::new("dist")),
//!         store: Arc::new(MemoryConfigStore::new(None)),
//!         template: default_template()?,
//!     };
//!     let preview = PreviewController::spawn(&mut app, deps, ControllerConfig::default()).await;
//!     preview.start().await;
//!
//!     preview.shutdown().await;
//!     app.shutdown_all().await.ok();
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod collaborators;
pub mod config;
pub mod controller;
pub mod error;
pub mod host;
pub mod import_map;
pub mod logging;
pub mod protocol;
pub mod proxy;
pub mod transport;
pub mod types;

pub use error::{PreviewError, PreviewErrorKind};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::bridge::default_template;
    pub use crate::collaborators::{
        CompileError, ConfigStore, DirectoryCompiler, MemoryCompiler, MemoryConfigStore,
        ModuleCompiler,
    };
    pub use crate::config::PreviewConfig;
    pub use crate::controller::{
        watch_runtime_version, ControllerConfig, ControllerDeps, ControllerPhase,
        ControllerStatus, PreviewController, PreviewHandle, PreviewState,
    };
    pub use crate::error::{PreviewError, PreviewErrorKind};
    pub use crate::host::{
        ExecutionHost, HostFactory, MountSurface, PreviewSurface, ProcessHostFactory,
        SandboxPermission, SandboxPermissions, StubHostFactory,
    };
    pub use crate::import_map::{BootstrapTemplate, ImportMap};
    pub use crate::protocol::{NavigationRequest, RuntimeEvent};
    pub use crate::proxy::{EventHandlers, PreviewProxy};
    pub use crate::types::{CorrelationId, HostId};

    // Re-export acton-reactive prelude
    pub use acton_reactive::prelude::*;
}
