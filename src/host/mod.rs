//! Isolated execution hosts.
//!
//! A host is a disposable context built from a bootstrap document. The
//! controller creates one through a [`HostFactory`], attaches it to the
//! [`MountSurface`], waits for its load signal, and destroys it wholesale
//! when the configuration changes.
//!
//! Two implementations ship with the crate:
//!
//! - [`ProcessHostFactory`]: runs a child process speaking JSON lines over stdio
//! - [`StubHostFactory`]: a scripted in-memory guest for tests and demos

mod permissions;
mod process;
mod stub;
mod surface;
mod traits;

pub use permissions::{SandboxPermission, SandboxPermissions};
pub use process::{ProcessHost, ProcessHostFactory, HOST_ID_ENV, SANDBOX_ENV};
pub use stub::{GuestReply, GuestScript, StubHost, StubHostFactory};
pub use surface::{MountSurface, PreviewSurface};
pub use traits::{ExecutionHost, HostFactory, HostLifecycle, HostSpec};
