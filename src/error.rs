//! Error types for the preview engine.
//!
//! Every error type implements Display, Debug, Clone, PartialEq, Eq, and
//! std::error::Error. No external error crates (anyhow, thiserror, eyre) are used.

use crate::types::HostId;
use std::fmt;
use std::time::Duration;

/// Errors raised by the preview controller, the proxy, and execution hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewError {
    /// The specific error that occurred
    pub kind: PreviewErrorKind,
}

/// Specific preview error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewErrorKind {
    /// Import map or configuration input was rejected
    Configuration {
        /// Which input was invalid
        field: String,
        /// Why it was invalid
        reason: String,
    },
    /// The module compiler reported a failure
    Compilation {
        /// Compiler message
        message: String,
    },
    /// The isolated side reported a failed evaluation
    Evaluation {
        /// Error message from the isolated side
        message: String,
        /// Stack trace, if one was reported
        stack: Option<String>,
    },
    /// The message transport is closed or a frame could not be encoded
    Transport {
        /// Description of the failure
        reason: String,
    },
    /// The execution host could not be constructed
    HostCreation {
        /// Description of the failure
        reason: String,
    },
    /// The proxy was destroyed before the call was issued
    ProxyDestroyed,
    /// An evaluation did not settle within the configured timeout
    EvaluationTimedOut {
        /// The timeout that elapsed
        after: Duration,
    },
    /// A host tried to attach while another one owned the surface
    SurfaceOccupied {
        /// The host currently attached
        host_id: HostId,
    },
}

impl PreviewError {
    /// Creates a new PreviewError with the given kind.
    #[must_use]
    pub fn new(kind: PreviewErrorKind) -> Self {
        Self { kind }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(PreviewErrorKind::Configuration {
            field: field.into(),
            reason: reason.into(),
        })
    }

    /// Creates a compilation error.
    #[must_use]
    pub fn compilation(message: impl Into<String>) -> Self {
        Self::new(PreviewErrorKind::Compilation {
            message: message.into(),
        })
    }

    /// Creates an evaluation error.
    #[must_use]
    pub fn evaluation(message: impl Into<String>, stack: Option<String>) -> Self {
        Self::new(PreviewErrorKind::Evaluation {
            message: message.into(),
            stack,
        })
    }

    /// Creates a transport error.
    #[must_use]
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::new(PreviewErrorKind::Transport {
            reason: reason.into(),
        })
    }

    /// Creates a host creation error.
    #[must_use]
    pub fn host_creation(reason: impl Into<String>) -> Self {
        Self::new(PreviewErrorKind::HostCreation {
            reason: reason.into(),
        })
    }

    /// Creates a proxy destroyed error.
    #[must_use]
    pub fn proxy_destroyed() -> Self {
        Self::new(PreviewErrorKind::ProxyDestroyed)
    }

    /// Creates an evaluation timeout error.
    #[must_use]
    pub fn evaluation_timed_out(after: Duration) -> Self {
        Self::new(PreviewErrorKind::EvaluationTimedOut { after })
    }

    /// Creates a surface occupied error.
    #[must_use]
    pub fn surface_occupied(host_id: HostId) -> Self {
        Self::new(PreviewErrorKind::SurfaceOccupied { host_id })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self.kind, PreviewErrorKind::Configuration { .. })
    }

    /// Returns true if the proxy had already been destroyed.
    #[must_use]
    pub fn is_proxy_destroyed(&self) -> bool {
        matches!(self.kind, PreviewErrorKind::ProxyDestroyed)
    }

    /// Returns true if an evaluation timed out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, PreviewErrorKind::EvaluationTimedOut { .. })
    }

    /// The message shown to the user in the preview's error slot.
    ///
    /// Compiler and evaluation failures surface their raw message; every
    /// other kind falls back to the full Display text.
    #[must_use]
    pub fn user_message(&self) -> String {
        match &self.kind {
            PreviewErrorKind::Compilation { message }
            | PreviewErrorKind::Evaluation { message, .. } => message.clone(),
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for PreviewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            PreviewErrorKind::Configuration { field, reason } => {
                write!(f, "invalid configuration for '{}': {}", field, reason)
            }
            PreviewErrorKind::Compilation { message } => {
                write!(f, "module compilation failed: {}", message)
            }
            PreviewErrorKind::Evaluation { message, .. } => {
                write!(f, "evaluation failed in the preview host: {}", message)
            }
            PreviewErrorKind::Transport { reason } => {
                write!(
                    f,
                    "preview transport error: {}; the host may have exited",
                    reason
                )
            }
            PreviewErrorKind::HostCreation { reason } => {
                write!(
                    f,
                    "failed to create preview host: {}; check the host command and permissions",
                    reason
                )
            }
            PreviewErrorKind::ProxyDestroyed => {
                write!(
                    f,
                    "preview proxy was destroyed; wait for the next host to become ready"
                )
            }
            PreviewErrorKind::EvaluationTimedOut { after } => {
                write!(
                    f,
                    "evaluation did not settle within {}ms; increase evaluation.timeout_ms or check the host",
                    after.as_millis()
                )
            }
            PreviewErrorKind::SurfaceOccupied { host_id } => {
                write!(
                    f,
                    "preview surface is already owned by host '{}'; destroy it before attaching another",
                    host_id
                )
            }
        }
    }
}

impl std::error::Error for PreviewError {}
