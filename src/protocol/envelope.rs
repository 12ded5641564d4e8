//! Frames exchanged between the proxy and an isolated host.

use crate::error::PreviewError;
use crate::protocol::RuntimeEvent;
use crate::types::CorrelationId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// What a frame carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnvelopeKind {
    /// Host to guest: evaluate script fragments
    EvalRequest,
    /// Guest to host: evaluation settled successfully
    EvalResponseOk,
    /// Guest to host: evaluation failed
    EvalResponseError,
    /// Guest to host: unsolicited runtime event
    Event,
    /// Host to guest: fire-and-forget instruction
    Command,
    /// Guest to host: intercepted navigation
    Navigate,
    /// Guest to host: bootstrap document finished loading
    Load,
}

/// One serialized message on the transport.
///
/// `id` is present on eval requests and their responses only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CorrelationId>,
    pub kind: EnvelopeKind,
    #[serde(default)]
    pub payload: Value,
}

/// Payload of an `eval-response-error` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalFailure {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl From<EvalFailure> for PreviewError {
    fn from(failure: EvalFailure) -> Self {
        PreviewError::evaluation(failure.message, failure.stack)
    }
}

/// Payload of a `navigate` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationRequest {
    pub url: String,
    #[serde(default)]
    pub new_window: bool,
}

/// Instruction asking the guest to route link clicks back to the host.
pub const CATCH_CLICKS: &str = "catch_clicks";

impl MessageEnvelope {
    /// An eval request carrying the fragments in order.
    #[must_use]
    pub fn eval_request(id: CorrelationId, fragments: &[String]) -> Self {
        Self {
            id: Some(id),
            kind: EnvelopeKind::EvalRequest,
            payload: json!({ "script": fragments }),
        }
    }

    /// A successful eval response.
    #[must_use]
    pub fn eval_ok(id: CorrelationId) -> Self {
        Self {
            id: Some(id),
            kind: EnvelopeKind::EvalResponseOk,
            payload: Value::Null,
        }
    }

    /// A failed eval response.
    #[must_use]
    pub fn eval_error(id: CorrelationId, failure: &EvalFailure) -> Self {
        Self {
            id: Some(id),
            kind: EnvelopeKind::EvalResponseError,
            payload: serde_json::to_value(failure).unwrap_or(Value::Null),
        }
    }

    /// An unsolicited runtime event.
    #[must_use]
    pub fn event(event: &RuntimeEvent) -> Self {
        Self {
            id: None,
            kind: EnvelopeKind::Event,
            payload: serde_json::to_value(event).unwrap_or(Value::Null),
        }
    }

    /// A fire-and-forget command.
    #[must_use]
    pub fn command(action: &str) -> Self {
        Self {
            id: None,
            kind: EnvelopeKind::Command,
            payload: json!({ "action": action }),
        }
    }

    /// The load notification.
    #[must_use]
    pub fn load() -> Self {
        Self {
            id: None,
            kind: EnvelopeKind::Load,
            payload: Value::Null,
        }
    }

    /// Encodes the envelope as one JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns a transport error if serialization fails.
    pub fn to_frame(&self) -> Result<String, PreviewError> {
        serde_json::to_string(self)
            .map_err(|e| PreviewError::transport(format!("failed to encode frame: {e}")))
    }

    /// Decodes one JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns the serde error for malformed frames or unknown kinds.
    pub fn from_frame(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }

    /// Interprets the payload of an `event` frame.
    ///
    /// # Errors
    ///
    /// Returns the serde error for unknown tags or malformed fields.
    pub fn runtime_event(&self) -> Result<RuntimeEvent, serde_json::Error> {
        RuntimeEvent::deserialize(&self.payload)
    }

    /// The script fragments of an eval request, in order.
    #[must_use]
    pub fn script_fragments(&self) -> Vec<String> {
        match self.payload.get("script") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(single)) => vec![single.clone()],
            _ => Vec::new(),
        }
    }

    /// The action name of a command frame.
    #[must_use]
    pub fn action(&self) -> Option<&str> {
        self.payload.get("action").and_then(Value::as_str)
    }
}
