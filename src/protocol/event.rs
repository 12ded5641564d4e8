//! Runtime events reported by the isolated side.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Console method that produced a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Info,
    Debug,
    Warn,
    Error,
    Trace,
    Table,
    Dir,
    Assert,
    Clear,
    /// Any console method the bridge forwards that is not listed above
    #[serde(other)]
    Other,
}

/// A closed set of events the module loader bridge can emit.
///
/// The wire tag is `type`, using the names the bridge posts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    /// Module fetches still outstanding
    FetchProgress {
        #[serde(default)]
        remaining: u64,
    },
    /// Uncaught error; `value` is a string or `{message, stack}`
    Error {
        #[serde(default)]
        value: Value,
    },
    /// Unhandled promise rejection; `value` is a string or `{message, stack}`
    #[serde(rename = "unhandledrejection")]
    UnhandledRejection {
        #[serde(default)]
        value: Value,
    },
    Console {
        level: ConsoleLevel,
        #[serde(default)]
        args: Vec<Value>,
    },
    ConsoleGroup {
        #[serde(default)]
        label: Option<String>,
    },
    ConsoleGroupCollapsed {
        #[serde(default)]
        label: Option<String>,
    },
    ConsoleGroupEnd,
}

/// A console call as delivered to [`EventHandlers::on_console`].
///
/// [`EventHandlers::on_console`]: crate::proxy::EventHandlers::on_console
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleLog {
    pub level: ConsoleLevel,
    pub args: Vec<Value>,
}

impl RuntimeEvent {
    /// The wire tag of this event.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::FetchProgress { .. } => "fetch_progress",
            Self::Error { .. } => "error",
            Self::UnhandledRejection { .. } => "unhandledrejection",
            Self::Console { .. } => "console",
            Self::ConsoleGroup { .. } => "console_group",
            Self::ConsoleGroupCollapsed { .. } => "console_group_collapsed",
            Self::ConsoleGroupEnd => "console_group_end",
        }
    }
}

/// Extracts a human-readable message from an error-like value.
///
/// Error objects are forwarded as `{message, stack}`; anything else is
/// rendered as text.
#[must_use]
pub fn error_message(value: &Value) -> String {
    match value {
        Value::Object(fields) => match fields.get("message") {
            Some(Value::String(message)) => message.clone(),
            _ => value.to_string(),
        },
        other => display_value(other),
    }
}

/// Renders a console argument the way string coercion would.
#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}
