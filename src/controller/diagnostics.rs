//! Turns runtime events into user-facing errors and warnings.

use crate::controller::state::Diagnostic;
use crate::error::PreviewError;
use crate::protocol::{error_message, ConsoleLevel, RuntimeEvent};
use regex::Regex;
use serde_json::Value;

const RESOLVE_FAILURES: [&str; 2] = [
    "Failed to resolve module specifier",
    "Error resolving module specifier",
];

const IMPORT_MAP_TIP: &str =
    ".\nTip: add an \"import-map.json\" file to specify import paths for dependencies.";

/// Event interpreter configured with the framework's warning marker.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    warning_marker: String,
    warning_prefix: Regex,
    relative_reference: Regex,
}

impl Diagnostics {
    /// Builds an interpreter for warnings tagged with `warning_marker`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the marker cannot be compiled.
    pub fn new(warning_marker: &str) -> Result<Self, PreviewError> {
        let warning_prefix = Regex::new(&format!("{}:", regex::escape(warning_marker)))
            .map_err(|e| PreviewError::configuration("warning_marker", e.to_string()))?;
        let relative_reference = Regex::new(r"\. Relative references must.*$")
            .map_err(|e| PreviewError::configuration("relative_reference", e.to_string()))?;

        Ok(Self {
            warning_marker: warning_marker.to_string(),
            warning_prefix,
            relative_reference,
        })
    }

    /// The diagnostic an event produces, if any.
    #[must_use]
    pub fn diagnose(&self, event: &RuntimeEvent) -> Option<Diagnostic> {
        match event {
            RuntimeEvent::Error { value } => Some(Diagnostic::Error(self.runtime_error(value))),
            RuntimeEvent::UnhandledRejection { value } => {
                Some(Diagnostic::Error(unhandled_rejection(value)))
            }
            RuntimeEvent::Console { level, args } => self.console(*level, args),
            RuntimeEvent::FetchProgress { .. }
            | RuntimeEvent::ConsoleGroup { .. }
            | RuntimeEvent::ConsoleGroupCollapsed { .. }
            | RuntimeEvent::ConsoleGroupEnd => None,
        }
    }

    /// Message for an uncaught error.
    ///
    /// Module resolution failures lose their "Relative references must..."
    /// tail and gain a hint about import maps.
    #[must_use]
    pub fn runtime_error(&self, value: &Value) -> String {
        let message = error_message(value);
        if RESOLVE_FAILURES.iter().any(|needle| message.contains(needle)) {
            let trimmed = self.relative_reference.replace(&message, "");
            format!("{trimmed}{IMPORT_MAP_TIP}")
        } else {
            message
        }
    }

    /// Diagnostic for a console call: errors always, warnings only when
    /// the first argument carries the framework marker.
    #[must_use]
    pub fn console(&self, level: ConsoleLevel, args: &[Value]) -> Option<Diagnostic> {
        let first = args.first()?;
        match level {
            ConsoleLevel::Error => Some(Diagnostic::Error(error_message(first))),
            ConsoleLevel::Warn => {
                if first.is_null() || !coerce(first).contains(&self.warning_marker) {
                    return None;
                }
                let joined: String = args.iter().map(coerce).collect();
                let stripped = self.warning_prefix.replace(&joined, "");
                Some(Diagnostic::Warning(stripped.trim().to_string()))
            }
            _ => None,
        }
    }
}

/// Message for an unhandled promise rejection.
#[must_use]
pub fn unhandled_rejection(value: &Value) -> String {
    format!("Uncaught (in promise): {}", error_message(value))
}

/// String coercion as used when joining console arguments.
fn coerce(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Object(_) => "[object Object]".to_string(),
        Value::Array(items) => items.iter().map(coerce).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}
