//! Configuration file schema.

use crate::controller::{
    ControllerConfig, DEFAULT_ENTRY_MODULE, DEFAULT_RUNTIME_URL, DEFAULT_WARNING_MARKER,
};
use crate::host::{SandboxPermission, SandboxPermissions};
use crate::import_map::DEFAULT_RUNTIME_KEY;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root of `acton-preview.toml`.
///
/// ```toml
/// runtime_url = "https://unpkg.com/vue@3.4.21/dist/vue.esm-browser.js"
/// entry_module = "App.vue"
///
/// [evaluation]
/// timeout_ms = 10000
/// debounce_ms = 150
///
/// [host]
/// command = "preview-guest"
/// args = ["--headless"]
/// permissions = ["allow-scripts", "allow-modals"]
///
/// [logging]
/// stderr = true
/// level = "debug"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    pub runtime_url: String,
    pub runtime_key: String,
    pub entry_module: String,
    pub warning_marker: String,
    pub evaluation: EvaluationFileConfig,
    pub host: HostFileConfig,
    pub logging: LoggingConfig,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            runtime_url: DEFAULT_RUNTIME_URL.to_string(),
            runtime_key: DEFAULT_RUNTIME_KEY.to_string(),
            entry_module: DEFAULT_ENTRY_MODULE.to_string(),
            warning_marker: DEFAULT_WARNING_MARKER.to_string(),
            evaluation: EvaluationFileConfig::default(),
            host: HostFileConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl PreviewConfig {
    /// The controller settings this file describes.
    #[must_use]
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            runtime_url: self.runtime_url.clone(),
            runtime_key: self.runtime_key.clone(),
            entry_module: self.entry_module.clone(),
            warning_marker: self.warning_marker.clone(),
            permissions: self.host.sandbox_permissions(),
            evaluation_timeout: self.evaluation.timeout(),
            debounce: self.evaluation.debounce(),
        }
    }
}

/// `[evaluation]` section. Zero or absent disables a setting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationFileConfig {
    pub timeout_ms: Option<u64>,
    pub debounce_ms: Option<u64>,
}

impl EvaluationFileConfig {
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        non_zero_millis(self.timeout_ms)
    }

    #[must_use]
    pub fn debounce(&self) -> Option<Duration> {
        non_zero_millis(self.debounce_ms)
    }
}

fn non_zero_millis(ms: Option<u64>) -> Option<Duration> {
    ms.filter(|ms| *ms > 0).map(Duration::from_millis)
}

/// `[host]` section: the guest program run by the process host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostFileConfig {
    pub command: Option<String>,
    pub args: Vec<String>,
    /// Granted capabilities; all of them when absent
    pub permissions: Option<Vec<SandboxPermission>>,
}

impl HostFileConfig {
    #[must_use]
    pub fn sandbox_permissions(&self) -> SandboxPermissions {
        match &self.permissions {
            Some(permissions) => SandboxPermissions::new(permissions.iter().copied()),
            None => SandboxPermissions::default(),
        }
    }
}
