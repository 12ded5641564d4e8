//! Configuration file discovery and parsing.

use crate::config::types::PreviewConfig;
use crate::error::PreviewError;
use std::path::{Path, PathBuf};

const LOCAL_CONFIG_NAME: &str = "acton-preview.toml";
const XDG_CONFIG_NAME: &str = "config.toml";
const APP_NAME: &str = "acton-preview";

/// Loads the first configuration file found in [`search_paths`].
///
/// Falls back to defaults when none exists.
///
/// # Errors
///
/// Returns a configuration error if a file exists but cannot be read or parsed.
pub fn load() -> Result<PreviewConfig, PreviewError> {
    match search_paths().into_iter().find(|path| path.exists()) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "Loading preview configuration");
            from_path(&path)
        }
        None => Ok(PreviewConfig::default()),
    }
}

/// Loads configuration from a specific file.
///
/// # Errors
///
/// Returns a configuration error if the file cannot be read or parsed.
pub fn from_path(path: &Path) -> Result<PreviewConfig, PreviewError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        PreviewError::configuration(
            "config_file",
            format!("failed to read '{}': {e}", path.display()),
        )
    })?;

    from_str(&contents).map_err(|e| {
        PreviewError::configuration(
            "config_file",
            format!("failed to parse '{}': {e}", path.display()),
        )
    })
}

/// Parses configuration from TOML text.
///
/// # Errors
///
/// Returns a configuration error for invalid TOML or unknown values.
pub fn from_str(toml_str: &str) -> Result<PreviewConfig, PreviewError> {
    toml::from_str(toml_str)
        .map_err(|e| PreviewError::configuration("config", format!("invalid TOML: {e}")))
}

/// Files consulted by [`load`], in order.
#[must_use]
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG_NAME)];
    if let Some(dir) = xdg_config_dir() {
        paths.push(dir.join(XDG_CONFIG_NAME));
    }
    paths
}

/// `~/.config/acton-preview` on most systems.
#[must_use]
pub fn xdg_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME))
}
