//! Configuration for acton-preview.
//!
//! Configuration is TOML. The search order is:
//! 1. `./acton-preview.toml` (project-local)
//! 2. `~/.config/acton-preview/config.toml` (XDG config)
//!
//! Every field is optional; see [`PreviewConfig`] for the layout.
//!
//! ```rust,ignore
//! use acton_preview::config;
//!
//! let config = config::load()?;
//! let controller = config.controller_config();
//! ```

mod file;
mod types;

pub use file::{from_path, from_str, load, search_paths, xdg_config_dir};
pub use types::{EvaluationFileConfig, HostFileConfig, PreviewConfig};
