//! Tracing setup for the preview CLI and embedders.
//!
//! Two sinks are available: a daily rolling file under the XDG data
//! directory and stderr. `RUST_LOG` overrides the configured level.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const APP_NAME: &str = "acton-preview";

/// Where and how much to log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Write to the rolling log file
    pub file: bool,
    /// Write to stderr
    pub stderr: bool,
    /// Log directory; defaults to `$XDG_DATA_HOME/acton-preview/logs`
    pub log_dir: Option<PathBuf>,
    pub level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: true,
            stderr: false,
            log_dir: None,
            level: LogLevel::default(),
        }
    }
}

impl LoggingConfig {
    /// No sink at all.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            file: false,
            stderr: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_log_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_stderr(mut self, stderr: bool) -> Self {
        self.stderr = stderr;
        self
    }

    fn is_enabled(&self) -> bool {
        self.file || self.stderr
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))
    }
}

/// Level filter applied when `RUST_LOG` is unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(LoggingError::unknown_level(other)),
        }
    }
}

/// Keeps the non-blocking file writer flushing. Drop it last.
pub struct LoggingGuard {
    _guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

impl fmt::Debug for LoggingGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingGuard")
            .field("file", &self._guard.is_some())
            .finish()
    }
}

static LOGGING_GUARD: std::sync::OnceLock<LoggingGuard> = std::sync::OnceLock::new();

/// Error raised while installing the subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingError {
    pub kind: LoggingErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingErrorKind {
    /// No XDG data directory could be determined
    NoDataDir,
    CreateDirFailed { path: PathBuf, reason: String },
    SubscriberInitFailed { reason: String },
    UnknownLevel { level: String },
}

impl LoggingError {
    #[must_use]
    pub fn new(kind: LoggingErrorKind) -> Self {
        Self { kind }
    }

    #[must_use]
    pub fn no_data_dir() -> Self {
        Self::new(LoggingErrorKind::NoDataDir)
    }

    #[must_use]
    pub fn create_dir_failed(path: PathBuf, reason: impl Into<String>) -> Self {
        Self::new(LoggingErrorKind::CreateDirFailed {
            path,
            reason: reason.into(),
        })
    }

    #[must_use]
    pub fn subscriber_init_failed(reason: impl Into<String>) -> Self {
        Self::new(LoggingErrorKind::SubscriberInitFailed {
            reason: reason.into(),
        })
    }

    #[must_use]
    pub fn unknown_level(level: impl Into<String>) -> Self {
        Self::new(LoggingErrorKind::UnknownLevel {
            level: level.into(),
        })
    }

    #[must_use]
    pub fn is_no_data_dir(&self) -> bool {
        matches!(self.kind, LoggingErrorKind::NoDataDir)
    }
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LoggingErrorKind::NoDataDir => write!(
                f,
                "could not determine XDG data directory; set XDG_DATA_HOME or configure logging.log_dir"
            ),
            LoggingErrorKind::CreateDirFailed { path, reason } => write!(
                f,
                "failed to create log directory '{}': {}; check permissions",
                path.display(),
                reason
            ),
            LoggingErrorKind::SubscriberInitFailed { reason } => write!(
                f,
                "failed to initialize tracing subscriber: {}; a subscriber may already be set",
                reason
            ),
            LoggingErrorKind::UnknownLevel { level } => write!(
                f,
                "unknown log level '{}'; use trace, debug, info, warn or error",
                level
            ),
        }
    }
}

impl std::error::Error for LoggingError {}

/// Directory the rolling log file is written to.
///
/// # Errors
///
/// Fails when no log directory is configured and the XDG data directory
/// cannot be determined.
pub fn log_dir(config: &LoggingConfig) -> Result<PathBuf, LoggingError> {
    match &config.log_dir {
        Some(dir) => Ok(dir.clone()),
        None => dirs::data_local_dir()
            .map(|dir| dir.join(APP_NAME).join("logs"))
            .ok_or_else(LoggingError::no_data_dir),
    }
}

/// Installs the global subscriber.
///
/// Returns `Ok(None)` when every sink is disabled.
///
/// # Errors
///
/// Fails if the log directory cannot be created or a subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<LoggingGuard>, LoggingError> {
    if !config.is_enabled() {
        return Ok(None);
    }

    let (file_layer, guard) = if config.file {
        let dir = log_dir(config)?;
        std::fs::create_dir_all(&dir)
            .map_err(|e| LoggingError::create_dir_failed(dir.clone(), e.to_string()))?;

        let appender = tracing_appender::rolling::daily(&dir, format!("{APP_NAME}.log"));
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let stderr_layer = config.stderr.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .with(config.env_filter())
        .try_init()
        .map_err(|e| LoggingError::subscriber_init_failed(e.to_string()))?;

    Ok(Some(LoggingGuard { _guard: guard }))
}

/// Installs the subscriber once and keeps its guard for the process lifetime.
///
/// Returns `Ok(false)` if logging is disabled or was already installed.
///
/// # Errors
///
/// See [`init_logging`].
pub fn init_and_store_logging(config: &LoggingConfig) -> Result<bool, LoggingError> {
    if LOGGING_GUARD.get().is_some() {
        return Ok(false);
    }
    match init_logging(config)? {
        Some(guard) => {
            let _ = LOGGING_GUARD.set(guard);
            Ok(true)
        }
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_log_to_file_at_info() {
        let config = LoggingConfig::default();
        assert!(config.file);
        assert!(!config.stderr);
        assert_eq!(config.level, LogLevel::Info);
    }

    #[test]
    fn custom_dir_wins() {
        let config = LoggingConfig::default().with_log_dir("/custom/logs");
        assert_eq!(log_dir(&config).unwrap(), PathBuf::from("/custom/logs"));
    }

    #[test]
    fn xdg_dir_is_app_scoped() {
        if let Ok(dir) = log_dir(&LoggingConfig::default()) {
            assert!(dir.ends_with("acton-preview/logs"));
        }
    }

    #[test]
    fn disabled_installs_nothing() {
        assert!(init_logging(&LoggingConfig::disabled()).unwrap().is_none());
    }

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        let err = "loud".parse::<LogLevel>().unwrap_err();
        assert!(err.to_string().contains("loud"));
    }

    #[test]
    fn config_reads_from_toml() {
        let config: LoggingConfig = toml::from_str("stderr = true\nlevel = \"debug\"").unwrap();
        assert!(config.stderr);
        assert!(config.file);
        assert_eq!(config.level, LogLevel::Debug);
    }

    #[test]
    fn create_dir_error_names_path() {
        let error = LoggingError::create_dir_failed(PathBuf::from("/nope"), "denied");
        let message = error.to_string();
        assert!(message.contains("/nope"));
        assert!(message.contains("denied"));
    }
}
