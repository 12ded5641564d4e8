//! Interfaces to the components the preview engine consumes.
//!
//! The controller never compiles sources or stores documents itself. It asks a
//! [`ModuleCompiler`] for the ordered module list of the current application
//! and reads the import map from a [`ConfigStore`], which also receives every
//! validation message the controller produces.

use crate::error::PreviewError;
use std::fmt::{self, Debug};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Error reported by a module compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// Message shown as the preview's current error
    pub message: String,
}

impl CompileError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CompileError {}

impl From<CompileError> for PreviewError {
    fn from(error: CompileError) -> Self {
        PreviewError::compilation(error.message)
    }
}

/// Produces the ordered, self-registering modules of the application.
///
/// Must be a pure function of external state: calling it twice without an
/// intervening source edit yields the same modules.
pub trait ModuleCompiler: Send + Sync + Debug {
    /// Compiles the current sources.
    ///
    /// # Errors
    ///
    /// Returns the compiler's message when any source fails to compile.
    fn compile_modules_for_preview(&self) -> Result<Vec<String>, CompileError>;
}

/// Holds the user's import map and receives configuration errors.
pub trait ConfigStore: Send + Sync + Debug {
    /// The current import-map text, if the document exists.
    fn import_map(&self) -> Option<String>;

    /// Replaces the store's error list.
    fn report_errors(&self, errors: Vec<String>);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory [`ConfigStore`].
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    import_map: Mutex<Option<String>>,
    errors: Mutex<Vec<String>>,
    reports: Mutex<usize>,
}

impl MemoryConfigStore {
    #[must_use]
    pub fn new(import_map: Option<String>) -> Self {
        Self {
            import_map: Mutex::new(import_map),
            ..Self::default()
        }
    }

    /// Replaces the import-map text. The caller notifies the controller.
    pub fn set_import_map(&self, import_map: Option<String>) {
        *lock(&self.import_map) = import_map;
    }

    /// The most recently reported errors.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        lock(&self.errors).clone()
    }

    /// How many times errors were reported.
    #[must_use]
    pub fn report_count(&self) -> usize {
        *lock(&self.reports)
    }
}

impl ConfigStore for MemoryConfigStore {
    fn import_map(&self) -> Option<String> {
        lock(&self.import_map).clone()
    }

    fn report_errors(&self, errors: Vec<String>) {
        *lock(&self.errors) = errors;
        *lock(&self.reports) += 1;
    }
}

/// In-memory [`ModuleCompiler`] whose output is set directly.
#[derive(Debug)]
pub struct MemoryCompiler {
    output: Mutex<Result<Vec<String>, CompileError>>,
}

impl MemoryCompiler {
    #[must_use]
    pub fn new(modules: Vec<String>) -> Self {
        Self {
            output: Mutex::new(Ok(modules)),
        }
    }

    /// Sets the modules returned from now on.
    pub fn set_modules(&self, modules: Vec<String>) {
        *lock(&self.output) = Ok(modules);
    }

    /// Makes every compile fail with this message.
    pub fn fail_with(&self, message: impl Into<String>) {
        *lock(&self.output) = Err(CompileError::new(message));
    }
}

impl Default for MemoryCompiler {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ModuleCompiler for MemoryCompiler {
    fn compile_modules_for_preview(&self) -> Result<Vec<String>, CompileError> {
        lock(&self.output).clone()
    }
}

/// Reads precompiled modules from `*.js` files in a directory.
///
/// Files are returned in file-name order, so prefix names (`00-store.js`,
/// `10-App.js`) to control registration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryCompiler {
    dir: PathBuf,
}

impl DirectoryCompiler {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ModuleCompiler for DirectoryCompiler {
    fn compile_modules_for_preview(&self) -> Result<Vec<String>, CompileError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            CompileError::new(format!("cannot read '{}': {e}", self.dir.display()))
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| CompileError::new(format!("cannot list '{}': {e}", self.dir.display())))?
                .path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "js") {
                paths.push(path);
            }
        }
        paths.sort();

        paths
            .iter()
            .map(|path| {
                std::fs::read_to_string(path)
                    .map_err(|e| CompileError::new(format!("cannot read '{}': {e}", path.display())))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn memory_store_tracks_reports() {
        let store = MemoryConfigStore::new(Some("{}".into()));
        assert_eq!(store.import_map().as_deref(), Some("{}"));

        store.report_errors(vec!["bad".into()]);
        assert_eq!(store.errors(), vec!["bad".to_string()]);
        assert_eq!(store.report_count(), 1);

        store.set_import_map(None);
        assert!(store.import_map().is_none());
    }

    #[test]
    fn memory_compiler_switches_between_output_and_failure() {
        let compiler = MemoryCompiler::new(vec!["a".into()]);
        assert_eq!(compiler.compile_modules_for_preview(), Ok(vec!["a".to_string()]));

        compiler.fail_with("bad syntax");
        let error = compiler.compile_modules_for_preview().unwrap_err();
        assert_eq!(error.to_string(), "bad syntax");
        assert_eq!(PreviewError::from(error).user_message(), "bad syntax");
    }

    #[test]
    fn directory_compiler_reads_js_in_name_order() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("20-App.js"), "app").unwrap();
        std::fs::write(dir.path().join("10-store.js"), "store").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let modules = DirectoryCompiler::new(dir.path())
            .compile_modules_for_preview()
            .unwrap();
        assert_eq!(modules, vec!["store".to_string(), "app".to_string()]);
    }

    #[test]
    fn directory_compiler_reports_missing_dir() {
        let error = DirectoryCompiler::new("/nonexistent/preview/modules")
            .compile_modules_for_preview()
            .unwrap_err();
        assert!(error.message.contains("cannot read"));
    }
}
