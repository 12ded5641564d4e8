//! Import maps and the bootstrap document they are embedded into.
//!
//! An import map is JSON of the form `{"imports": {"specifier": "url"}}`.
//! One key in `imports` (the runtime key, `vue` by default) is reserved for
//! the runtime version chosen by the host application; whatever the user
//! wrote there is overwritten before the map reaches an execution host.

use serde_json::{Map, Value};
use std::borrow::Cow;
use std::fmt;

/// The substitution marker in a bootstrap template.
pub const IMPORT_MAP_MARKER: &str = "<!--IMPORT_MAP-->";

/// The default reserved specifier pinning the runtime.
pub const DEFAULT_RUNTIME_KEY: &str = "vue";

const IMPORTS_FIELD: &str = "imports";

/// A well-formed import map.
///
/// Always holds an `imports` object. Other top-level members (`scopes`,
/// vendor extensions) are carried through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportMap {
    root: Map<String, Value>,
}

/// Errors produced while reading import-map text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportMapError {
    /// The specific error that occurred
    pub kind: ImportMapErrorKind,
}

/// Specific import map error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportMapErrorKind {
    /// The text is not valid JSON
    Syntax {
        /// Parser message
        message: String,
    },
    /// The JSON has no `imports` member
    MissingImports,
    /// `imports` is present but not an object
    ImportsNotObject,
}

impl ImportMapError {
    /// Creates a new ImportMapError with the given kind.
    #[must_use]
    pub fn new(kind: ImportMapErrorKind) -> Self {
        Self { kind }
    }

    /// Creates a syntax error.
    #[must_use]
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(ImportMapErrorKind::Syntax {
            message: message.into(),
        })
    }

    /// Creates a missing imports error.
    #[must_use]
    pub fn missing_imports() -> Self {
        Self::new(ImportMapErrorKind::MissingImports)
    }

    /// Returns true for JSON syntax errors.
    #[must_use]
    pub fn is_syntax(&self) -> bool {
        matches!(self.kind, ImportMapErrorKind::Syntax { .. })
    }
}

impl fmt::Display for ImportMapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ImportMapErrorKind::Syntax { message } => {
                write!(f, "Syntax error in import-map.json: {}", message)
            }
            ImportMapErrorKind::MissingImports => {
                write!(f, "import-map.json is missing \"imports\" field.")
            }
            ImportMapErrorKind::ImportsNotObject => {
                write!(f, "import-map.json \"imports\" field must be an object.")
            }
        }
    }
}

impl std::error::Error for ImportMapError {}

/// The warning reported when a user map pins the reserved runtime key.
#[must_use]
pub fn pinned_runtime_warning(runtime_key: &str) -> String {
    let mut chars = runtime_key.chars();
    let label = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    format!(
        "Select {label} versions using the top-right dropdown.\n\
         Specifying it in the import map has no effect."
    )
}

impl ImportMap {
    /// Creates an empty map: `{"imports": {}}`.
    #[must_use]
    pub fn new() -> Self {
        let mut root = Map::new();
        root.insert(IMPORTS_FIELD.to_string(), Value::Object(Map::new()));
        Self { root }
    }

    /// Strictly validates user-edited import-map text.
    ///
    /// # Errors
    ///
    /// Fails on invalid JSON, on a missing `imports` member, and on an
    /// `imports` member that is not an object.
    pub fn validate(text: &str) -> Result<Self, ImportMapError> {
        let root = match parse_json(text)? {
            Value::Object(root) => root,
            _ => return Err(ImportMapError::missing_imports()),
        };

        match root.get(IMPORTS_FIELD) {
            None | Some(Value::Null) => Err(ImportMapError::missing_imports()),
            Some(Value::Object(_)) => Ok(Self { root }),
            Some(_) => Err(ImportMapError::new(ImportMapErrorKind::ImportsNotObject)),
        }
    }

    /// Reads import-map text the way host construction does.
    ///
    /// Absent text is treated as `{}` and a missing or non-object `imports`
    /// member is replaced by an empty one. Only JSON syntax errors fail.
    ///
    /// # Errors
    ///
    /// Returns a syntax error if the text is not valid JSON.
    pub fn from_source(text: Option<&str>) -> Result<Self, ImportMapError> {
        let text = match text {
            Some(text) => text,
            None => return Ok(Self::new()),
        };

        let mut root = match parse_json(text)? {
            Value::Object(root) => root,
            _ => Map::new(),
        };
        if !matches!(root.get(IMPORTS_FIELD), Some(Value::Object(_))) {
            root.insert(IMPORTS_FIELD.to_string(), Value::Object(Map::new()));
        }
        Ok(Self { root })
    }

    /// The `imports` object.
    #[must_use]
    pub fn imports(&self) -> &Map<String, Value> {
        match self.root.get(IMPORTS_FIELD) {
            Some(Value::Object(imports)) => imports,
            _ => empty_imports(),
        }
    }

    /// Looks up a specifier's target.
    #[must_use]
    pub fn get(&self, specifier: &str) -> Option<&str> {
        self.imports().get(specifier).and_then(Value::as_str)
    }

    /// Returns true if the map sets the reserved runtime key to a truthy value.
    #[must_use]
    pub fn pins(&self, runtime_key: &str) -> bool {
        self.imports().get(runtime_key).is_some_and(is_truthy)
    }

    /// Forces the reserved runtime key to the selected runtime URL.
    #[must_use]
    pub fn with_runtime(mut self, runtime_key: &str, runtime_url: &str) -> Self {
        let imports = self
            .root
            .entry(IMPORTS_FIELD)
            .or_insert_with(|| Value::Object(Map::new()));
        if !imports.is_object() {
            *imports = Value::Object(Map::new());
        }
        if let Value::Object(imports) = imports {
            imports.insert(
                runtime_key.to_string(),
                Value::String(runtime_url.to_string()),
            );
        }
        self
    }

    /// Serializes the map as compact JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        Value::Object(self.root.clone()).to_string()
    }

    /// The map as a JSON value.
    #[must_use]
    pub fn as_value(&self) -> Value {
        Value::Object(self.root.clone())
    }
}

impl Default for ImportMap {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_json(text: &str) -> Result<Value, ImportMapError> {
    serde_json::from_str(text).map_err(|e| ImportMapError::syntax(e.to_string()))
}

fn empty_imports() -> &'static Map<String, Value> {
    static EMPTY: std::sync::OnceLock<Map<String, Value>> = std::sync::OnceLock::new();
    EMPTY.get_or_init(Map::new)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// A bootstrap document with exactly one [`IMPORT_MAP_MARKER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapTemplate {
    source: Cow<'static, str>,
}

impl BootstrapTemplate {
    /// Wraps template text, checking it has exactly one marker.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the marker is absent or repeated.
    pub fn new(source: impl Into<Cow<'static, str>>) -> Result<Self, crate::PreviewError> {
        let source = source.into();
        match source.matches(IMPORT_MAP_MARKER).count() {
            1 => Ok(Self { source }),
            n => Err(crate::PreviewError::configuration(
                "bootstrap_template",
                format!("expected exactly one {IMPORT_MAP_MARKER} marker, found {n}"),
            )),
        }
    }

    /// The raw template text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Substitutes the import map into the template.
    ///
    /// `</` is written as `<\/` so a URL can never close the surrounding
    /// script element; the embedded text is still the same JSON.
    #[must_use]
    pub fn render(&self, map: &ImportMap) -> String {
        let json = map.to_json().replace("</", "<\\/");
        self.source.replacen(IMPORT_MAP_MARKER, &json, 1)
    }

    /// Recovers the embedded map from a document this template rendered.
    #[must_use]
    pub fn extract(&self, rendered: &str) -> Option<ImportMap> {
        let (head, tail) = self.source.split_once(IMPORT_MAP_MARKER)?;
        let embedded = rendered.strip_prefix(head)?.strip_suffix(tail)?;
        ImportMap::validate(embedded).ok()
    }
}
