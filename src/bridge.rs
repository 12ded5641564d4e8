//! Module loader bridge.
//!
//! The bootstrap document is loaded once per host lifetime. It keeps a
//! per-host module registry (`window.__modules__`) and style buffer
//! (`window.__css__`), runs eval requests as module scripts, and forwards
//! console calls, uncaught errors and unhandled rejections over the
//! transport as `event` frames.
//!
//! The scripts built here are what every re-evaluation cycle sends:
//! a registry reset, the compiled modules, and a trailer that mounts the
//! entry module into `#app`.

use crate::error::PreviewError;
use crate::import_map::BootstrapTemplate;

/// The bootstrap document shipped with the crate.
pub const DEFAULT_BOOTSTRAP: &str = include_str!("../assets/srcdoc.html");

/// Clears the module registry and style buffer before a full re-run.
pub const RESET_FRAGMENT: &str = "window.__modules__ = {};window.__css__ = ''";

/// The built-in bootstrap template.
///
/// # Errors
///
/// Only fails if the bundled document lost its import-map marker.
pub fn default_template() -> Result<BootstrapTemplate, PreviewError> {
    BootstrapTemplate::new(DEFAULT_BOOTSTRAP)
}

/// Builds the trailer that mounts the entry module's default export.
///
/// A previously mounted app is unmounted and its root cleared first, the
/// collected styles are applied, and framework errors are routed to
/// `console.error` so they surface as runtime events.
#[must_use]
pub fn mount_trailer(runtime_key: &str, entry_module: &str) -> String {
    let runtime = serde_json::Value::from(runtime_key).to_string();
    let entry = serde_json::Value::from(entry_module).to_string();
    format!(
        r#"import {{ createApp as _createApp }} from {runtime}
if (window.__app__) {{
  window.__app__.unmount()
  document.getElementById('app').innerHTML = ''
}}
document.getElementById('__sfc-styles').innerHTML = window.__css__
const app = window.__app__ = _createApp(__modules__[{entry}].default)
app.config.errorHandler = e => console.error(e)
app.mount('#app')"#
    )
}

/// The full fragment list for one evaluation cycle.
#[must_use]
pub fn evaluation_script(modules: Vec<String>, runtime_key: &str, entry_module: &str) -> Vec<String> {
    let mut fragments = Vec::with_capacity(modules.len() + 2);
    fragments.push(RESET_FRAGMENT.to_string());
    fragments.extend(modules);
    fragments.push(mount_trailer(runtime_key, entry_module));
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import_map::{ImportMap, IMPORT_MAP_MARKER};

    #[test]
    fn bundled_document_has_one_marker() {
        assert_eq!(DEFAULT_BOOTSTRAP.matches(IMPORT_MAP_MARKER).count(), 1);
        assert!(default_template().is_ok());
    }

    #[test]
    fn bundled_document_renders_import_map() {
        let template = default_template().unwrap();
        let map = ImportMap::new().with_runtime("vue", "https://cdn/vue.js");
        let rendered = template.render(&map);
        assert!(rendered.contains(r#"<script type="importmap">{"imports":{"vue":"https://cdn/vue.js"}}</script>"#));
        assert_eq!(template.extract(&rendered), Some(map));
    }

    #[test]
    fn evaluation_script_brackets_modules() {
        let fragments = evaluation_script(
            vec!["mod_a".into(), "mod_b".into()],
            "vue",
            "App.vue",
        );
        assert_eq!(fragments.len(), 4);
        assert_eq!(fragments[0], RESET_FRAGMENT);
        assert_eq!(&fragments[1..3], &["mod_a".to_string(), "mod_b".to_string()]);
        assert!(fragments[3].contains(r#"__modules__["App.vue"].default"#));
        assert!(fragments[3].contains(r#"from "vue""#));
    }

    #[test]
    fn trailer_unmounts_previous_app_before_mounting() {
        let trailer = mount_trailer("vue", "App.vue");
        let unmount = trailer.find("window.__app__.unmount()").unwrap();
        let mount = trailer.find("app.mount('#app')").unwrap();
        assert!(unmount < mount);
        assert!(trailer.contains("app.config.errorHandler = e => console.error(e)"));
    }

    #[test]
    fn trailer_escapes_entry_name() {
        let trailer = mount_trailer("vue", "we\"ird.vue");
        assert!(trailer.contains(r#"__modules__["we\"ird.vue"]"#));
    }
}
