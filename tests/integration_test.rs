//! Integration tests for the preview controller.
//!
//! These drive a `PreviewController` actor against the scripted stub host:
//! - Host construction and the embedded import map
//! - Import-map and runtime-version changes
//! - Evaluation cycles, superseded and stale results
//! - Runtime diagnostics and teardown

use acton_preview::bridge::{default_template, mount_trailer, RESET_FRAGMENT};
use acton_preview::collaborators::{MemoryCompiler, MemoryConfigStore};
use acton_preview::controller::{watch_runtime_version, DEFAULT_RUNTIME_URL};
use acton_preview::host::{GuestReply, GuestScript};
use acton_preview::prelude::*;
use acton_preview::protocol::ConsoleLevel;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const WAIT: Duration = Duration::from_secs(5);

struct Preview {
    runtime: ActorRuntime,
    handle: PreviewHandle,
    hosts: StubHostFactory,
    surface: Arc<PreviewSurface>,
    compiler: Arc<MemoryCompiler>,
    store: Arc<MemoryConfigStore>,
}

impl Preview {
    async fn launch(script: GuestScript, import_map: Option<&str>, config: ControllerConfig) -> Self {
        let mut runtime = ActonApp::launch_async().await;
        let hosts = StubHostFactory::with_script(script);
        let surface = Arc::new(PreviewSurface::new());
        let compiler = Arc::new(MemoryCompiler::new(vec!["const x = 1".to_string()]));
        let store = Arc::new(MemoryConfigStore::new(import_map.map(str::to_string)));

        let deps = ControllerDeps {
            hosts: Arc::new(hosts.clone()),
            surface: surface.clone(),
            compiler: compiler.clone(),
            store: store.clone(),
            template: default_template().expect("bundled template"),
        };
        let handle = PreviewController::spawn(&mut runtime, deps, config).await;

        Self {
            runtime,
            handle,
            hosts,
            surface,
            compiler,
            store,
        }
    }

    /// Launches with default settings, starts, and waits for the first cycle.
    async fn ready(script: GuestScript, import_map: Option<&str>) -> Self {
        let preview = Self::launch(script, import_map, ControllerConfig::default()).await;
        preview.handle.start().await;
        preview.settled(1).await;
        preview
    }

    async fn status_where(&self, predicate: impl FnMut(&ControllerStatus) -> bool) -> ControllerStatus {
        tokio::time::timeout(WAIT, self.handle.wait_for_status(predicate))
            .await
            .expect("timed out waiting for controller status")
            .expect("controller stopped")
    }

    async fn settled(&self, cycles: u64) -> ControllerStatus {
        self.status_where(|s| s.phase == ControllerPhase::Ready && s.metrics.cycles_settled() >= cycles)
            .await
    }

    async fn state_where(&self, predicate: impl Fn(&PreviewState) -> bool) -> PreviewState {
        let mut states = self.handle.subscribe_state();
        let waited = tokio::time::timeout(WAIT, async move {
            let result = states.wait_for(|s| predicate(s)).await;
            result.map(|s| s.clone())
        })
        .await;
        waited
            .expect("timed out waiting for preview state")
            .expect("controller stopped")
    }

    fn template(&self) -> BootstrapTemplate {
        default_template().expect("bundled template")
    }

    fn embedded_map(&self, index: usize) -> ImportMap {
        let documents = self.hosts.documents();
        self.template()
            .extract(&documents[index])
            .expect("document embeds a valid import map")
    }

    async fn shutdown(self) {
        self.handle.shutdown().await;
        let mut runtime = self.runtime;
        runtime.shutdown_all().await.expect("Shutdown failed");
    }
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Startup embeds the stored map with the runtime forced and evaluates once.
#[tokio::test]
async fn test_startup_builds_host_and_evaluates() {
    let preview = Preview::ready(
        GuestScript::new(),
        Some(r#"{"imports": {"dayjs": "https://cdn/dayjs.mjs"}}"#),
    )
    .await;

    let created = preview.hosts.created();
    assert_eq!(created.len(), 1);
    let host = &created[0];

    let map = preview.embedded_map(0);
    assert_eq!(map.get("vue"), Some(DEFAULT_RUNTIME_URL));
    assert_eq!(map.get("dayjs"), Some("https://cdn/dayjs.mjs"));

    assert_eq!(
        preview.hosts.evaluations(host),
        vec![vec![
            RESET_FRAGMENT.to_string(),
            "const x = 1".to_string(),
            mount_trailer("vue", "App.vue"),
        ]]
    );
    assert_eq!(preview.hosts.commands(host), vec!["catch_clicks".to_string()]);
    assert_eq!(preview.surface.attached().as_ref(), Some(host));
    assert!(preview.handle.state().is_clean());

    let status = preview.handle.status();
    assert_eq!(status.host_id.as_ref(), Some(host));
    assert_eq!(status.metrics.hosts_created, 1);
    assert_eq!(status.metrics.cycles_completed, 1);

    preview.shutdown().await;
}

/// Without a stored map the host still gets one with the runtime pinned.
#[tokio::test]
async fn test_startup_without_import_map() {
    let preview = Preview::ready(GuestScript::new(), None).await;

    let map = preview.embedded_map(0);
    assert_eq!(map.imports().len(), 1);
    assert_eq!(map.get("vue"), Some(DEFAULT_RUNTIME_URL));

    preview.shutdown().await;
}

/// Starting twice does not build a second host.
#[tokio::test]
async fn test_start_is_idempotent() {
    let preview = Preview::ready(GuestScript::new(), None).await;

    preview.handle.start().await;
    preview.handle.sources_changed().await;
    preview.settled(2).await;

    assert_eq!(preview.hosts.created().len(), 1);

    preview.shutdown().await;
}

/// A map without `imports` is reported and leaves the host alone.
#[tokio::test]
async fn test_missing_imports_is_rejected_without_recreation() {
    let preview = Preview::ready(GuestScript::new(), None).await;
    let first = preview.hosts.created()[0].clone();

    preview.store.set_import_map(Some("{}".to_string()));
    preview.handle.import_map_changed().await;
    eventually(|| preview.store.report_count() == 1).await;

    assert_eq!(
        preview.store.errors(),
        vec!["import-map.json is missing \"imports\" field.".to_string()]
    );
    assert_eq!(preview.hosts.created().len(), 1);
    assert_eq!(preview.hosts.destroy_calls(&first), 0);

    preview
        .store
        .set_import_map(Some(r#"{"imports": {}}"#.to_string()));
    preview.handle.import_map_changed().await;
    eventually(|| preview.hosts.created().len() == 2).await;

    assert_eq!(preview.store.report_count(), 1);
    assert_eq!(preview.hosts.destroy_calls(&first), 1);

    preview.shutdown().await;
}

/// Malformed JSON is reported as a syntax error.
#[tokio::test]
async fn test_syntax_error_is_reported() {
    let preview = Preview::ready(GuestScript::new(), None).await;

    preview
        .store
        .set_import_map(Some(r#"{"imports": "#.to_string()));
    preview.handle.import_map_changed().await;
    eventually(|| preview.store.report_count() == 1).await;

    let errors = preview.store.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Syntax error in import-map.json:"));
    assert_eq!(preview.hosts.created().len(), 1);

    preview.shutdown().await;
}

/// An unchanged map is not re-applied.
#[tokio::test]
async fn test_unchanged_import_map_is_ignored() {
    let preview = Preview::ready(GuestScript::new(), Some(r#"{"imports": {}}"#)).await;

    preview.handle.import_map_changed().await;
    preview.handle.sources_changed().await;
    preview.settled(2).await;

    assert_eq!(preview.hosts.created().len(), 1);
    assert_eq!(preview.store.report_count(), 0);

    preview.shutdown().await;
}

/// Pinning the runtime in the map warns but the forced URL still wins.
#[tokio::test]
async fn test_pinned_runtime_warns_and_recreates() {
    let preview = Preview::ready(GuestScript::new(), None).await;

    preview.store.set_import_map(Some(
        r#"{"imports": {"vue": "https://elsewhere/vue.js"}}"#.to_string(),
    ));
    preview.handle.import_map_changed().await;
    eventually(|| preview.hosts.created().len() == 2).await;

    assert_eq!(
        preview.store.errors(),
        vec![
            "Select Vue versions using the top-right dropdown.\nSpecifying it in the import map has no effect."
                .to_string()
        ]
    );
    assert_eq!(preview.embedded_map(1).get("vue"), Some(DEFAULT_RUNTIME_URL));

    preview.shutdown().await;
}

/// Recreation tears the old host down exactly once and never overlaps hosts.
#[tokio::test]
async fn test_recreation_destroys_previous_host_once() {
    let preview = Preview::ready(GuestScript::new(), None).await;
    let first = preview.hosts.created()[0].clone();

    preview.store.set_import_map(Some(
        r#"{"imports": {"lodash": "https://cdn/lodash.mjs"}}"#.to_string(),
    ));
    preview.handle.import_map_changed().await;
    let status = preview.settled(2).await;

    let created = preview.hosts.created();
    assert_eq!(created.len(), 2);
    assert_eq!(status.host_id.as_ref(), Some(&created[1]));
    assert_eq!(preview.hosts.destroy_calls(&first), 1);
    assert_eq!(preview.hosts.live_hosts(), 1);

    assert_eq!(status.metrics.proxies_destroyed, 1);
    assert_eq!(status.metrics.hosts_destroyed, 1);
    assert_eq!(preview.surface.attach_count(), 2);
    assert_eq!(preview.surface.detach_count(), 1);
    assert_eq!(preview.surface.attached().as_ref(), Some(&created[1]));
    assert_eq!(preview.embedded_map(1).get("lodash"), Some("https://cdn/lodash.mjs"));

    preview.shutdown().await;
}

/// Removing the map rebuilds with an empty one.
#[tokio::test]
async fn test_removed_import_map_rebuilds_empty() {
    let preview = Preview::ready(
        GuestScript::new(),
        Some(r#"{"imports": {"dayjs": "https://cdn/dayjs.mjs"}}"#),
    )
    .await;

    preview.store.set_import_map(None);
    preview.handle.import_map_changed().await;
    eventually(|| preview.hosts.created().len() == 2).await;

    let map = preview.embedded_map(1);
    assert_eq!(map.get("dayjs"), None);
    assert_eq!(map.get("vue"), Some(DEFAULT_RUNTIME_URL));

    preview.shutdown().await;
}

/// A compile failure is shown verbatim and nothing is sent to the host.
#[tokio::test]
async fn test_compile_failure_skips_evaluation() {
    let preview = Preview::ready(GuestScript::new(), None).await;

    preview.compiler.fail_with("bad syntax");
    preview.handle.sources_changed().await;
    let status = preview.settled(2).await;

    assert_eq!(status.metrics.cycles_failed, 1);
    assert_eq!(preview.hosts.evaluation_count(), 1);
    assert_eq!(preview.handle.state().error.as_deref(), Some("bad syntax"));

    preview.compiler.set_modules(vec!["const y = 2".to_string()]);
    preview.handle.sources_changed().await;
    preview.settled(3).await;

    assert!(preview.handle.state().is_clean());
    assert_eq!(preview.hosts.evaluation_count(), 2);

    preview.shutdown().await;
}

/// A failed evaluation surfaces the guest's message.
#[tokio::test]
async fn test_evaluation_error_is_shown() {
    let preview = Preview::launch(
        GuestScript::new().replying(GuestReply::Error("x is not defined".to_string())),
        None,
        ControllerConfig::default(),
    )
    .await;
    preview.handle.start().await;

    let state = preview.state_where(|s| s.error.is_some()).await;
    assert_eq!(state.error.as_deref(), Some("x is not defined"));

    preview.shutdown().await;
}

/// Resolution failures lose their tail and gain the import-map hint.
#[tokio::test]
async fn test_resolution_error_is_rewritten() {
    let script = GuestScript::new().emitting(RuntimeEvent::Error {
        value: json!({
            "message": "Failed to resolve module specifier \"lodash\". Relative references must start with either \"/\", \"./\", or \"../\"."
        }),
    });
    let preview = Preview::launch(script, None, ControllerConfig::default()).await;
    preview.handle.start().await;

    let state = preview.state_where(|s| s.error.is_some()).await;
    assert_eq!(
        state.error.as_deref(),
        Some("Failed to resolve module specifier \"lodash\".\nTip: add an \"import-map.json\" file to specify import paths for dependencies.")
    );

    preview.shutdown().await;
}

/// A resolution failure that settles the evaluation reads the same as the event.
#[tokio::test]
async fn test_rejected_resolution_is_rewritten() {
    let preview = Preview::launch(
        GuestScript::new().replying(GuestReply::Error(
            "Failed to resolve module specifier \"lodash\". Relative references must start with either \"/\", \"./\", or \"../\".".to_string(),
        )),
        None,
        ControllerConfig::default(),
    )
    .await;
    preview.handle.start().await;

    let state = preview.state_where(|s| s.error.is_some()).await;
    assert!(state
        .error
        .as_deref()
        .is_some_and(|e| e.starts_with("Failed to resolve module specifier \"lodash\".\nTip:")));

    preview.shutdown().await;
}

/// Only warnings tagged with the framework marker are shown.
#[tokio::test]
async fn test_marked_warning_is_shown() {
    let script = GuestScript::new()
        .emitting(RuntimeEvent::Console {
            level: ConsoleLevel::Warn,
            args: vec![json!("something unrelated")],
        })
        .emitting(RuntimeEvent::Console {
            level: ConsoleLevel::Warn,
            args: vec![json!("[Vue warn]: Missing required prop: "), json!("\"title\"")],
        });
    let preview = Preview::launch(script, None, ControllerConfig::default()).await;
    preview.handle.start().await;

    let state = preview.state_where(|s| s.warning.is_some()).await;
    assert_eq!(
        state.warning.as_deref(),
        Some("Missing required prop: \"title\"")
    );
    assert_eq!(state.error, None);

    preview.shutdown().await;
}

/// Within one cycle the first error wins.
#[tokio::test]
async fn test_first_error_wins_within_cycle() {
    let script = GuestScript::new()
        .emitting(RuntimeEvent::UnhandledRejection {
            value: json!("first"),
        })
        .emitting(RuntimeEvent::Console {
            level: ConsoleLevel::Error,
            args: vec![json!("second")],
        });
    let preview = Preview::launch(script, None, ControllerConfig::default()).await;
    preview.handle.start().await;

    preview
        .status_where(|s| s.metrics.events_received >= 2)
        .await;
    assert_eq!(
        preview.handle.state().error.as_deref(),
        Some("Uncaught (in promise): first")
    );

    preview.shutdown().await;
}

/// A new runtime URL rebuilds the host with that URL.
#[tokio::test]
async fn test_runtime_version_change_recreates_host() {
    let preview = Preview::ready(GuestScript::new(), None).await;
    let next = "https://unpkg.com/vue@3.4.21/dist/vue.esm-browser.js";

    preview.handle.runtime_version_changed(next).await;
    preview.settled(2).await;

    assert_eq!(preview.hosts.created().len(), 2);
    assert_eq!(preview.embedded_map(1).get("vue"), Some(next));

    preview.handle.runtime_version_changed(next).await;
    preview.handle.sources_changed().await;
    preview.settled(3).await;
    assert_eq!(preview.hosts.created().len(), 2);

    preview.shutdown().await;
}

/// The watcher helper forwards selector changes to the controller.
#[tokio::test]
async fn test_runtime_version_watcher() {
    let preview = Preview::ready(GuestScript::new(), None).await;
    let (selector, selected) = watch::channel(DEFAULT_RUNTIME_URL.to_string());
    let watcher = watch_runtime_version(preview.handle.clone(), selected);

    let next = "https://unpkg.com/vue@3.3.4/dist/vue.esm-browser.js";
    selector.send_replace(next.to_string());
    eventually(|| preview.hosts.created().len() == 2).await;
    assert_eq!(preview.embedded_map(1).get("vue"), Some(next));

    drop(selector);
    tokio::time::timeout(WAIT, watcher)
        .await
        .expect("watcher did not stop")
        .expect("watcher panicked");

    preview.shutdown().await;
}

/// The host is not evaluated before its load signal.
#[tokio::test]
async fn test_evaluation_waits_for_load() {
    let preview = Preview::launch(
        GuestScript::new().manual_load(),
        None,
        ControllerConfig::default(),
    )
    .await;
    preview.handle.start().await;

    let status = preview
        .status_where(|s| s.phase == ControllerPhase::Constructing)
        .await;
    let host = status.host_id.expect("constructing host");

    preview.handle.sources_changed().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(preview.hosts.evaluation_count(), 0);

    assert!(preview.hosts.fire_load(&host));
    preview.settled(1).await;
    assert_eq!(preview.hosts.evaluations(&host).len(), 1);

    preview.shutdown().await;
}

/// A cycle still pending on a replaced host never reports back.
#[tokio::test]
async fn test_stale_cycle_is_ignored() {
    let preview = Preview::launch(
        GuestScript::new().replying(GuestReply::Silent),
        None,
        ControllerConfig::default(),
    )
    .await;
    preview.handle.start().await;
    eventually(|| preview.hosts.evaluation_count() == 1).await;

    preview.hosts.set_script(GuestScript::new());
    preview
        .store
        .set_import_map(Some(r#"{"imports": {}}"#.to_string()));
    preview.handle.import_map_changed().await;
    let status = preview.settled(1).await;

    assert_eq!(status.metrics.cycles_started, 2);
    assert_eq!(status.metrics.cycles_completed, 1);
    assert_eq!(status.metrics.cycles_failed, 0);
    assert_eq!(status.metrics.proxies_destroyed, 1);
    assert!(preview.handle.state().is_clean());

    preview.shutdown().await;
}

/// A change arriving while an evaluation never settles starts a fresh cycle.
#[tokio::test]
async fn test_change_supersedes_unsettled_cycle() {
    let preview = Preview::launch(
        GuestScript::new().replying(GuestReply::Silent),
        None,
        ControllerConfig::default(),
    )
    .await;
    preview.handle.start().await;
    eventually(|| preview.hosts.evaluation_count() == 1).await;

    preview.hosts.set_script(GuestScript::new());
    preview.handle.sources_changed().await;
    let status = preview.settled(1).await;

    assert_eq!(preview.hosts.evaluation_count(), 2);
    assert_eq!(status.metrics.cycles_started, 2);
    assert_eq!(status.metrics.cycles_superseded, 1);
    assert_eq!(status.metrics.cycles_completed, 1);
    assert_eq!(status.metrics.cycles_failed, 0);
    assert!(preview.handle.state().is_clean());

    preview.shutdown().await;
}

/// Every later change keeps re-evaluating after a hung cycle.
#[tokio::test]
async fn test_reevaluation_continues_after_hung_cycle() {
    let preview = Preview::launch(
        GuestScript::new().replying(GuestReply::Silent),
        None,
        ControllerConfig::default(),
    )
    .await;
    preview.handle.start().await;
    eventually(|| preview.hosts.evaluation_count() == 1).await;

    preview.handle.sources_changed().await;
    eventually(|| preview.hosts.evaluation_count() == 2).await;

    preview.hosts.set_script(GuestScript::new());
    preview.handle.sources_changed().await;
    let status = preview.settled(1).await;

    assert_eq!(preview.hosts.evaluation_count(), 3);
    assert_eq!(status.metrics.cycles_superseded, 2);
    assert_eq!(status.metrics.cycles_completed, 1);

    preview.shutdown().await;
}

/// An evaluation timeout fails the hung cycle; the next change still runs.
#[tokio::test]
async fn test_timed_out_cycle_is_reported() {
    let config =
        ControllerConfig::default().with_evaluation_timeout(Some(Duration::from_millis(100)));
    let preview = Preview::launch(
        GuestScript::new().replying(GuestReply::Silent),
        None,
        config,
    )
    .await;
    preview.handle.start().await;

    let status = preview.settled(1).await;
    assert_eq!(status.metrics.cycles_failed, 1);
    assert!(preview.handle.state().error.is_some());

    preview.hosts.set_script(GuestScript::new());
    preview.handle.sources_changed().await;
    let status = preview.settled(2).await;

    assert_eq!(status.metrics.cycles_completed, 1);
    assert_eq!(status.metrics.cycles_superseded, 0);
    assert!(preview.handle.state().is_clean());

    preview.shutdown().await;
}

/// Debounced source changes start a single cycle.
#[tokio::test]
async fn test_debounced_changes_start_one_cycle() {
    let config = ControllerConfig::default().with_debounce(Some(Duration::from_millis(100)));
    let preview = Preview::launch(GuestScript::new(), None, config).await;
    preview.handle.start().await;
    preview.settled(1).await;

    for _ in 0..3 {
        preview.handle.sources_changed().await;
    }
    preview.settled(2).await;
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(preview.handle.status().metrics.cycles_started, 2);
    assert_eq!(preview.hosts.evaluation_count(), 2);

    preview.shutdown().await;
}

/// Link clicks redirected by the guest are published.
#[tokio::test]
async fn test_navigation_is_published() {
    let preview = Preview::ready(GuestScript::new(), None).await;

    assert!(preview.hosts.emit_frame(
        r#"{"kind": "navigate", "payload": {"url": "https://vuejs.org", "new_window": true}}"#
    ));
    let status = preview.status_where(|s| s.metrics.navigations == 1).await;

    let navigation = status.last_navigation.expect("navigation recorded");
    assert_eq!(navigation.url, "https://vuejs.org");
    assert!(navigation.new_window);

    preview.shutdown().await;
}

/// A host that cannot be built leaves an error and no host.
#[tokio::test]
async fn test_host_creation_failure() {
    let preview = Preview::launch(GuestScript::new(), None, ControllerConfig::default()).await;
    preview.hosts.refuse_creation(Some("no display available".to_string()));
    preview.handle.start().await;

    let state = preview.state_where(|s| s.error.is_some()).await;
    assert!(state
        .error
        .as_deref()
        .is_some_and(|e| e.contains("no display available")));
    assert_eq!(preview.handle.status().phase, ControllerPhase::NoHost);
    assert!(preview.surface.attached().is_none());

    preview.shutdown().await;
}

/// A host that dies before loading leaves an error and no host.
#[tokio::test]
async fn test_host_lost_before_load() {
    let preview = Preview::launch(
        GuestScript::new().manual_load(),
        None,
        ControllerConfig::default(),
    )
    .await;
    preview.handle.start().await;
    let status = preview
        .status_where(|s| s.phase == ControllerPhase::Constructing)
        .await;
    let host = status.host_id.expect("host under construction");

    assert!(preview.hosts.abandon_load(&host));
    let state = preview.state_where(|s| s.error.is_some()).await;
    let status = preview.status_where(|s| s.host_id.is_none()).await;

    assert!(state.error.as_deref().is_some_and(|e| e.contains("exited")));
    assert_eq!(status.phase, ControllerPhase::NoHost);
    assert_eq!(preview.hosts.destroy_calls(&host), 1);
    assert!(preview.surface.attached().is_none());
    assert_eq!(preview.hosts.evaluation_count(), 0);

    preview.shutdown().await;
}

/// A guest process that exits at once fails construction.
#[cfg(unix)]
#[tokio::test]
async fn test_guest_process_exit_before_load() {
    let mut runtime = ActonApp::launch_async().await;
    let deps = ControllerDeps {
        hosts: Arc::new(ProcessHostFactory::new(
            "sh",
            vec!["-c".into(), "exit 1".into()],
        )),
        surface: Arc::new(PreviewSurface::new()),
        compiler: Arc::new(MemoryCompiler::new(vec!["const x = 1".to_string()])),
        store: Arc::new(MemoryConfigStore::new(None)),
        template: default_template().expect("bundled template"),
    };
    let handle = PreviewController::spawn(&mut runtime, deps, ControllerConfig::default()).await;
    handle.start().await;

    let status = tokio::time::timeout(
        WAIT,
        handle.wait_for_status(|s| {
            s.metrics.hosts_created == 1 && s.phase == ControllerPhase::NoHost
        }),
    )
    .await
    .expect("timed out waiting for the failed host")
    .expect("controller stopped");

    assert!(status.host_id.is_none());
    assert_eq!(status.metrics.hosts_destroyed, 1);
    assert!(handle
        .state()
        .error
        .as_deref()
        .is_some_and(|e| e.contains("exited")));

    handle.shutdown().await;
    runtime.shutdown_all().await.expect("Shutdown failed");
}

/// Shutdown destroys the host and frees the surface.
#[tokio::test]
async fn test_shutdown_tears_down_host() {
    let preview = Preview::ready(GuestScript::new(), None).await;
    let host = preview.hosts.created()[0].clone();
    let hosts = preview.hosts.clone();
    let surface = preview.surface.clone();
    let handle = preview.handle.clone();

    preview.shutdown().await;

    assert_eq!(hosts.destroy_calls(&host), 1);
    assert_eq!(hosts.live_hosts(), 0);
    assert!(surface.attached().is_none());
    assert_eq!(handle.status().phase, ControllerPhase::NoHost);
}
