use acton_preview::collaborators::{ConfigStore, DirectoryCompiler, MemoryConfigStore};
use acton_preview::config::{self, PreviewConfig};
use acton_preview::controller::{ControllerDeps, PreviewController, PreviewState};
use acton_preview::host::{PreviewSurface, ProcessHostFactory};
use acton_preview::import_map::{pinned_runtime_warning, BootstrapTemplate, ImportMap};
use acton_preview::logging::{self, LogLevel};
use acton_preview::{bridge, PreviewError};
use acton_reactive::prelude::*;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

#[derive(Parser)]
#[command(name = "acton-preview")]
#[command(about = "Live preview of compiled modules in an isolated host")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the standard search paths)
    #[arg(short, long, global = true, env = "ACTON_PREVIEW_CONFIG")]
    config: Option<PathBuf>,

    /// Log to stderr at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the bootstrap document for an import map
    Render {
        /// import-map.json to embed
        #[arg(short, long)]
        import_map: Option<PathBuf>,

        /// Runtime URL forced under the runtime key
        #[arg(long)]
        runtime_url: Option<String>,

        /// Custom bootstrap template containing the import-map marker
        #[arg(long)]
        template: Option<PathBuf>,
    },
    /// Validate an import-map.json file
    Check {
        /// File to validate
        import_map: PathBuf,
    },
    /// Drive a live preview over a directory of compiled modules
    Run {
        /// Directory of precompiled `*.js` modules
        modules: PathBuf,

        /// import-map.json to watch
        #[arg(short, long)]
        import_map: Option<PathBuf>,

        /// Guest command (overrides `host.command`)
        #[arg(long)]
        host_command: Option<String>,

        /// How often to look for changes, in milliseconds
        #[arg(long, default_value_t = 500)]
        poll_ms: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::from_path(path),
        None => config::load(),
    };
    let mut config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if cli.verbose {
        config.logging = config.logging.with_stderr(true).with_level(LogLevel::Debug);
    }
    if let Err(e) = logging::init_and_store_logging(&config.logging) {
        eprintln!("warning: logging disabled: {e}");
    }

    let result = match cli.command {
        Commands::Render {
            import_map,
            runtime_url,
            template,
        } => render(&config, import_map.as_deref(), runtime_url, template.as_deref()),
        Commands::Check { import_map } => check(&config, &import_map),
        Commands::Run {
            modules,
            import_map,
            host_command,
            poll_ms,
        } => {
            run(
                config,
                modules,
                import_map,
                host_command,
                Duration::from_millis(poll_ms),
            )
            .await
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn read_optional(path: Option<&Path>) -> Result<Option<String>, PreviewError> {
    path.map(|path| {
        std::fs::read_to_string(path).map_err(|e| {
            PreviewError::configuration(
                "import_map",
                format!("failed to read '{}': {e}", path.display()),
            )
        })
    })
    .transpose()
}

fn render(
    config: &PreviewConfig,
    import_map: Option<&Path>,
    runtime_url: Option<String>,
    template: Option<&Path>,
) -> Result<ExitCode, PreviewError> {
    let template = match read_optional(template)? {
        Some(source) => BootstrapTemplate::new(source)?,
        None => bridge::default_template()?,
    };
    let source = read_optional(import_map)?;
    let map = ImportMap::from_source(source.as_deref())
        .map_err(|e| PreviewError::configuration("import_map", e.to_string()))?;

    let runtime_url = runtime_url.unwrap_or_else(|| config.runtime_url.clone());
    let map = map.with_runtime(&config.runtime_key, &runtime_url);
    println!("{}", template.render(&map));
    Ok(ExitCode::SUCCESS)
}

fn check(config: &PreviewConfig, import_map: &Path) -> Result<ExitCode, PreviewError> {
    let Some(text) = read_optional(Some(import_map))? else {
        return Ok(ExitCode::FAILURE);
    };
    match ImportMap::validate(&text) {
        Ok(map) => {
            if map.pins(&config.runtime_key) {
                println!("warning: {}", pinned_runtime_warning(&config.runtime_key));
            }
            println!("{}: {} import(s)", import_map.display(), map.imports().len());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("{e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Names, sizes and modification times of the `*.js` files in `dir`.
fn fingerprint(dir: &Path) -> Vec<(PathBuf, u64, Option<SystemTime>)> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<_> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "js"))
        .filter_map(|entry| {
            let meta = entry.metadata().ok()?;
            Some((entry.path(), meta.len(), meta.modified().ok()))
        })
        .collect();
    files.sort();
    files
}

fn print_state(state: &PreviewState) {
    match (&state.error, &state.warning) {
        (None, None) => println!("preview: ok"),
        (error, warning) => {
            if let Some(error) = error {
                println!("preview error: {error}");
            }
            if let Some(warning) = warning {
                println!("preview warning: {warning}");
            }
        }
    }
}

async fn run(
    config: PreviewConfig,
    modules: PathBuf,
    import_map: Option<PathBuf>,
    host_command: Option<String>,
    poll: Duration,
) -> Result<ExitCode, PreviewError> {
    let Some(command) = host_command.or_else(|| config.host.command.clone()) else {
        return Err(PreviewError::configuration(
            "host.command",
            "no guest command configured; set host.command or pass --host-command",
        ));
    };

    let store = Arc::new(MemoryConfigStore::new(read_optional(import_map.as_deref())?));
    let deps = ControllerDeps {
        hosts: Arc::new(ProcessHostFactory::new(command, config.host.args.clone())),
        surface: Arc::new(PreviewSurface::new()),
        compiler: Arc::new(DirectoryCompiler::new(&modules)),
        store: store.clone(),
        template: bridge::default_template()?,
    };

    let mut app = ActonApp::launch_async().await;
    let preview = PreviewController::spawn(&mut app, deps, config.controller_config()).await;
    preview.start().await;

    let mut states = preview.subscribe_state();
    let mut ticker = tokio::time::interval(poll);
    let mut last_modules = fingerprint(&modules);
    let mut last_reports = 0;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = states.borrow_and_update().clone();
                print_state(&state);
            }
            _ = ticker.tick() => {
                if let Some(path) = &import_map {
                    let text = read_optional(Some(path)).unwrap_or_default();
                    if text != store.import_map() {
                        store.set_import_map(text);
                        preview.import_map_changed().await;
                    }
                }

                let current = fingerprint(&modules);
                if current != last_modules {
                    last_modules = current;
                    preview.sources_changed().await;
                }

                if store.report_count() != last_reports {
                    last_reports = store.report_count();
                    for error in store.errors() {
                        println!("import map: {error}");
                    }
                }
            }
        }
    }

    let status = preview.status();
    tracing::info!(
        hosts_created = status.metrics.hosts_created,
        cycles = status.metrics.cycles_settled(),
        "Preview stopped"
    );
    preview.shutdown().await;
    if let Err(e) = app.shutdown_all().await {
        tracing::warn!(error = ?e, "Actor runtime did not shut down cleanly");
    }
    Ok(ExitCode::SUCCESS)
}
