use std::{env, sync::Arc};

use anyhow::Context;
use kubeteach_controller::config::loader::{DEFAULT_CONFIG_PATH, load_config};
use kubeteach_controller::{Controller, ControllerSettings, Reconciler, ReconcilerConfig};
use kubeteach_core::events::EventBroadcaster;
use kubeteach_db_memory::InMemoryStore;
use kubeteach_storage::{DynStore, EventedStore};
use tokio_util::sync::CancellationToken;

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From KUBETEACH_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (kubeteach.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (KUBETEACH_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    // Initialize tracing early with the default level
    kubeteach_controller::observability::init_tracing();

    let (config_path, source) = resolve_config_path();
    let cfg = load_config(Some(&config_path)).context("Configuration error")?;

    tracing::info!(
        path = %config_path,
        source = %source,
        "Configuration loaded"
    );
    kubeteach_controller::observability::apply_logging_level(&cfg.logging.level);

    let broadcaster = EventBroadcaster::new_shared();
    let store: DynStore = Arc::new(EventedStore::new(
        InMemoryStore::new(),
        broadcaster.clone(),
    ));

    if let Some(dir) = &cfg.seed.manifests_dir {
        let created = kubeteach_controller::seed::load_manifests(store.as_ref(), dir)
            .await
            .with_context(|| format!("Failed to seed manifests from {}", dir.display()))?;
        tracing::info!(dir = %dir.display(), created, "Manifests loaded");
    }

    let reconciler = Reconciler::new(store, ReconcilerConfig::from(&cfg.controller));
    let controller = Controller::new(
        reconciler,
        broadcaster,
        ControllerSettings::from(&cfg.controller),
    );

    let shutdown = CancellationToken::new();
    let worker = tokio::spawn(controller.run(shutdown.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
    worker.await.context("Controller task failed")?;

    Ok(())
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: KUBETEACH_CONFIG
/// 3. Default: kubeteach.toml
fn resolve_config_path() -> (String, ConfigSource) {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return (path, ConfigSource::CliArgument);
            }
        }
    }

    if let Ok(path) = env::var("KUBETEACH_CONFIG") {
        if !path.is_empty() {
            return (path, ConfigSource::EnvironmentVariable);
        }
    }

    (DEFAULT_CONFIG_PATH.to_string(), ConfigSource::Default)
}
