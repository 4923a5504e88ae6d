use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Manifests loaded into the store at start-up
    #[serde(default)]
    pub seed: SeedConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Controller validations
        if self.controller.requeue_interval_secs == 0 {
            return Err("controller.requeue_interval_secs must be > 0".into());
        }
        if self.controller.error_backoff_base_ms == 0 {
            return Err("controller.error_backoff_base_ms must be > 0".into());
        }
        if self.controller.error_backoff_base_ms > self.controller.error_backoff_max_ms {
            return Err(
                "controller.error_backoff_base_ms must be <= controller.error_backoff_max_ms"
                    .into(),
            );
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }
}

/// How drift on an existing TaskDefinition is repaired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStrategy {
    /// Spec and owner references corrected in a single update.
    #[default]
    Combined,
    /// Spec repair and ownership repair issued as two updates.
    Separate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default = "default_requeue_interval_secs")]
    pub requeue_interval_secs: u64,
    #[serde(default)]
    pub update_strategy: UpdateStrategy,
    /// Upper bound on one reconcile pass; 0 disables the deadline
    #[serde(default = "default_reconcile_timeout_secs")]
    pub reconcile_timeout_secs: u64,
    #[serde(default = "default_error_backoff_base_ms")]
    pub error_backoff_base_ms: u64,
    #[serde(default = "default_error_backoff_max_ms")]
    pub error_backoff_max_ms: u64,
}

fn default_requeue_interval_secs() -> u64 {
    10
}
fn default_reconcile_timeout_secs() -> u64 {
    30
}
fn default_error_backoff_base_ms() -> u64 {
    500
}
fn default_error_backoff_max_ms() -> u64 {
    60_000
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            requeue_interval_secs: default_requeue_interval_secs(),
            update_strategy: UpdateStrategy::default(),
            reconcile_timeout_secs: default_reconcile_timeout_secs(),
            error_backoff_base_ms: default_error_backoff_base_ms(),
            error_backoff_max_ms: default_error_backoff_max_ms(),
        }
    }
}

impl ControllerConfig {
    pub fn requeue_interval(&self) -> Duration {
        Duration::from_secs(self.requeue_interval_secs)
    }

    pub fn reconcile_timeout(&self) -> Option<Duration> {
        (self.reconcile_timeout_secs > 0).then(|| Duration::from_secs(self.reconcile_timeout_secs))
    }

    pub fn error_backoff_base(&self) -> Duration {
        Duration::from_millis(self.error_backoff_base_ms)
    }

    pub fn error_backoff_max(&self) -> Duration {
        Duration::from_millis(self.error_backoff_max_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SeedConfig {
    /// Directory of `*.json` manifests
    #[serde(default)]
    pub manifests_dir: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config build error: {0}")]
    Build(String),
    #[error("config deserialize error: {0}")]
    Deserialize(String),
    #[error("invalid configuration: {0}")]
    Validation(String),
}

pub mod loader {
    use super::{AppConfig, ConfigError};
    use config::{Config, Environment, File};
    use std::path::{Path, PathBuf};

    pub const DEFAULT_CONFIG_PATH: &str = "kubeteach.toml";

    /// Loads the file at `path` (or `kubeteach.toml`) when it exists, then
    /// applies `KUBETEACH__SECTION__KEY` overrides and validates.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, ConfigError> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., KUBETEACH__CONTROLLER__REQUEUE_INTERVAL_SECS=5
        builder = builder.add_source(
            Environment::with_prefix("KUBETEACH")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| ConfigError::Build(e.to_string()))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| ConfigError::Deserialize(e.to_string()))?;
        merged.validate().map_err(ConfigError::Validation)?;
        Ok(merged)
    }

    pub fn load_config_with_default_path<P: AsRef<Path>>(
        path: Option<P>,
    ) -> Result<AppConfig, ConfigError> {
        let p = path
            .as_ref()
            .map(|p| p.as_ref().to_string_lossy().to_string());
        load_config(p.as_deref())
    }
}
