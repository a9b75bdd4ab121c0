use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Retry policy parameters for the HTTP fetch action (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per fetch (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 1.0 = 1s, 2s, 4s...).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 1.0,
            max_delay_secs: 30,
        }
    }
}

/// A selectable provider backed by a manifest file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEntry {
    /// Display name used in the selection menu and discovery report.
    pub name: String,
    /// Path (or http/https URL) of the root manifest.
    pub manifest: String,
}

/// Global configuration loaded from `~/.config/publogs/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublogsConfig {
    /// Worker pool size per server bucket; also bounds discovery parallelism.
    pub workers: usize,
    /// Adaptive per-server concurrency (on by default).
    pub adaptive: bool,
    /// Lower bound for the adaptive limiter.
    pub min_workers: usize,
    /// Completions observed before the limiter reconsiders its ceiling.
    pub window: usize,
    /// Failure rate below which the limiter grows.
    pub up_threshold: f64,
    /// Failure rate above which the limiter shrinks.
    pub down_threshold: f64,
    /// Hard cap on tasks a single provider may produce, including expanded ones.
    pub max_tasks_per_provider: usize,
    /// Root directory for downloaded artifacts (None = current directory).
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Providers offered for selection, in menu order.
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
    /// Hostname -> address pins that bypass the system resolver.
    #[serde(default)]
    pub hosts: BTreeMap<String, String>,
}

impl Default for PublogsConfig {
    fn default() -> Self {
        Self {
            workers: 20,
            adaptive: true,
            min_workers: 4,
            window: 50,
            up_threshold: 0.01,
            down_threshold: 0.05,
            max_tasks_per_provider: 50_000,
            output_dir: None,
            retry: None,
            providers: Vec::new(),
            hosts: BTreeMap::new(),
        }
    }
}

impl PublogsConfig {
    /// Reject settings the limiter cannot work with.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.workers >= 1, "workers must be at least 1");
        ensure!(self.window >= 1, "window must be at least 1");
        ensure!(
            (0.0..=1.0).contains(&self.up_threshold),
            "up_threshold must be within [0, 1], got {}",
            self.up_threshold
        );
        ensure!(
            (0.0..=1.0).contains(&self.down_threshold),
            "down_threshold must be within [0, 1], got {}",
            self.down_threshold
        );
        ensure!(
            self.up_threshold <= self.down_threshold,
            "up_threshold ({}) must not exceed down_threshold ({})",
            self.up_threshold,
            self.down_threshold
        );
        ensure!(
            self.max_tasks_per_provider >= 1,
            "max_tasks_per_provider must be at least 1"
        );
        Ok(())
    }

    /// Retry settings, falling back to defaults when the section is absent.
    pub fn retry_or_default(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("publogs")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<PublogsConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = PublogsConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load and validate configuration from an explicit path.
pub fn load_from_path(path: &Path) -> Result<PublogsConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config: {}", path.display()))?;
    let cfg: PublogsConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
