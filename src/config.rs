//! Provider configuration
//!
//! Loaded from `config.toml`:
//!
//! ```toml
//! [defaults.retry]
//! max_attempts = 5
//! base_delay_ms = 500
//!
//! [defaults.stabilize]
//! timeout_ms = 120000
//!
//! [resources.mq_user.retry]
//! max_attempts = 8
//!
//! [endpoints]
//! mq = "http://localhost:4566"
//! ```
//!
//! Durations are in milliseconds. Anything left out keeps the built-in
//! default, and per-resource sections override `[defaults]` field by field.

use anyhow::{Context, Result, bail};
use lifecycle::{ReconcileConfig, RetryPolicy, StabilizeConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(dir.join("mqform"))
}

// ============================================================================
// Tuning Sections
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrySettings {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub backoff_factor: Option<f64>,
    pub max_delay_ms: Option<u64>,
    pub jitter: Option<f64>,
    /// `0` disables the overall budget
    pub max_elapsed_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StabilizeSettings {
    pub timeout_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub backoff_factor: Option<f64>,
    pub max_poll_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tuning {
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub stabilize: StabilizeSettings,
}

impl RetrySettings {
    fn apply(&self, policy: &mut RetryPolicy) {
        if let Some(n) = self.max_attempts {
            policy.max_attempts = n;
        }
        if let Some(ms) = self.base_delay_ms {
            policy.base_delay = Duration::from_millis(ms);
        }
        if let Some(f) = self.backoff_factor {
            policy.backoff_factor = f;
        }
        if let Some(ms) = self.max_delay_ms {
            policy.max_delay = Duration::from_millis(ms);
        }
        if let Some(j) = self.jitter {
            policy.jitter = j;
        }
        if let Some(ms) = self.max_elapsed_ms {
            policy.max_elapsed = (ms > 0).then(|| Duration::from_millis(ms));
        }
    }

    fn validate(&self, section: &str) -> Result<()> {
        if self.max_attempts == Some(0) {
            bail!("{section}.max_attempts must be at least 1");
        }
        if let Some(f) = self.backoff_factor
            && !(f.is_finite() && f >= 1.0)
        {
            bail!("{section}.backoff_factor must be >= 1.0, got {f}");
        }
        if let Some(j) = self.jitter
            && !(0.0..=1.0).contains(&j)
        {
            bail!("{section}.jitter must be between 0.0 and 1.0, got {j}");
        }
        Ok(())
    }
}

impl StabilizeSettings {
    fn apply(&self, config: &mut StabilizeConfig) {
        if let Some(ms) = self.timeout_ms {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.poll_interval_ms {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(f) = self.backoff_factor {
            config.backoff_factor = f;
        }
        if let Some(ms) = self.max_poll_interval_ms {
            config.max_poll_interval = Duration::from_millis(ms);
        }
    }

    fn validate(&self, section: &str) -> Result<()> {
        if self.timeout_ms == Some(0) {
            bail!("{section}.timeout_ms must be greater than 0");
        }
        if self.poll_interval_ms == Some(0) {
            bail!("{section}.poll_interval_ms must be greater than 0");
        }
        if let Some(f) = self.backoff_factor
            && !(f.is_finite() && f >= 1.0)
        {
            bail!("{section}.backoff_factor must be >= 1.0, got {f}");
        }
        Ok(())
    }
}

impl Tuning {
    fn apply(&self, config: &mut ReconcileConfig) {
        self.retry.apply(&mut config.retry);
        self.stabilize.apply(&mut config.stabilize);
    }

    fn validate(&self, section: &str) -> Result<()> {
        self.retry.validate(&format!("{section}.retry"))?;
        self.stabilize.validate(&format!("{section}.stabilize"))
    }
}

// ============================================================================
// Provider Config
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// Tuning applied to every resource type
    #[serde(default)]
    pub defaults: Tuning,

    /// Per resource type overrides, keyed by type name
    #[serde(default)]
    pub resources: BTreeMap<String, Tuning>,

    /// Base endpoint per service, keyed by service name
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,

    /// Worker threads for parallel refresh; `None` uses the CPU count
    #[serde(default)]
    pub refresh_parallelism: Option<usize>,
}

impl ProviderConfig {
    /// Default config file path
    pub fn default_path() -> Result<PathBuf> {
        Ok(config_dir()?.join("config.toml"))
    }

    /// Load from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load from `path`, or return defaults if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Config file {} does not exist, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.defaults.validate("defaults")?;
        for (type_name, tuning) in &self.resources {
            if crate::registry::schema(type_name).is_err() {
                bail!("resources.{type_name}: unknown resource type");
            }
            tuning.validate(&format!("resources.{type_name}"))?;
        }
        for (service, endpoint) in &self.endpoints {
            if endpoint.trim().is_empty() {
                bail!("endpoints.{service} must not be empty");
            }
        }
        if self.refresh_parallelism == Some(0) {
            bail!("refresh_parallelism must be at least 1");
        }
        Ok(())
    }

    /// Tuning for one resource type: built-in defaults, then `[defaults]`,
    /// then `[resources.<type>]`
    pub fn reconcile_config(&self, type_name: &str) -> ReconcileConfig {
        let mut config = ReconcileConfig::default();
        self.defaults.apply(&mut config);
        if let Some(tuning) = self.resources.get(type_name) {
            tuning.apply(&mut config);
        }
        config
    }

    /// Endpoint override for a service
    pub fn endpoint(&self, service: &str) -> Option<&str> {
        self.endpoints.get(service).map(String::as_str)
    }

    /// Save to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}
