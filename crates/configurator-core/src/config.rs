//! Runtime configuration for the configuration store.
//!
//! Every field has a default, so an empty TOML document is a valid config.

use crate::error::{ConfiguratorError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub store: StoreSettings,
    pub logging: LoggingSettings,
}

/// Timing of the store's background maintenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Debounce of the attribute-family sweep after a configuration change.
    pub family_cleanup_delay_ms: u64,
    /// Period of the watcher-subscription sweep.
    pub subscription_sweep_interval_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            family_cleanup_delay_ms: 30_000,
            subscription_sweep_interval_ms: 30_000,
        }
    }
}

impl StoreSettings {
    pub fn family_cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.family_cleanup_delay_ms)
    }

    pub fn subscription_sweep_interval(&self) -> Duration {
        Duration::from_millis(self.subscription_sweep_interval_ms)
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive, overridden by `RUST_LOG` when set.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl RuntimeConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ConfiguratorError::config(format!(
                "Failed to read configuration file at {}: {}",
                path.display(),
                e
            ))
        })?;
        tracing::debug!("[RuntimeConfig] Loaded {}", path.display());
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.store.family_cleanup_delay_ms == 0 {
            return Err(ConfiguratorError::config(
                "store.family_cleanup_delay_ms must be greater than zero",
            ));
        }
        if self.store.subscription_sweep_interval_ms == 0 {
            return Err(ConfiguratorError::config(
                "store.subscription_sweep_interval_ms must be greater than zero",
            ));
        }
        Ok(())
    }
}
