//! scalehub.toml controller configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::typed::TypedConfig;

/// Errors raised while loading or decoding configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("no {0} client specified")]
    Missing(&'static str),

    #[error("invalid config for {type_id}: {reason}")]
    Decode { type_id: String, reason: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level daemon configuration.
///
/// One [`TypedConfig`] per seam selects the backend; the scalar fields are
/// tuning knobs handed through to the scaling engine untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub storage: Option<TypedConfig>,
    pub metrics: Option<TypedConfig>,
    pub scaling: Option<TypedConfig>,
    pub events: Option<TypedConfig>,
    #[serde(default = "default_resync_period_secs")]
    pub resync_period_secs: u64,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_downscale_stabilization_secs")]
    pub downscale_stabilization_secs: u64,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub store: StoreTuning,
}

/// Object store tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreTuning {
    /// Events buffered per watch subscriber before the overflow policy applies.
    #[serde(default = "default_watch_queue_capacity")]
    pub watch_queue_capacity: usize,
    #[serde(default)]
    pub watch_overflow: WatchOverflow,
}

/// What happens when a watch subscriber's queue is full.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WatchOverflow {
    /// Close the subscription; the consumer must re-list and re-watch.
    #[default]
    Disconnect,
    /// Discard the event that did not fit and keep the subscription open.
    DropNewest,
}

impl Default for StoreTuning {
    fn default() -> Self {
        Self {
            watch_queue_capacity: default_watch_queue_capacity(),
            watch_overflow: WatchOverflow::default(),
        }
    }
}

fn default_resync_period_secs() -> u64 {
    15
}

fn default_tolerance() -> f64 {
    0.1
}

fn default_downscale_stabilization_secs() -> u64 {
    300
}

fn default_workers() -> usize {
    1
}

fn default_watch_queue_capacity() -> usize {
    256
}

impl ControllerConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check that every required seam is configured and scalars are sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.is_none() {
            return Err(ConfigError::Missing("storage"));
        }
        if self.metrics.is_none() {
            return Err(ConfigError::Missing("metrics"));
        }
        if self.scaling.is_none() {
            return Err(ConfigError::Missing("scaling"));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be > 0".to_string()));
        }
        if self.store.watch_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "store.watch_queue_capacity must be > 0".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.tolerance) {
            return Err(ConfigError::Invalid(format!(
                "tolerance must be in [0, 1): {}",
                self.tolerance
            )));
        }
        Ok(())
    }

    pub fn resync_period(&self) -> Duration {
        Duration::from_secs(self.resync_period_secs)
    }

    pub fn downscale_stabilization(&self) -> Duration {
        Duration::from_secs(self.downscale_stabilization_secs)
    }
}

impl std::str::FromStr for ControllerConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: ControllerConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}
