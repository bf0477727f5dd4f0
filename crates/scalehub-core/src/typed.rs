//! Type-discriminated opaque backend configuration.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// An opaque configuration payload tagged with the type identifier of the
/// backend that understands it.
///
/// ```toml
/// [metrics]
/// type = "sim"
/// config = { metric_name = "load" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TypedConfig {
    /// Stable identifier used to look the backend factory up in a registry.
    #[serde(rename = "type")]
    pub type_id: String,
    /// Backend-specific payload. Absent means "no settings".
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub config: serde_json::Value,
}

impl TypedConfig {
    pub fn new(type_id: impl Into<String>, config: serde_json::Value) -> Self {
        Self {
            type_id: type_id.into(),
            config,
        }
    }

    /// A config with no payload.
    pub fn bare(type_id: impl Into<String>) -> Self {
        Self::new(type_id, serde_json::Value::Null)
    }

    /// Decode the payload into the backend's own settings type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        serde_json::from_value(self.config.clone()).map_err(|e| ConfigError::Decode {
            type_id: self.type_id.clone(),
            reason: e.to_string(),
        })
    }
}
