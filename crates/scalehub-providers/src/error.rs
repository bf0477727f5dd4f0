//! Error types for provider resolution and backend calls.

use std::fmt;

use scalehub_core::ConfigError;
use scalehub_state::StateError;
use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

/// The four backend seams a provider can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Storage,
    Metrics,
    Scaling,
    Events,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Storage => "storage",
            ProviderKind::Metrics => "metrics",
            ProviderKind::Scaling => "scaling",
            ProviderKind::Events => "events",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no {kind} provider registered for type {type_id:?}")]
    NotRegistered { kind: ProviderKind, type_id: String },

    /// Two providers claimed the same type id. A wiring defect; startup
    /// must not continue.
    #[error("{kind} provider {type_id:?} registered more than once")]
    DuplicateRegistration { kind: ProviderKind, type_id: String },

    #[error("no {0} provider configured")]
    Unconfigured(ProviderKind),

    #[error("invalid {kind} config for {type_id:?}: {reason}")]
    InvalidConfig {
        kind: ProviderKind,
        type_id: String,
        reason: String,
    },

    #[error("backend error: {0:#}")]
    Backend(#[from] anyhow::Error),

    #[error(transparent)]
    State(#[from] StateError),
}

impl ProviderError {
    pub fn invalid_config(
        kind: ProviderKind,
        type_id: impl Into<String>,
        reason: impl fmt::Display,
    ) -> Self {
        ProviderError::InvalidConfig {
            kind,
            type_id: type_id.into(),
            reason: reason.to_string(),
        }
    }

    /// Map a payload decode failure to [`ProviderError::InvalidConfig`].
    pub fn from_config(kind: ProviderKind, err: ConfigError) -> Self {
        match err {
            ConfigError::Decode { type_id, reason } => ProviderError::InvalidConfig {
                kind,
                type_id,
                reason,
            },
            other => ProviderError::InvalidConfig {
                kind,
                type_id: String::new(),
                reason: other.to_string(),
            },
        }
    }

    pub fn is_not_registered(&self) -> bool {
        matches!(self, ProviderError::NotRegistered { .. })
    }
}
