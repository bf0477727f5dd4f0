//! Domain types for the scalehub autoscaler store.
//!
//! An [`AutoscalerRecord`] is the stored unit: the declared
//! [`AutoscalerSpec`], the [`AutoscalerStatus`] written back by the scaling
//! engine, and a store-assigned version. All types are serializable so
//! storage backends can declare autoscalers inline in their configuration.

use std::fmt;
use std::str::FromStr;

use scalehub_core::TypedConfig;
use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// Namespace value that selects every namespace.
pub const NAMESPACE_ALL: &str = "";

// ── Identity ──────────────────────────────────────────────────────

/// Unique identity of an autoscaler within the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AutoscalerKey {
    pub namespace: String,
    pub name: String,
}

impl AutoscalerKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for AutoscalerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

// ── Spec ──────────────────────────────────────────────────────────

/// Declared scaling configuration for one scalable target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoscalerSpec {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub min_replicas: Option<u32>,
    pub max_replicas: u32,
    /// Metrics evaluated by the engine, in declaration order.
    pub metrics: Vec<Metric>,
    /// Backend config identifying the thing to scale.
    #[serde(default)]
    pub target: Option<TypedConfig>,
    #[serde(default)]
    pub behavior: Option<Behavior>,
}

/// A metric the engine samples for an autoscaler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metric {
    pub name: String,
    /// Target value in whole units.
    pub target: i64,
    /// Backend-specific lookup settings, passed to the metrics provider.
    #[serde(default)]
    pub config: Option<TypedConfig>,
}

/// Scale-up and scale-down rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Behavior {
    #[serde(default)]
    pub scale_up: Option<ScalingRules>,
    #[serde(default)]
    pub scale_down: Option<ScalingRules>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingRules {
    /// Stabilization window in seconds.
    #[serde(default)]
    pub stabilization_window_secs: Option<u32>,
    #[serde(default)]
    pub select_policy: SelectPolicy,
    #[serde(default)]
    pub policies: Vec<ScalingPolicy>,
}

/// How the engine picks among several matching policies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectPolicy {
    #[default]
    Max,
    Min,
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingPolicy {
    pub kind: PolicyKind,
    pub value: u32,
    pub period_secs: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    Percent,
    Units,
}

impl AutoscalerSpec {
    pub fn key(&self) -> AutoscalerKey {
        AutoscalerKey::new(&self.namespace, &self.name)
    }
}

// ── Status ────────────────────────────────────────────────────────

/// Status computed by the scaling engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AutoscalerStatus {
    pub current_scale: Option<u32>,
    pub desired_scale: u32,
    pub conditions: Vec<Condition>,
    /// Unix timestamp (seconds) of the last scale operation, 0 if never.
    pub last_scale_time: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Condition {
    pub condition_type: ConditionType,
    pub status: String,
    /// Unix timestamp (seconds).
    pub last_transition_time: u64,
    pub reason: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConditionType {
    ScalingActive,
    ScalingLimited,
    AbleToScale,
}

impl ConditionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionType::ScalingActive => "ScalingActive",
            ConditionType::ScalingLimited => "ScalingLimited",
            ConditionType::AbleToScale => "AbleToScale",
        }
    }
}

impl FromStr for ConditionType {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ScalingActive" => Ok(ConditionType::ScalingActive),
            "ScalingLimited" => Ok(ConditionType::ScalingLimited),
            "AbleToScale" => Ok(ConditionType::AbleToScale),
            other => Err(StateError::Invalid(format!(
                "unexpected condition type: {other}"
            ))),
        }
    }
}

// ── Record ────────────────────────────────────────────────────────

/// The stored unit of state for one scalable target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoscalerRecord {
    pub spec: AutoscalerSpec,
    #[serde(default)]
    pub status: AutoscalerStatus,
    /// Assigned by the store on every mutation; ignored on input.
    #[serde(default)]
    pub version: u64,
}

impl AutoscalerRecord {
    pub fn new(spec: AutoscalerSpec) -> Self {
        Self {
            spec,
            status: AutoscalerStatus::default(),
            version: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn namespace(&self) -> &str {
        &self.spec.namespace
    }

    pub fn key(&self) -> AutoscalerKey {
        self.spec.key()
    }
}
