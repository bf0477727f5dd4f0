//! Engine-facing projection of an autoscaler record.
//!
//! The scaling engine speaks a fixed vocabulary: scale target references,
//! external metrics identified by name and selector, string-typed policy
//! and condition names. [`AutoscalerView::derive`] maps a stored record into
//! that shape; [`ViewStatus::to_status`] maps the engine's status write-back
//! the other way. Derivation is pure, so a view never holds state the record
//! doesn't.

use serde::{Deserialize, Serialize};

use crate::error::{StateError, StateResult};
use crate::selector::{AUTOSCALER_SELECTOR, Selector};
use crate::types::*;

/// Kind reported in every scale target reference.
pub const SCALE_TARGET_KIND: &str = "Scalable";

/// API version reported in every scale target reference.
pub const SCALE_TARGET_API_VERSION: &str = "scalehub.io/v1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoscalerView {
    pub name: String,
    pub namespace: String,
    /// The record's version at derivation time.
    pub resource_version: u64,
    pub spec: ViewSpec,
    pub status: ViewStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewSpec {
    pub scale_target_ref: ScaleTargetRef,
    pub min_replicas: Option<u32>,
    pub max_replicas: u32,
    pub metrics: Vec<ExternalMetric>,
    pub behavior: Option<ViewBehavior>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScaleTargetRef {
    pub kind: String,
    pub api_version: String,
    pub name: String,
}

/// A metric the engine fetches through the metric seam.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalMetric {
    pub name: String,
    /// Identifies the owning autoscaler to the metric adapter.
    pub selector: Selector,
    pub target_value: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewBehavior {
    pub scale_up: Option<ViewScalingRules>,
    pub scale_down: Option<ViewScalingRules>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewScalingRules {
    pub stabilization_window_seconds: Option<u32>,
    /// `Max`, `Min` or `Disabled`.
    pub select_policy: String,
    pub policies: Vec<ViewScalingPolicy>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewScalingPolicy {
    /// `Percent` or `Pods`.
    pub policy_type: String,
    pub value: u32,
    pub period_seconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ViewStatus {
    pub current_replicas: u32,
    pub desired_replicas: u32,
    pub conditions: Vec<ViewCondition>,
    pub last_scale_time: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewCondition {
    pub condition_type: String,
    pub status: String,
    pub last_transition_time: u64,
    pub reason: String,
    pub message: String,
}

impl AutoscalerView {
    /// Project a record into the engine's shape.
    ///
    /// Fails with [`StateError::Invalid`] when the record lacks a name, a
    /// namespace, or any metric.
    pub fn derive(record: &AutoscalerRecord) -> StateResult<Self> {
        let spec = &record.spec;
        if spec.name.is_empty() {
            return Err(StateError::Invalid("name is required".to_string()));
        }
        if spec.namespace.is_empty() {
            return Err(StateError::Invalid(format!(
                "namespace is required for {}",
                spec.name
            )));
        }
        if spec.metrics.is_empty() {
            return Err(StateError::Invalid(format!("no metrics for {}", spec.key())));
        }

        let metrics = spec
            .metrics
            .iter()
            .map(|m| ExternalMetric {
                name: m.name.clone(),
                selector: AUTOSCALER_SELECTOR.encode(&spec.name),
                target_value: m.target,
            })
            .collect();

        let behavior = spec.behavior.as_ref().map(|b| ViewBehavior {
            scale_up: b.scale_up.as_ref().map(view_rules),
            scale_down: b.scale_down.as_ref().map(view_rules),
        });

        Ok(Self {
            name: spec.name.clone(),
            namespace: spec.namespace.clone(),
            resource_version: record.version,
            spec: ViewSpec {
                scale_target_ref: ScaleTargetRef {
                    kind: SCALE_TARGET_KIND.to_string(),
                    api_version: SCALE_TARGET_API_VERSION.to_string(),
                    name: spec.name.clone(),
                },
                min_replicas: spec.min_replicas,
                max_replicas: spec.max_replicas,
                metrics,
                behavior,
            },
            status: ViewStatus::from(&record.status),
        })
    }

    pub fn key(&self) -> AutoscalerKey {
        AutoscalerKey::new(&self.namespace, &self.name)
    }
}

fn view_rules(rules: &ScalingRules) -> ViewScalingRules {
    let select_policy = match rules.select_policy {
        SelectPolicy::Max => "Max",
        SelectPolicy::Min => "Min",
        SelectPolicy::Disabled => "Disabled",
    };
    ViewScalingRules {
        stabilization_window_seconds: rules.stabilization_window_secs,
        select_policy: select_policy.to_string(),
        policies: rules
            .policies
            .iter()
            .map(|p| ViewScalingPolicy {
                policy_type: match p.kind {
                    PolicyKind::Percent => "Percent",
                    PolicyKind::Units => "Pods",
                }
                .to_string(),
                value: p.value,
                period_seconds: p.period_secs,
            })
            .collect(),
    }
}

impl From<&AutoscalerStatus> for ViewStatus {
    fn from(status: &AutoscalerStatus) -> Self {
        Self {
            current_replicas: status.current_scale.unwrap_or_default(),
            desired_replicas: status.desired_scale,
            conditions: status
                .conditions
                .iter()
                .map(|c| ViewCondition {
                    condition_type: c.condition_type.as_str().to_string(),
                    status: c.status.clone(),
                    last_transition_time: c.last_transition_time,
                    reason: c.reason.clone(),
                    message: c.message.clone(),
                })
                .collect(),
            last_scale_time: (status.last_scale_time > 0).then_some(status.last_scale_time),
        }
    }
}

impl ViewStatus {
    /// Translate the engine's status back into the stored form.
    pub fn to_status(&self) -> StateResult<AutoscalerStatus> {
        let conditions = self
            .conditions
            .iter()
            .map(|c| {
                Ok(Condition {
                    condition_type: c.condition_type.parse()?,
                    status: c.status.clone(),
                    last_transition_time: c.last_transition_time,
                    reason: c.reason.clone(),
                    message: c.message.clone(),
                })
            })
            .collect::<StateResult<Vec<_>>>()?;

        Ok(AutoscalerStatus {
            current_scale: Some(self.current_replicas),
            desired_scale: self.desired_replicas,
            conditions,
            last_scale_time: self.last_scale_time.unwrap_or_default(),
        })
    }
}
