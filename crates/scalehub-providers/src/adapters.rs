//! Engine-facing adapters.
//!
//! The scaling engine asks for metrics by selector and for scale by target
//! name. These adapters resolve that back to the stored autoscaler, hand the
//! relevant backend config to the configured client, and shape the reply.

use std::sync::Arc;
use std::time::Instant;

use scalehub_state::{
    AUTOSCALER_SELECTOR, ObjectStore, Selector, StateError, encode_replicas,
};
use tracing::{debug, warn};

use crate::error::ProviderResult;
use crate::ports::*;

// ── Metrics ───────────────────────────────────────────────────────

pub struct MetricSource {
    store: ObjectStore,
    client: Arc<dyn MetricsClient>,
}

impl MetricSource {
    pub fn new(store: ObjectStore, client: Arc<dyn MetricsClient>) -> Self {
        Self { store, client }
    }

    /// Fetch an external metric for the autoscaler identified by `selector`.
    ///
    /// # Panics
    ///
    /// If `selector` was not produced by the autoscaler selector codec.
    pub async fn get_external_metric(
        &self,
        metric_name: &str,
        namespace: &str,
        selector: &Selector,
    ) -> ProviderResult<MetricSample> {
        let autoscaler = AUTOSCALER_SELECTOR.decode(selector);
        let record = self.store.get(&autoscaler, namespace)?;
        let config = record
            .spec
            .metrics
            .iter()
            .find(|m| m.name == metric_name)
            .and_then(|m| m.config.as_ref());

        let started = Instant::now();
        let sample = self
            .client
            .get_metric(metric_name, &autoscaler, namespace, config)
            .await;
        debug!(
            metric = %metric_name,
            %autoscaler,
            %namespace,
            elapsed_ms = started.elapsed().as_millis() as u64,
            failed = sample.is_err(),
            "external metric fetched"
        );
        Ok(sample?)
    }
}

// ── Scale ─────────────────────────────────────────────────────────

/// The scale of a target as the engine sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetScale {
    pub name: String,
    pub namespace: String,
    pub desired: u32,
    pub current: u32,
    /// `replicas=<current>`, decoded with [`scalehub_state::decode_replicas`].
    pub selector: Selector,
}

pub struct ScaleTarget {
    store: ObjectStore,
    client: Arc<dyn ScalingClient>,
}

impl ScaleTarget {
    pub fn new(store: ObjectStore, client: Arc<dyn ScalingClient>) -> Self {
        Self { store, client }
    }

    pub async fn get_scale(&self, namespace: &str, name: &str) -> ProviderResult<TargetScale> {
        let record = self.store.get(name, namespace)?;
        let started = Instant::now();
        let scale = self
            .client
            .get_scale(name, namespace, record.spec.target.as_ref())
            .await?;
        debug!(
            %name,
            %namespace,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ?scale,
            "scale fetched"
        );

        let (spec, status) = match (scale.spec, scale.status) {
            (Some(spec), Some(status)) => (spec, status),
            (spec, _) => {
                let missing = if spec.is_none() { "spec" } else { "status" };
                return Err(StateError::Invalid(format!(
                    "scale for {namespace}/{name} has no {missing}"
                ))
                .into());
            }
        };

        Ok(TargetScale {
            name: name.to_string(),
            namespace: namespace.to_string(),
            desired: spec.desired,
            current: status.current,
            selector: encode_replicas(status.current),
        })
    }

    pub async fn update_scale(&self, namespace: &str, name: &str, desired: u32) -> ProviderResult<()> {
        let record = self.store.get(name, namespace)?;
        let started = Instant::now();
        let result = self
            .client
            .set_scale_target(name, namespace, record.spec.target.as_ref(), desired)
            .await;
        debug!(
            %name,
            %namespace,
            desired,
            elapsed_ms = started.elapsed().as_millis() as u64,
            failed = result.is_err(),
            "scale target set"
        );
        Ok(result?)
    }
}

// ── Events ────────────────────────────────────────────────────────

/// Forwards engine events to the configured creator, if any. Delivery
/// failures are logged and otherwise dropped.
#[derive(Clone, Default)]
pub struct EventRecorder {
    creator: Option<Arc<dyn EventCreator>>,
}

impl EventRecorder {
    pub fn new(creator: Option<Arc<dyn EventCreator>>) -> Self {
        Self { creator }
    }

    pub async fn record(&self, name: &str, namespace: &str, event: &Event) {
        let Some(creator) = &self.creator else {
            return;
        };
        if let Err(e) = creator.create(name, namespace, event).await {
            warn!(%name, %namespace, reason = %event.reason, error = %e, "failed to record event");
        }
    }
}
