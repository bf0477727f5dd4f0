//! `sim` metrics and scaling providers.
//!
//! Replays a configured load curve per autoscaler and reports it as a single
//! metric: average load per instance as a percentage of
//! `max_load_per_instance`, in thousandths. The scaling half owns the
//! instance count, so every scale change moves the metric. Both halves share
//! one backend; the metrics half must be resolved first.
//!
//! ```toml
//! [metrics]
//! type = "sim"
//!
//! [metrics.config]
//! metric_name = "load"
//!
//! [[metrics.config.autoscalers]]
//! autoscaler_name = "api"
//! autoscaler_namespace = "default"
//! max_load_per_instance = 50.0
//! load = [{ timespan_ms = 60000, load = 100.0 }, { timespan_ms = 60000, load = 400.0 }]
//!
//! [scaling]
//! type = "sim"
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use scalehub_core::TypedConfig;
use scalehub_state::AutoscalerKey;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderKind, ProviderResult};
use crate::ports::*;

pub const TYPE_ID: &str = "sim";

// ── Config ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct SimConfig {
    pub metric_name: String,
    pub autoscalers: Vec<SimAutoscalerConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimAutoscalerConfig {
    pub autoscaler_name: String,
    #[serde(default)]
    pub autoscaler_namespace: String,
    pub max_load_per_instance: f64,
    pub load: Vec<LoadSegment>,
}

/// Constant load held for `timespan_ms`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LoadSegment {
    pub timespan_ms: u64,
    pub load: f64,
}

// ── Factory ───────────────────────────────────────────────────────

/// Registered under `sim` for both metrics and scaling; clones share the
/// backend built by the first metrics resolution.
#[derive(Clone, Default)]
pub struct SimProvider {
    backend: Arc<Mutex<Option<Arc<SimBackend>>>>,
}

impl MetricsFactory for SimProvider {
    fn create(&self, config: &TypedConfig) -> ProviderResult<Arc<dyn MetricsClient>> {
        let mut slot = self.backend.lock().expect("sim lock");
        if let Some(backend) = slot.as_ref() {
            let client: Arc<dyn MetricsClient> = backend.clone();
            return Ok(client);
        }

        let sim: SimConfig = config
            .decode()
            .map_err(|e| ProviderError::from_config(ProviderKind::Metrics, e))?;
        let backend = Arc::new(
            SimBackend::new(sim)
                .map_err(|e| ProviderError::invalid_config(ProviderKind::Metrics, TYPE_ID, e))?,
        );
        *slot = Some(Arc::clone(&backend));
        info!(metric = %backend.metric_name, autoscalers = backend.targets.len(), "sim backend configured");

        let client: Arc<dyn MetricsClient> = backend;
        Ok(client)
    }
}

impl ScalingFactory for SimProvider {
    fn create(&self, _config: &TypedConfig) -> ProviderResult<Arc<dyn ScalingClient>> {
        let slot = self.backend.lock().expect("sim lock");
        match slot.as_ref() {
            Some(backend) => {
                let client: Arc<dyn ScalingClient> = backend.clone();
                Ok(client)
            }
            None => Err(ProviderError::invalid_config(
                ProviderKind::Scaling,
                TYPE_ID,
                "sim metrics provider has not been configured",
            )),
        }
    }
}

// ── Backend ───────────────────────────────────────────────────────

struct SimTarget {
    max_load_per_instance: f64,
    load: Vec<LoadSegment>,
    total: Duration,
}

impl SimTarget {
    /// Load of the segment active at `elapsed` into the repeating curve.
    fn load_at(&self, elapsed: Duration) -> f64 {
        let offset = elapsed.as_millis() % self.total.as_millis();
        let mut start = 0u128;
        for segment in &self.load {
            start += u128::from(segment.timespan_ms);
            if offset < start {
                return segment.load;
            }
        }
        // offset < total, so some segment always matched
        self.load.last().map(|s| s.load).unwrap_or_default()
    }
}

pub struct SimBackend {
    metric_name: String,
    targets: HashMap<AutoscalerKey, SimTarget>,
    instances: Mutex<HashMap<AutoscalerKey, u32>>,
    started: Instant,
}

impl SimBackend {
    pub fn new(config: SimConfig) -> anyhow::Result<Self> {
        if config.metric_name.is_empty() {
            bail!("metric name must be provided");
        }
        if config.autoscalers.is_empty() {
            bail!("no autoscaler configurations specified");
        }

        let mut targets = HashMap::new();
        for a in config.autoscalers {
            let key = AutoscalerKey::new(&a.autoscaler_namespace, &a.autoscaler_name);
            if a.autoscaler_name.is_empty() {
                bail!("autoscaler name cannot be empty (namespace {:?})", a.autoscaler_namespace);
            }
            if a.max_load_per_instance <= 0.0 {
                bail!("max load per instance must be > 0 for {key}");
            }
            if a.load.is_empty() {
                bail!("no load specified for {key}");
            }
            if a.load.iter().any(|s| s.timespan_ms == 0) {
                bail!("timespan cannot be 0 for {key}");
            }
            let total = Duration::from_millis(a.load.iter().map(|s| s.timespan_ms).sum());
            targets.insert(
                key,
                SimTarget {
                    max_load_per_instance: a.max_load_per_instance,
                    load: a.load,
                    total,
                },
            );
        }

        let instances = targets.keys().map(|k| (k.clone(), 1)).collect();
        Ok(Self {
            metric_name: config.metric_name,
            targets,
            instances: Mutex::new(instances),
            started: Instant::now(),
        })
    }

    fn target(&self, key: &AutoscalerKey) -> anyhow::Result<&SimTarget> {
        self.targets
            .get(key)
            .ok_or_else(|| anyhow!("sim autoscaler {key} not configured"))
    }

    pub fn instances(&self, key: &AutoscalerKey) -> anyhow::Result<u32> {
        self.target(key)?;
        let instances = self.instances.lock().expect("sim lock");
        Ok(instances.get(key).copied().unwrap_or_default())
    }

    /// Metric values `elapsed` into the simulation.
    pub fn values_at(&self, key: &AutoscalerKey, elapsed: Duration) -> anyhow::Result<Vec<i64>> {
        let target = self.target(key)?;
        let instances = self.instances(key)?;
        if instances == 0 {
            return Ok(Vec::new());
        }
        let load = target.load_at(elapsed);
        let percent = (100.0 * (load / f64::from(instances)) / target.max_load_per_instance) as i64;
        Ok(vec![percent * 1000])
    }
}

#[async_trait]
impl MetricsClient for SimBackend {
    async fn get_metric(
        &self,
        metric_name: &str,
        autoscaler: &str,
        namespace: &str,
        _config: Option<&TypedConfig>,
    ) -> anyhow::Result<MetricSample> {
        if metric_name != self.metric_name {
            bail!("invalid metric name: {metric_name} != {}", self.metric_name);
        }
        let key = AutoscalerKey::new(namespace, autoscaler);
        let values = self.values_at(&key, self.started.elapsed())?;
        debug!(%key, ?values, "sim metric");
        Ok(MetricSample {
            values,
            timestamp: SystemTime::now(),
        })
    }
}

#[async_trait]
impl ScalingClient for SimBackend {
    async fn get_scale(
        &self,
        name: &str,
        namespace: &str,
        _target: Option<&TypedConfig>,
    ) -> anyhow::Result<Scale> {
        let count = self.instances(&AutoscalerKey::new(namespace, name))?;
        Ok(Scale::new(count, count))
    }

    async fn set_scale_target(
        &self,
        name: &str,
        namespace: &str,
        _target: Option<&TypedConfig>,
        desired: u32,
    ) -> anyhow::Result<()> {
        let key = AutoscalerKey::new(namespace, name);
        self.target(&key)?;
        self.instances
            .lock()
            .expect("sim lock")
            .insert(key.clone(), desired);
        info!(%key, desired, "sim instances set");
        Ok(())
    }
}
