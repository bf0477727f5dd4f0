//! Scale observer — keeps each autoscaler's status in line with its target.
//!
//! On every tick, for each stored autoscaler: fetch the target's scale, sample
//! its metrics, and write the observed replica counts back through the status
//! sink when they changed. Failures become `Warning` events. No scaling
//! decisions are made here.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use scalehub_providers::{Backends, Event, EventRecorder, EventType, MetricSource, ScaleTarget};
use scalehub_state::{AutoscalerView, NAMESPACE_ALL, ObjectStore};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub struct ScaleObserver {
    store: ObjectStore,
    metrics: MetricSource,
    scale: ScaleTarget,
    events: EventRecorder,
    workers: usize,
}

impl ScaleObserver {
    pub fn new(backends: &Backends, store: ObjectStore, workers: usize) -> Self {
        Self {
            metrics: backends.metric_source(store.clone()),
            scale: backends.scale_target(store.clone()),
            events: backends.event_recorder(),
            store,
            workers: workers.max(1),
        }
    }

    /// Observe every stored autoscaler, at most `workers` at a time.
    /// Returns how many statuses were written.
    pub async fn observe_all(self: &Arc<Self>) -> usize {
        let permits = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for view in self.store.list(NAMESPACE_ALL) {
            let observer = Arc::clone(self);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok()?;
                let key = view.key();
                match observer.observe(view).await {
                    Ok(written) => Some(written),
                    Err(e) => {
                        warn!(%key, error = %e, "observation failed");
                        None
                    }
                }
            });
        }

        let mut written = 0;
        while let Some(result) = tasks.join_next().await {
            if let Ok(Some(true)) = result {
                written += 1;
            }
        }
        written
    }

    async fn observe(&self, view: AutoscalerView) -> anyhow::Result<bool> {
        let scale = match self.scale.get_scale(&view.namespace, &view.name).await {
            Ok(scale) => scale,
            Err(e) => {
                self.warn_event(&view, "FailedGetScale", e.to_string()).await;
                return Err(e.into());
            }
        };

        for metric in &view.spec.metrics {
            match self
                .metrics
                .get_external_metric(&metric.name, &view.namespace, &metric.selector)
                .await
            {
                Ok(sample) => debug!(
                    key = %view.key(),
                    metric = %metric.name,
                    values = ?sample.values,
                    target = metric.target_value,
                    "metric sampled"
                ),
                Err(e) => {
                    self.warn_event(&view, "FailedGetExternalMetric", e.to_string())
                        .await
                }
            }
        }

        if view.status.current_replicas == scale.current
            && view.status.desired_replicas == scale.desired
        {
            return Ok(false);
        }

        let mut observed = view;
        observed.status.current_replicas = scale.current;
        observed.status.desired_replicas = scale.desired;
        let stored = self
            .store
            .status_sink(&observed.namespace)
            .update_status(&observed)?;
        debug!(
            key = %stored.key(),
            current = scale.current,
            desired = scale.desired,
            version = stored.resource_version,
            "observed scale written"
        );
        Ok(true)
    }

    async fn warn_event(&self, view: &AutoscalerView, reason: &str, message: String) {
        let now = epoch_secs();
        let event = Event {
            reason: reason.to_string(),
            message,
            first_timestamp: now,
            last_timestamp: now,
            count: 1,
            event_type: EventType::Warning,
            action: String::new(),
        };
        self.events.record(&view.name, &view.namespace, &event).await;
    }

    /// Observe on every `interval` until shutdown.
    pub async fn run(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = interval.as_secs(),
            workers = self.workers,
            "scale observer started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    let written = self.observe_all().await;
                    debug!(written, "observation pass complete");
                }
                _ = shutdown.changed() => {
                    info!("scale observer shutting down");
                    break;
                }
            }
        }
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
