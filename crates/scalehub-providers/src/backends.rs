//! Backends — the resolved set of providers for one controller config.

use std::sync::Arc;

use scalehub_core::{ControllerConfig, TypedConfig};
use scalehub_state::{AutoscalerRecord, ObjectStore, StatusHandler};
use tracing::info;

use crate::adapters::{EventRecorder, MetricSource, ScaleTarget};
use crate::error::{ProviderError, ProviderKind, ProviderResult};
use crate::ports::*;
use crate::registry::ProviderRegistry;
use crate::sync::StorageSync;

pub struct Backends {
    pub storage: Arc<dyn StorageProvider>,
    pub metrics: Arc<dyn MetricsClient>,
    pub scaling: Arc<dyn ScalingClient>,
    pub events: Option<Arc<dyn EventCreator>>,
}

impl Backends {
    /// Resolve every configured seam. Metrics resolve before scaling so a
    /// scaling provider may build on its metrics counterpart.
    pub fn resolve(registry: &ProviderRegistry, config: &ControllerConfig) -> ProviderResult<Self> {
        let storage = registry.resolve_storage(required(ProviderKind::Storage, &config.storage)?)?;
        let metrics = registry.resolve_metrics(required(ProviderKind::Metrics, &config.metrics)?)?;
        let scaling = registry.resolve_scaling(required(ProviderKind::Scaling, &config.scaling)?)?;
        let events = config
            .events
            .as_ref()
            .map(|c| registry.resolve_events(c))
            .transpose()?;

        info!(
            storage = %type_id(&config.storage),
            metrics = %type_id(&config.metrics),
            scaling = %type_id(&config.scaling),
            events = %type_id(&config.events),
            "backends resolved"
        );
        Ok(Self {
            storage,
            metrics,
            scaling,
            events,
        })
    }

    /// A store tuned by `config` that reports status write-backs to the
    /// storage provider.
    pub fn object_store(&self, config: &ControllerConfig) -> ObjectStore {
        ObjectStore::builder()
            .tuning(config.store.clone())
            .status_handler(Arc::new(StorageStatus(Arc::clone(&self.storage))))
            .build()
    }

    pub fn storage_sync(&self, store: ObjectStore) -> StorageSync {
        StorageSync::new(Arc::clone(&self.storage), store)
    }

    pub fn metric_source(&self, store: ObjectStore) -> MetricSource {
        MetricSource::new(store, Arc::clone(&self.metrics))
    }

    pub fn scale_target(&self, store: ObjectStore) -> ScaleTarget {
        ScaleTarget::new(store, Arc::clone(&self.scaling))
    }

    pub fn event_recorder(&self) -> EventRecorder {
        EventRecorder::new(self.events.clone())
    }
}

/// Routes store status notifications to the storage provider.
struct StorageStatus(Arc<dyn StorageProvider>);

impl StatusHandler for StorageStatus {
    fn status_updated(&self, record: &AutoscalerRecord) {
        self.0.status_updated(record);
    }
}

fn required(kind: ProviderKind, section: &Option<TypedConfig>) -> ProviderResult<&TypedConfig> {
    section.as_ref().ok_or(ProviderError::Unconfigured(kind))
}

fn type_id(section: &Option<TypedConfig>) -> &str {
    section.as_ref().map_or("none", |c| c.type_id.as_str())
}
