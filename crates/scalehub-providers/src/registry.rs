//! ProviderRegistry — type id → backend factory, per seam.
//!
//! Built once at startup from a [`ProviderRegistryBuilder`] and read-only
//! afterwards. Duplicate type ids are caught by
//! [`ProviderRegistryBuilder::build`]; callers treat that as fatal.

use std::collections::HashMap;
use std::sync::Arc;

use scalehub_core::TypedConfig;
use tracing::{debug, info};

use crate::builtin;
use crate::error::{ProviderError, ProviderKind, ProviderResult};
use crate::ports::*;

#[derive(Default)]
pub struct ProviderRegistryBuilder {
    storage: Vec<(String, Arc<dyn StorageFactory>)>,
    metrics: Vec<(String, Arc<dyn MetricsFactory>)>,
    scaling: Vec<(String, Arc<dyn ScalingFactory>)>,
    events: Vec<(String, Arc<dyn EventsFactory>)>,
}

impl ProviderRegistryBuilder {
    pub fn register_storage(
        mut self,
        type_id: impl Into<String>,
        factory: impl StorageFactory + 'static,
    ) -> Self {
        self.storage.push((type_id.into(), Arc::new(factory)));
        self
    }

    pub fn register_metrics(
        mut self,
        type_id: impl Into<String>,
        factory: impl MetricsFactory + 'static,
    ) -> Self {
        self.metrics.push((type_id.into(), Arc::new(factory)));
        self
    }

    pub fn register_scaling(
        mut self,
        type_id: impl Into<String>,
        factory: impl ScalingFactory + 'static,
    ) -> Self {
        self.scaling.push((type_id.into(), Arc::new(factory)));
        self
    }

    pub fn register_events(
        mut self,
        type_id: impl Into<String>,
        factory: impl EventsFactory + 'static,
    ) -> Self {
        self.events.push((type_id.into(), Arc::new(factory)));
        self
    }

    /// Register the providers that ship with scalehub.
    pub fn with_builtins(self) -> Self {
        let sim = builtin::sim::SimProvider::default();
        self.register_storage(builtin::inline::TYPE_ID, builtin::inline::InlineFactory)
            .register_events(builtin::log_events::TYPE_ID, builtin::log_events::LogEventsFactory)
            .register_metrics(builtin::sim::TYPE_ID, sim.clone())
            .register_scaling(builtin::sim::TYPE_ID, sim)
    }

    /// Index every registration, failing on the first type id claimed twice
    /// within a seam.
    pub fn build(self) -> ProviderResult<ProviderRegistry> {
        let registry = ProviderRegistry {
            storage: index(ProviderKind::Storage, self.storage)?,
            metrics: index(ProviderKind::Metrics, self.metrics)?,
            scaling: index(ProviderKind::Scaling, self.scaling)?,
            events: index(ProviderKind::Events, self.events)?,
        };
        info!(
            storage = registry.storage.len(),
            metrics = registry.metrics.len(),
            scaling = registry.scaling.len(),
            events = registry.events.len(),
            "provider registry built"
        );
        Ok(registry)
    }
}

fn index<F: ?Sized>(
    kind: ProviderKind,
    entries: Vec<(String, Arc<F>)>,
) -> ProviderResult<HashMap<String, Arc<F>>> {
    let mut map = HashMap::with_capacity(entries.len());
    for (type_id, factory) in entries {
        if map.contains_key(&type_id) {
            return Err(ProviderError::DuplicateRegistration { kind, type_id });
        }
        map.insert(type_id, factory);
    }
    Ok(map)
}

/// Read-only lookup from typed configuration to constructed backends.
pub struct ProviderRegistry {
    storage: HashMap<String, Arc<dyn StorageFactory>>,
    metrics: HashMap<String, Arc<dyn MetricsFactory>>,
    scaling: HashMap<String, Arc<dyn ScalingFactory>>,
    events: HashMap<String, Arc<dyn EventsFactory>>,
}

impl ProviderRegistry {
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::default()
    }

    /// A registry holding only the built-in providers.
    pub fn builtin() -> ProviderResult<Self> {
        Self::builder().with_builtins().build()
    }

    pub fn resolve_storage(&self, config: &TypedConfig) -> ProviderResult<Arc<dyn StorageProvider>> {
        lookup(ProviderKind::Storage, &self.storage, config)?.create(config)
    }

    pub fn resolve_metrics(&self, config: &TypedConfig) -> ProviderResult<Arc<dyn MetricsClient>> {
        lookup(ProviderKind::Metrics, &self.metrics, config)?.create(config)
    }

    pub fn resolve_scaling(&self, config: &TypedConfig) -> ProviderResult<Arc<dyn ScalingClient>> {
        lookup(ProviderKind::Scaling, &self.scaling, config)?.create(config)
    }

    pub fn resolve_events(&self, config: &TypedConfig) -> ProviderResult<Arc<dyn EventCreator>> {
        lookup(ProviderKind::Events, &self.events, config)?.create(config)
    }

    /// Registered type ids for a seam, sorted.
    pub fn type_ids(&self, kind: ProviderKind) -> Vec<&str> {
        let mut ids: Vec<&str> = match kind {
            ProviderKind::Storage => self.storage.keys().map(String::as_str).collect(),
            ProviderKind::Metrics => self.metrics.keys().map(String::as_str).collect(),
            ProviderKind::Scaling => self.scaling.keys().map(String::as_str).collect(),
            ProviderKind::Events => self.events.keys().map(String::as_str).collect(),
        };
        ids.sort_unstable();
        ids
    }
}

fn lookup<'a, F: ?Sized>(
    kind: ProviderKind,
    factories: &'a HashMap<String, Arc<F>>,
    config: &TypedConfig,
) -> ProviderResult<&'a Arc<F>> {
    let factory = factories
        .get(&config.type_id)
        .ok_or_else(|| ProviderError::NotRegistered {
            kind,
            type_id: config.type_id.clone(),
        })?;
    debug!(%kind, type_id = %config.type_id, "resolving provider");
    Ok(factory)
}
