//! Backend ports.
//!
//! Each seam the scaling engine depends on is an object-safe trait; concrete
//! backends implement them and are constructed by a factory registered in
//! the [`ProviderRegistry`](crate::ProviderRegistry) under a stable type id.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use scalehub_core::TypedConfig;
use scalehub_state::{AutoscalerSpec, StatusHandler};
use serde::{Deserialize, Serialize};

use crate::error::ProviderResult;

// ── Metrics ───────────────────────────────────────────────────────

/// Metric values in fixed-point thousandths, with the sample time.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub values: Vec<i64>,
    pub timestamp: SystemTime,
}

#[async_trait]
pub trait MetricsClient: Send + Sync {
    /// Fetch `metric_name` for the autoscaler `autoscaler` in `namespace`.
    /// `config` is the metric's backend settings from the autoscaler spec.
    async fn get_metric(
        &self,
        metric_name: &str,
        autoscaler: &str,
        namespace: &str,
        config: Option<&TypedConfig>,
    ) -> anyhow::Result<MetricSample>;
}

// ── Scaling ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleSpec {
    pub desired: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleStatus {
    pub current: u32,
}

/// A backend's scale reply. Both halves are required; adapters reject a
/// reply missing either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Scale {
    pub spec: Option<ScaleSpec>,
    pub status: Option<ScaleStatus>,
}

impl Scale {
    pub fn new(desired: u32, current: u32) -> Self {
        Self {
            spec: Some(ScaleSpec { desired }),
            status: Some(ScaleStatus { current }),
        }
    }
}

#[async_trait]
pub trait ScalingClient: Send + Sync {
    async fn get_scale(
        &self,
        name: &str,
        namespace: &str,
        target: Option<&TypedConfig>,
    ) -> anyhow::Result<Scale>;

    async fn set_scale_target(
        &self,
        name: &str,
        namespace: &str,
        target: Option<&TypedConfig>,
        desired: u32,
    ) -> anyhow::Result<()>;
}

// ── Events ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum EventType {
    #[default]
    Normal,
    Warning,
}

/// An event the scaling engine emits about an autoscaler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub reason: String,
    pub message: String,
    /// Unix timestamp (seconds).
    pub first_timestamp: u64,
    /// Unix timestamp (seconds).
    pub last_timestamp: u64,
    pub count: u32,
    pub event_type: EventType,
    pub action: String,
}

#[async_trait]
pub trait EventCreator: Send + Sync {
    async fn create(&self, name: &str, namespace: &str, event: &Event) -> anyhow::Result<()>;
}

// ── Storage ───────────────────────────────────────────────────────

/// Source of declared autoscalers.
///
/// The store notifies the provider of every status write-back through
/// [`StatusHandler`], synchronously and under the store lock.
#[async_trait]
pub trait StorageProvider: StatusHandler {
    /// Current desired autoscaler set.
    async fn load(&self) -> anyhow::Result<Vec<AutoscalerSpec>>;

    /// How often to reload. `None` means load once.
    fn resync_interval(&self) -> Option<Duration> {
        None
    }
}

// ── Factories ─────────────────────────────────────────────────────

pub trait StorageFactory: Send + Sync {
    fn create(&self, config: &TypedConfig) -> ProviderResult<Arc<dyn StorageProvider>>;
}

pub trait MetricsFactory: Send + Sync {
    fn create(&self, config: &TypedConfig) -> ProviderResult<Arc<dyn MetricsClient>>;
}

pub trait ScalingFactory: Send + Sync {
    fn create(&self, config: &TypedConfig) -> ProviderResult<Arc<dyn ScalingClient>>;
}

pub trait EventsFactory: Send + Sync {
    fn create(&self, config: &TypedConfig) -> ProviderResult<Arc<dyn EventCreator>>;
}

impl<F> StorageFactory for F
where
    F: Fn(&TypedConfig) -> ProviderResult<Arc<dyn StorageProvider>> + Send + Sync,
{
    fn create(&self, config: &TypedConfig) -> ProviderResult<Arc<dyn StorageProvider>> {
        self(config)
    }
}

impl<F> MetricsFactory for F
where
    F: Fn(&TypedConfig) -> ProviderResult<Arc<dyn MetricsClient>> + Send + Sync,
{
    fn create(&self, config: &TypedConfig) -> ProviderResult<Arc<dyn MetricsClient>> {
        self(config)
    }
}

impl<F> ScalingFactory for F
where
    F: Fn(&TypedConfig) -> ProviderResult<Arc<dyn ScalingClient>> + Send + Sync,
{
    fn create(&self, config: &TypedConfig) -> ProviderResult<Arc<dyn ScalingClient>> {
        self(config)
    }
}

impl<F> EventsFactory for F
where
    F: Fn(&TypedConfig) -> ProviderResult<Arc<dyn EventCreator>> + Send + Sync,
{
    fn create(&self, config: &TypedConfig) -> ProviderResult<Arc<dyn EventCreator>> {
        self(config)
    }
}
