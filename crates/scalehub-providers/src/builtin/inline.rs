//! `inline` storage provider: autoscalers declared in the provider config.
//!
//! ```toml
//! [storage]
//! type = "inline"
//!
//! [[storage.config.autoscalers]]
//! namespace = "default"
//! name = "api"
//! max_replicas = 10
//! metrics = [{ name = "load", target = 60 }]
//! ```
//!
//! The declared set never changes after startup.

use std::sync::Arc;

use async_trait::async_trait;
use scalehub_core::TypedConfig;
use scalehub_state::{AutoscalerRecord, AutoscalerSpec, StatusHandler};
use serde::Deserialize;
use tracing::debug;

use crate::error::{ProviderError, ProviderKind, ProviderResult};
use crate::ports::{StorageFactory, StorageProvider};

pub const TYPE_ID: &str = "inline";

#[derive(Debug, Deserialize)]
pub struct InlineConfig {
    pub autoscalers: Vec<AutoscalerSpec>,
}

pub struct InlineFactory;

impl StorageFactory for InlineFactory {
    fn create(&self, config: &TypedConfig) -> ProviderResult<Arc<dyn StorageProvider>> {
        let inline: InlineConfig = config
            .decode()
            .map_err(|e| ProviderError::from_config(ProviderKind::Storage, e))?;
        if inline.autoscalers.is_empty() {
            return Err(ProviderError::invalid_config(
                ProviderKind::Storage,
                TYPE_ID,
                "no autoscalers specified",
            ));
        }
        Ok(Arc::new(InlineStorage {
            autoscalers: inline.autoscalers,
        }))
    }
}

pub struct InlineStorage {
    autoscalers: Vec<AutoscalerSpec>,
}

impl StatusHandler for InlineStorage {
    fn status_updated(&self, record: &AutoscalerRecord) {
        debug!(
            name = %record.name(),
            namespace = %record.namespace(),
            current = ?record.status.current_scale,
            desired = record.status.desired_scale,
            "inline autoscaler status updated"
        );
    }
}

#[async_trait]
impl StorageProvider for InlineStorage {
    async fn load(&self) -> anyhow::Result<Vec<AutoscalerSpec>> {
        Ok(self.autoscalers.clone())
    }
}
