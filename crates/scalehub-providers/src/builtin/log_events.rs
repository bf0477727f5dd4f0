//! `log` events provider.

use std::sync::Arc;

use async_trait::async_trait;
use scalehub_core::TypedConfig;
use tracing::info;

use crate::error::ProviderResult;
use crate::ports::{Event, EventCreator, EventsFactory};

pub const TYPE_ID: &str = "log";

pub struct LogEventsFactory;

impl EventsFactory for LogEventsFactory {
    fn create(&self, _config: &TypedConfig) -> ProviderResult<Arc<dyn EventCreator>> {
        Ok(Arc::new(LogEvents))
    }
}

/// Writes every engine event to the log.
pub struct LogEvents;

#[async_trait]
impl EventCreator for LogEvents {
    async fn create(&self, name: &str, namespace: &str, event: &Event) -> anyhow::Result<()> {
        info!(
            %name,
            %namespace,
            reason = %event.reason,
            message = %event.message,
            event_type = ?event.event_type,
            count = event.count,
            action = %event.action,
            "autoscaler event"
        );
        Ok(())
    }
}
