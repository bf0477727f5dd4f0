//! Controller assembly: resolved backends, the store, and background tasks.

use std::sync::Arc;

use scalehub_core::ControllerConfig;
use scalehub_providers::{Backends, ProviderRegistry};
use scalehub_state::ObjectStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::observer::ScaleObserver;
use crate::watch_log;

pub struct Controller {
    config: ControllerConfig,
    backends: Backends,
    store: ObjectStore,
}

impl Controller {
    pub fn new(registry: &ProviderRegistry, config: ControllerConfig) -> anyhow::Result<Self> {
        let backends = Backends::resolve(registry, &config)?;
        let store = backends.object_store(&config);
        info!(
            workers = config.workers,
            resync_secs = config.resync_period_secs,
            tolerance = config.tolerance,
            downscale_stabilization_secs = config.downscale_stabilization_secs,
            watch_queue_capacity = config.store.watch_queue_capacity,
            "controller initialized"
        );
        Ok(Self {
            config,
            backends,
            store,
        })
    }

    #[cfg(test)]
    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Spawn the storage sync, scale observer and watch logger. Each stops
    /// when `shutdown` flips.
    pub fn start(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let sync = self.backends.storage_sync(self.store.clone());
        let sync_shutdown = shutdown.clone();
        let sync_handle = tokio::spawn(async move {
            sync.run(sync_shutdown).await;
        });

        let observer = Arc::new(ScaleObserver::new(
            &self.backends,
            self.store.clone(),
            self.config.workers,
        ));
        let interval = self.config.resync_period();
        let observer_shutdown = shutdown.clone();
        let observer_handle = tokio::spawn(async move {
            observer.run(interval, observer_shutdown).await;
        });

        let store = self.store.clone();
        let watch_handle = tokio::spawn(async move {
            watch_log::run(store, shutdown).await;
        });

        vec![sync_handle, observer_handle, watch_handle]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const CONFIG: &str = r#"
resync_period_secs = 1

[storage]
type = "inline"

[[storage.config.autoscalers]]
namespace = "default"
name = "api"
max_replicas = 4
metrics = [{ name = "load", target = 60 }]

[metrics]
type = "sim"

[metrics.config]
metric_name = "load"

[[metrics.config.autoscalers]]
autoscaler_name = "api"
autoscaler_namespace = "default"
max_load_per_instance = 50.0
load = [{ timespan_ms = 1000, load = 100.0 }]

[scaling]
type = "sim"
"#;

    #[tokio::test]
    async fn start_seeds_store_and_stops_on_shutdown() {
        let registry = ProviderRegistry::builtin().unwrap();
        let controller = Controller::new(&registry, CONFIG.parse().unwrap()).unwrap();
        let store = controller.store().clone();

        let (tx, rx) = watch::channel(false);
        let handles = controller.start(rx);

        let mut seeded = false;
        for _ in 0..50 {
            if store.get("api", "default").is_ok() {
                seeded = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(seeded);

        tx.send(true).unwrap();
        for handle in handles {
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[test]
    fn unresolvable_config_fails_construction() {
        let registry = ProviderRegistry::builtin().unwrap();
        let mut config: ControllerConfig = CONFIG.parse().unwrap();
        config.metrics = Some(scalehub_core::TypedConfig::bare("prometheus"));

        assert!(Controller::new(&registry, config).is_err());
    }
}
