//! StorageSync — seed and refresh the store from a storage provider.

use std::sync::Arc;
use std::time::Duration;

use scalehub_state::ObjectStore;
use tracing::{error, info};

use crate::ports::StorageProvider;
use crate::reconciler::Reconciler;

pub struct StorageSync {
    provider: Arc<dyn StorageProvider>,
    reconciler: Reconciler<ObjectStore>,
}

impl StorageSync {
    pub fn new(provider: Arc<dyn StorageProvider>, store: ObjectStore) -> Self {
        Self {
            provider,
            reconciler: Reconciler::new(store),
        }
    }

    /// Load the desired set once and reconcile the store to it.
    pub async fn sync_once(&self) -> anyhow::Result<()> {
        let desired = self.provider.load().await?;
        self.reconciler.reconcile(&desired)?;
        Ok(())
    }

    /// Initial sync, then resync on the provider's interval until shutdown.
    /// Failures are logged and retried on the next tick.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        if let Err(e) = self.sync_once().await {
            error!(error = %e, "initial storage sync failed");
        }

        let Some(interval) = self.provider.resync_interval() else {
            info!("storage loaded once, no resync");
            return;
        };
        info!(interval_ms = interval.as_millis() as u64, "storage resync started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = self.sync_once().await {
                        error!(error = %e, "storage resync failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("storage resync shutting down");
                    break;
                }
            }
        }
    }

    pub fn resync_interval(&self) -> Option<Duration> {
        self.provider.resync_interval()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use scalehub_state::{AutoscalerRecord, AutoscalerSpec, Metric, StatusHandler};

    /// Serves a queue of desired sets, repeating the last.
    struct ScriptedStorage {
        script: Mutex<Vec<Vec<AutoscalerSpec>>>,
        interval: Option<Duration>,
    }

    impl StatusHandler for ScriptedStorage {
        fn status_updated(&self, _record: &AutoscalerRecord) {}
    }

    #[async_trait]
    impl StorageProvider for ScriptedStorage {
        async fn load(&self) -> anyhow::Result<Vec<AutoscalerSpec>> {
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                Ok(script.remove(0))
            } else {
                script.first().cloned().ok_or_else(|| anyhow::anyhow!("empty script"))
            }
        }

        fn resync_interval(&self) -> Option<Duration> {
            self.interval
        }
    }

    fn spec(name: &str) -> AutoscalerSpec {
        AutoscalerSpec {
            namespace: "ns".to_string(),
            name: name.to_string(),
            min_replicas: None,
            max_replicas: 3,
            metrics: vec![Metric {
                name: "m".to_string(),
                target: 1,
                config: None,
            }],
            target: None,
            behavior: None,
        }
    }

    #[tokio::test]
    async fn run_without_interval_loads_once_and_returns() {
        let store = ObjectStore::new();
        let provider = Arc::new(ScriptedStorage {
            script: Mutex::new(vec![vec![spec("a"), spec("b")]]),
            interval: None,
        });
        let (_tx, rx) = tokio::sync::watch::channel(false);

        StorageSync::new(provider, store.clone()).run(rx).await;
        assert_eq!(store.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn resync_follows_provider_until_shutdown() {
        let store = ObjectStore::new();
        let provider = Arc::new(ScriptedStorage {
            script: Mutex::new(vec![vec![spec("a")], vec![spec("b")]]),
            interval: Some(Duration::from_secs(10)),
        });
        let (tx, rx) = tokio::sync::watch::channel(false);
        let sync = StorageSync::new(provider, store.clone());

        let handle = tokio::spawn(async move { sync.run(rx).await });

        tokio::time::sleep(Duration::from_secs(15)).await;
        let names: Vec<_> = store.records().into_iter().map(|r| r.spec.name).collect();
        assert_eq!(names, vec!["b"]);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn sync_once_surfaces_reconcile_errors() {
        let store = ObjectStore::new();
        let mut broken = spec("broken");
        broken.metrics.clear();
        let provider = Arc::new(ScriptedStorage {
            script: Mutex::new(vec![vec![broken, spec("ok")]]),
            interval: None,
        });

        let err = StorageSync::new(provider, store.clone())
            .sync_once()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("add ns/broken"));
        assert_eq!(store.len(), 1);
    }
}
