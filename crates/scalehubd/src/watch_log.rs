//! Watch logger — follows every autoscaler change and logs it.

use scalehub_state::{NAMESPACE_ALL, ObjectStore};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Log every store event until shutdown. A watch closed for falling behind
/// is replaced by a fresh list-and-watch.
pub async fn run(store: ObjectStore, mut shutdown: watch::Receiver<bool>) {
    loop {
        let (snapshot, version, mut events) = store.list_and_watch(NAMESPACE_ALL);
        info!(autoscalers = snapshot.len(), version, "watching autoscalers");

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => debug!(
                        kind = ?event.kind,
                        key = %event.object.key(),
                        version = event.object.resource_version,
                        min = ?event.object.spec.min_replicas,
                        max = event.object.spec.max_replicas,
                        current = event.object.status.current_replicas,
                        "autoscaler changed"
                    ),
                    None => {
                        warn!("autoscaler watch closed, re-listing");
                        break;
                    }
                },
                _ = shutdown.changed() => {
                    info!("watch logger shutting down");
                    return;
                }
            }
        }
    }
}
