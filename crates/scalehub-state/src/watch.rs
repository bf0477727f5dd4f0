//! Watch subscriptions and ordered event fan-out.
//!
//! Every mutation is stamped and enqueued into each matching subscriber's
//! bounded queue while the store's exclusive lock is held, so all
//! subscribers observe mutations in the same order. Consumers drain their
//! queue on their own task; writers never wait for them. A subscriber whose
//! queue is full is handled according to [`WatchOverflow`].

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use scalehub_core::WatchOverflow;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::{debug, info, warn};

use crate::store::Shared;
use crate::types::NAMESPACE_ALL;
use crate::view::AutoscalerView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Added,
    Modified,
    Deleted,
}

/// A change delivered to watchers.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub kind: EventKind,
    pub object: Arc<AutoscalerView>,
}

struct Subscriber {
    namespace: String,
    tx: mpsc::Sender<WatchEvent>,
}

impl Subscriber {
    fn matches(&self, namespace: &str) -> bool {
        self.namespace == NAMESPACE_ALL || self.namespace == namespace
    }
}

/// Subscription registry. Lives inside the store's lock.
pub(crate) struct WatchHub {
    subscribers: HashMap<u64, Subscriber>,
    next_id: u64,
    capacity: usize,
    overflow: WatchOverflow,
}

impl WatchHub {
    pub(crate) fn new(capacity: usize, overflow: WatchOverflow) -> Self {
        Self {
            subscribers: HashMap::new(),
            next_id: 0,
            capacity: capacity.max(1),
            overflow,
        }
    }

    pub(crate) fn subscribe(&mut self, namespace: &str) -> (u64, mpsc::Receiver<WatchEvent>) {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.next_id += 1;
        let id = self.next_id;
        self.subscribers.insert(
            id,
            Subscriber {
                namespace: namespace.to_string(),
                tx,
            },
        );
        info!(id, %namespace, "watch registered");
        (id, rx)
    }

    pub(crate) fn unsubscribe(&mut self, id: u64) -> bool {
        let existed = self.subscribers.remove(&id).is_some();
        if existed {
            info!(id, "watch removed");
        }
        existed
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Enqueue an event for every open subscriber whose scope matches.
    pub(crate) fn publish(&mut self, kind: EventKind, object: &Arc<AutoscalerView>) {
        let mut dropped = Vec::new();

        for (id, sub) in &self.subscribers {
            if !sub.matches(&object.namespace) {
                continue;
            }
            let event = WatchEvent {
                kind,
                object: Arc::clone(object),
            };
            match sub.tx.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => match self.overflow {
                    WatchOverflow::Disconnect => {
                        warn!(id = *id, namespace = %sub.namespace, "watch queue full, disconnecting");
                        dropped.push(*id);
                    }
                    WatchOverflow::DropNewest => {
                        debug!(
                            id = *id,
                            namespace = %sub.namespace,
                            kind = ?kind,
                            name = %object.name,
                            "watch queue full, event dropped"
                        );
                    }
                },
                Err(TrySendError::Closed(_)) => {
                    debug!(id = *id, "watch receiver gone");
                    dropped.push(*id);
                }
            }
        }

        for id in dropped {
            self.subscribers.remove(&id);
        }
    }
}

/// A live subscription to store changes.
///
/// Dropping the watch stops it. When the store itself is dropped, or the
/// subscriber is disconnected for falling behind, [`Watch::recv`] returns
/// the events already queued and then `None`.
pub struct Watch {
    id: u64,
    namespace: String,
    rx: mpsc::Receiver<WatchEvent>,
    store: Weak<Shared>,
    stopped: bool,
    closed: bool,
}

impl Watch {
    pub(crate) fn new(
        id: u64,
        namespace: &str,
        rx: mpsc::Receiver<WatchEvent>,
        store: Weak<Shared>,
    ) -> Self {
        Self {
            id,
            namespace: namespace.to_string(),
            rx,
            store,
            stopped: false,
            closed: false,
        }
    }

    /// Namespace scope; empty means all namespaces.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Wait for the next event. `None` once the watch is closed.
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        if self.closed {
            return None;
        }
        let event = self.rx.recv().await;
        if event.is_none() {
            self.closed = true;
        }
        event
    }

    /// Take the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<WatchEvent> {
        if self.closed {
            return None;
        }
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.closed = true;
                None
            }
        }
    }

    /// Whether the watch has reported its end. No event follows once true.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Unregister from the store and discard anything still queued.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.closed = true;
        if let Some(shared) = self.store.upgrade()
            && let Ok(mut inner) = shared.inner.write()
        {
            inner.hub.unsubscribe(self.id);
        }
        self.rx.close();
    }
}

impl Drop for Watch {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Watch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watch")
            .field("id", &self.id)
            .field("namespace", &self.namespace)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;

    fn view(namespace: &str, name: &str) -> Arc<AutoscalerView> {
        let record = AutoscalerRecord::new(AutoscalerSpec {
            namespace: namespace.to_string(),
            name: name.to_string(),
            min_replicas: None,
            max_replicas: 1,
            metrics: vec![Metric {
                name: "m".to_string(),
                target: 1,
                config: None,
            }],
            target: None,
            behavior: None,
        });
        Arc::new(AutoscalerView::derive(&record).unwrap())
    }

    #[test]
    fn publish_respects_namespace_scope() {
        let mut hub = WatchHub::new(8, WatchOverflow::Disconnect);
        let (_, mut all) = hub.subscribe(NAMESPACE_ALL);
        let (_, mut ns) = hub.subscribe("ns");
        let (_, mut other) = hub.subscribe("other");

        hub.publish(EventKind::Added, &view("ns", "a"));

        assert_eq!(all.try_recv().unwrap().object.name, "a");
        assert_eq!(ns.try_recv().unwrap().kind, EventKind::Added);
        assert!(other.try_recv().is_err());
    }

    #[test]
    fn full_queue_disconnects_subscriber() {
        let mut hub = WatchHub::new(1, WatchOverflow::Disconnect);
        let (_, mut rx) = hub.subscribe("ns");

        hub.publish(EventKind::Added, &view("ns", "a"));
        hub.publish(EventKind::Modified, &view("ns", "a"));
        assert_eq!(hub.len(), 0);

        // The queued event is still delivered, then the stream ends.
        assert_eq!(rx.try_recv().unwrap().kind, EventKind::Added);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Disconnected)));
    }

    #[test]
    fn full_queue_drop_newest_keeps_subscriber() {
        let mut hub = WatchHub::new(1, WatchOverflow::DropNewest);
        let (_, mut rx) = hub.subscribe("ns");

        hub.publish(EventKind::Added, &view("ns", "a"));
        hub.publish(EventKind::Modified, &view("ns", "a"));
        assert_eq!(hub.len(), 1);

        assert_eq!(rx.try_recv().unwrap().kind, EventKind::Added);
        hub.publish(EventKind::Deleted, &view("ns", "a"));
        assert_eq!(rx.try_recv().unwrap().kind, EventKind::Deleted);
    }

    #[test]
    fn closed_receiver_is_pruned() {
        let mut hub = WatchHub::new(4, WatchOverflow::Disconnect);
        let (_, rx) = hub.subscribe(NAMESPACE_ALL);
        drop(rx);

        hub.publish(EventKind::Added, &view("ns", "a"));
        assert_eq!(hub.len(), 0);
    }

    #[test]
    fn unsubscribe_reports_presence() {
        let mut hub = WatchHub::new(4, WatchOverflow::Disconnect);
        let (id, _rx) = hub.subscribe("ns");
        assert!(hub.unsubscribe(id));
        assert!(!hub.unsubscribe(id));
    }
}
