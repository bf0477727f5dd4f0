//! ObjectStore — the authoritative in-memory autoscaler map.
//!
//! Records are keyed by namespace then name. A single read/write lock
//! guards the records, the watch hub, and the status listeners: reads take
//! the shared side, every mutation and every watch registration takes the
//! exclusive side and fans its event out before releasing it. That gives
//! watchers the ordering a networked resource store would: nobody sees a
//! `Modified` before its `Added`, and two watchers never disagree on the
//! order of two mutations.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use scalehub_core::StoreTuning;
use tracing::{debug, info};

use crate::error::{StateError, StateResult};
use crate::status::{StatusHandler, StatusSink};
use crate::types::*;
use crate::view::AutoscalerView;
use crate::watch::{EventKind, Watch, WatchHub};

struct Entry {
    record: AutoscalerRecord,
    view: Arc<AutoscalerView>,
}

pub(crate) struct Inner {
    entries: HashMap<String, HashMap<String, Entry>>,
    pub(crate) hub: WatchHub,
    listeners: HashMap<String, Arc<dyn StatusHandler>>,
    version: u64,
}

impl Inner {
    fn next_version(&mut self) -> u64 {
        self.version += 1;
        self.version
    }

    fn entry_mut(&mut self, namespace: &str, name: &str) -> Option<&mut Entry> {
        self.entries.get_mut(namespace)?.get_mut(name)
    }
}

pub(crate) struct Shared {
    pub(crate) inner: RwLock<Inner>,
    status_handler: Option<Arc<dyn StatusHandler>>,
}

/// Thread-safe autoscaler store. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ObjectStore {
    shared: Arc<Shared>,
}

/// Builder for [`ObjectStore`].
#[derive(Default)]
pub struct ObjectStoreBuilder {
    tuning: StoreTuning,
    status_handler: Option<Arc<dyn StatusHandler>>,
}

impl ObjectStoreBuilder {
    pub fn tuning(mut self, tuning: StoreTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Handler notified synchronously on every status write-back.
    ///
    /// It runs while the store's exclusive lock is held and must not call
    /// back into the store.
    pub fn status_handler(mut self, handler: Arc<dyn StatusHandler>) -> Self {
        self.status_handler = Some(handler);
        self
    }

    pub fn build(self) -> ObjectStore {
        let inner = Inner {
            entries: HashMap::new(),
            hub: WatchHub::new(self.tuning.watch_queue_capacity, self.tuning.watch_overflow),
            listeners: HashMap::new(),
            version: 0,
        };
        debug!(
            capacity = self.tuning.watch_queue_capacity,
            overflow = ?self.tuning.watch_overflow,
            "object store created"
        );
        ObjectStore {
            shared: Arc::new(Shared {
                inner: RwLock::new(inner),
                status_handler: self.status_handler,
            }),
        }
    }
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore {
    /// A store with default tuning and no status handler.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ObjectStoreBuilder {
        ObjectStoreBuilder::default()
    }

    // ── Reads ──────────────────────────────────────────────────────

    /// Engine-facing views in `namespace` (all namespaces for
    /// [`NAMESPACE_ALL`]), sorted by namespace then name.
    pub fn list(&self, namespace: &str) -> Vec<AutoscalerView> {
        let inner = self.shared.inner.read().expect("store lock");
        collect_views(&inner, namespace)
    }

    /// Every stored record, sorted by namespace then name.
    pub fn records(&self) -> Vec<AutoscalerRecord> {
        let inner = self.shared.inner.read().expect("store lock");
        let mut records: Vec<AutoscalerRecord> = inner
            .entries
            .values()
            .flat_map(|by_name| by_name.values().map(|e| e.record.clone()))
            .collect();
        records.sort_by_key(|r| r.key());
        records
    }

    /// Get a copy of a record.
    pub fn get(&self, name: &str, namespace: &str) -> StateResult<AutoscalerRecord> {
        let inner = self.shared.inner.read().expect("store lock");
        inner
            .entries
            .get(namespace)
            .and_then(|by_name| by_name.get(name))
            .map(|e| e.record.clone())
            .ok_or_else(|| not_found(namespace, name))
    }

    /// Get a copy of a record's engine-facing view.
    pub fn get_view(&self, name: &str, namespace: &str) -> StateResult<AutoscalerView> {
        let inner = self.shared.inner.read().expect("store lock");
        inner
            .entries
            .get(namespace)
            .and_then(|by_name| by_name.get(name))
            .map(|e| (*e.view).clone())
            .ok_or_else(|| not_found(namespace, name))
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        let inner = self.shared.inner.read().expect("store lock");
        inner.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Version stamped on the most recent mutation.
    pub fn resource_version(&self) -> u64 {
        self.shared.inner.read().expect("store lock").version
    }

    // ── Mutations ──────────────────────────────────────────────────

    /// Insert a new record. The record's version is assigned by the store.
    pub fn add(&self, mut record: AutoscalerRecord) -> StateResult<()> {
        let mut inner = self.shared.inner.write().expect("store lock");
        let (namespace, name) = (record.spec.namespace.clone(), record.spec.name.clone());
        if inner
            .entries
            .get(&namespace)
            .is_some_and(|by_name| by_name.contains_key(&name))
        {
            return Err(StateError::AlreadyExists(record.key().to_string()));
        }

        record.version = inner.version + 1;
        let view = Arc::new(AutoscalerView::derive(&record)?);
        let version = inner.next_version();

        inner.entries.entry(namespace.clone()).or_default().insert(
            name.clone(),
            Entry {
                record,
                view: Arc::clone(&view),
            },
        );
        inner.hub.publish(EventKind::Added, &view);

        info!(%namespace, %name, version, "autoscaler added");
        Ok(())
    }

    /// Replace an existing record's spec and status.
    pub fn update(&self, mut record: AutoscalerRecord) -> StateResult<()> {
        let mut inner = self.shared.inner.write().expect("store lock");
        let (namespace, name) = (record.spec.namespace.clone(), record.spec.name.clone());
        if inner.entry_mut(&namespace, &name).is_none() {
            return Err(not_found(&namespace, &name));
        }

        record.version = inner.version + 1;
        let view = Arc::new(AutoscalerView::derive(&record)?);
        let version = inner.next_version();

        if let Some(entry) = inner.entry_mut(&namespace, &name) {
            entry.record = record;
            entry.view = Arc::clone(&view);
        }
        inner.hub.publish(EventKind::Modified, &view);

        info!(%namespace, %name, version, "autoscaler updated");
        Ok(())
    }

    /// Replace an existing record's spec, keeping whatever status is stored
    /// at the time of the write.
    pub fn update_spec(&self, spec: AutoscalerSpec) -> StateResult<()> {
        let mut inner = self.shared.inner.write().expect("store lock");
        let (namespace, name) = (spec.namespace.clone(), spec.name.clone());
        let next = inner.version + 1;
        let entry = inner
            .entry_mut(&namespace, &name)
            .ok_or_else(|| not_found(&namespace, &name))?;

        let record = AutoscalerRecord {
            spec,
            status: entry.record.status.clone(),
            version: next,
        };
        let view = Arc::new(AutoscalerView::derive(&record)?);
        entry.record = record;
        entry.view = Arc::clone(&view);
        let version = inner.next_version();
        inner.hub.publish(EventKind::Modified, &view);

        info!(%namespace, %name, version, "autoscaler spec updated");
        Ok(())
    }

    pub fn delete(&self, name: &str, namespace: &str) -> StateResult<()> {
        let mut inner = self.shared.inner.write().expect("store lock");
        let removed = inner
            .entries
            .get_mut(namespace)
            .and_then(|by_name| by_name.remove(name))
            .ok_or_else(|| not_found(namespace, name))?;
        if inner.entries.get(namespace).is_some_and(HashMap::is_empty) {
            inner.entries.remove(namespace);
        }

        let version = inner.next_version();
        let mut view = Arc::unwrap_or_clone(removed.view);
        view.resource_version = version;
        inner.hub.publish(EventKind::Deleted, &Arc::new(view));

        info!(%namespace, %name, version, "autoscaler deleted");
        Ok(())
    }

    // ── Watches ────────────────────────────────────────────────────

    /// Subscribe to changes in `namespace` ([`NAMESPACE_ALL`] for every
    /// namespace). Events start with the next mutation.
    pub fn watch(&self, namespace: &str) -> Watch {
        let mut inner = self.shared.inner.write().expect("store lock");
        let (id, rx) = inner.hub.subscribe(namespace);
        Watch::new(id, namespace, rx, Arc::downgrade(&self.shared))
    }

    /// Snapshot and subscribe atomically: the first event delivered on the
    /// returned watch is the first mutation after the snapshot.
    pub fn list_and_watch(&self, namespace: &str) -> (Vec<AutoscalerView>, u64, Watch) {
        let mut inner = self.shared.inner.write().expect("store lock");
        let views = collect_views(&inner, namespace);
        let version = inner.version;
        let (id, rx) = inner.hub.subscribe(namespace);
        let watch = Watch::new(id, namespace, rx, Arc::downgrade(&self.shared));
        (views, version, watch)
    }

    /// Number of registered watches.
    pub fn watch_count(&self) -> usize {
        self.shared.inner.read().expect("store lock").hub.len()
    }

    // ── Status ─────────────────────────────────────────────────────

    /// Write-back path for the scaling engine, scoped to `namespace`.
    pub fn status_sink(&self, namespace: &str) -> StatusSink {
        StatusSink::new(self.clone(), namespace)
    }

    /// Register the external listener notified (asynchronously) of status
    /// updates in `namespace`. Replaces any previous listener.
    pub fn register_status_listener(&self, namespace: &str, listener: Arc<dyn StatusHandler>) {
        let mut inner = self.shared.inner.write().expect("store lock");
        inner.listeners.insert(namespace.to_string(), listener);
        info!(%namespace, "status listener registered");
    }

    pub fn unregister_status_listener(&self, namespace: &str) -> bool {
        let mut inner = self.shared.inner.write().expect("store lock");
        inner.listeners.remove(namespace).is_some()
    }

    /// Merge a status into the record at (`namespace`, `name`), notify
    /// listeners and watchers, and return the refreshed view.
    pub(crate) fn merge_status(
        &self,
        namespace: &str,
        name: &str,
        status: AutoscalerStatus,
    ) -> StateResult<(AutoscalerRecord, Arc<AutoscalerView>)> {
        let mut inner = self.shared.inner.write().expect("store lock");
        let next = inner.version + 1;
        let entry = inner
            .entry_mut(namespace, name)
            .ok_or_else(|| not_found(namespace, name))?;

        let mut record = entry.record.clone();
        record.status = status;
        record.version = next;
        let view = Arc::new(AutoscalerView::derive(&record)?);
        entry.record = record.clone();
        entry.view = Arc::clone(&view);
        inner.next_version();

        if let Some(listener) = inner.listeners.get(namespace) {
            crate::status::dispatch_detached(Arc::clone(listener), record.clone());
        }
        if let Some(handler) = &self.shared.status_handler {
            handler.status_updated(&record);
        }
        inner.hub.publish(EventKind::Modified, &view);

        debug!(%namespace, %name, version = next, "autoscaler status merged");
        Ok((record, view))
    }
}

fn collect_views(inner: &Inner, namespace: &str) -> Vec<AutoscalerView> {
    let mut views: Vec<AutoscalerView> = inner
        .entries
        .iter()
        .filter(|(ns, _)| namespace == NAMESPACE_ALL || ns.as_str() == namespace)
        .flat_map(|(_, by_name)| by_name.values().map(|e| (*e.view).clone()))
        .collect();
    views.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));
    views
}

fn not_found(namespace: &str, name: &str) -> StateError {
    StateError::NotFound(AutoscalerKey::new(namespace, name).to_string())
}
