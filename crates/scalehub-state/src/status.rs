//! Status write-back from the scaling engine.
//!
//! A [`StatusSink`] is scoped to one namespace. Each accepted update is
//! merged into the stored record and then fans out three ways:
//!
//! 1. the namespace's registered listener, on a detached task, whose outcome
//!    the caller never observes;
//! 2. the store-wide [`StatusHandler`], synchronously, under the store lock;
//! 3. watchers of the namespace, as a `Modified` event.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{StateError, StateResult};
use crate::store::ObjectStore;
use crate::types::AutoscalerRecord;
use crate::view::AutoscalerView;

/// Receives records whose status was just written back.
///
/// Handlers called synchronously by the store run under its exclusive lock
/// and must not call back into the store.
pub trait StatusHandler: Send + Sync + 'static {
    fn status_updated(&self, record: &AutoscalerRecord);
}

impl<F> StatusHandler for F
where
    F: Fn(&AutoscalerRecord) + Send + Sync + 'static,
{
    fn status_updated(&self, record: &AutoscalerRecord) {
        self(record)
    }
}

/// Namespace-scoped status writer handed to the scaling engine.
#[derive(Clone)]
pub struct StatusSink {
    store: ObjectStore,
    namespace: String,
}

impl StatusSink {
    pub(crate) fn new(store: ObjectStore, namespace: &str) -> Self {
        Self {
            store,
            namespace: namespace.to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Persist the engine's view of an autoscaler's status.
    ///
    /// Only `view.status` is taken from the argument; the stored spec stays as
    /// stored. Returns the refreshed view with its new resource version.
    ///
    /// Fails with [`StateError::Conflict`] when the view belongs to another
    /// namespace, [`StateError::NotFound`] when no such autoscaler is
    /// stored, and [`StateError::Invalid`] when the status can't be
    /// translated.
    pub fn update_status(&self, view: &AutoscalerView) -> StateResult<AutoscalerView> {
        if view.namespace != self.namespace {
            return Err(StateError::Conflict(format!(
                "status for {} targets namespace {}, sink is scoped to {}",
                view.name, view.namespace, self.namespace
            )));
        }
        let status = view.status.to_status()?;
        let (_, refreshed) = self.store.merge_status(&self.namespace, &view.name, status)?;
        Ok((*refreshed).clone())
    }
}

impl std::fmt::Debug for StatusSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusSink")
            .field("namespace", &self.namespace)
            .finish()
    }
}

/// Run a listener off the caller's path. Uses the ambient tokio runtime
/// when there is one, a plain thread otherwise.
pub(crate) fn dispatch_detached(listener: Arc<dyn StatusHandler>, record: AutoscalerRecord) {
    let key = record.key();
    let notify = move || listener.status_updated(&record);

    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(notify);
        }
        Err(_) => {
            if let Err(e) = std::thread::Builder::new()
                .name("status-listener".to_string())
                .spawn(notify)
            {
                warn!(%key, error = %e, "failed to start status listener");
                return;
            }
        }
    }
    debug!(%key, "status listener dispatched");
}
