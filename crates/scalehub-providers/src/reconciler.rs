//! Reconciler — converge the store to a supplied desired autoscaler list.
//!
//! Computes the key-level diff against the stored records and applies it
//! as deletes, then updates, then adds. A failing record never stops the
//! rest: every failure is collected and returned together.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use scalehub_state::{AutoscalerKey, AutoscalerRecord, AutoscalerSpec, ObjectStore, StateError, StateResult};
use tracing::{info, warn};

/// The CRUD surface reconciliation drives.
pub trait AutoscalerCrud {
    fn records(&self) -> Vec<AutoscalerRecord>;
    fn add(&self, record: AutoscalerRecord) -> StateResult<()>;
    /// Swap the spec of an existing record, keeping its stored status.
    fn update_spec(&self, spec: AutoscalerSpec) -> StateResult<()>;
    fn delete(&self, name: &str, namespace: &str) -> StateResult<()>;
}

impl AutoscalerCrud for ObjectStore {
    fn records(&self) -> Vec<AutoscalerRecord> {
        ObjectStore::records(self)
    }

    fn add(&self, record: AutoscalerRecord) -> StateResult<()> {
        ObjectStore::add(self, record)
    }

    fn update_spec(&self, spec: AutoscalerSpec) -> StateResult<()> {
        ObjectStore::update_spec(self, spec)
    }

    fn delete(&self, name: &str, namespace: &str) -> StateResult<()> {
        ObjectStore::delete(self, name, namespace)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOp {
    Add,
    Update,
    Delete,
}

impl fmt::Display for ReconcileOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReconcileOp::Add => "add",
            ReconcileOp::Update => "update",
            ReconcileOp::Delete => "delete",
        })
    }
}

/// One record that could not be converged.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{op} {key}: {error}")]
pub struct ReconcileFailure {
    pub op: ReconcileOp,
    pub key: AutoscalerKey,
    pub error: StateError,
}

/// Every failure of a reconciliation pass, rendered one per line.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", join_lines(.failures))]
pub struct ReconcileError {
    pub failures: Vec<ReconcileFailure>,
}

fn join_lines(failures: &[ReconcileFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct Reconciler<C> {
    store: C,
}

impl<C: AutoscalerCrud> Reconciler<C> {
    pub fn new(store: C) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &C {
        &self.store
    }

    /// Apply the diff between the stored records and `desired`.
    ///
    /// Specs are compared by value, ignoring status and version. An updated
    /// record keeps whatever status is stored when the update lands. When
    /// `desired` repeats a key, the last occurrence wins.
    pub fn reconcile(&self, desired: &[AutoscalerSpec]) -> Result<(), ReconcileError> {
        let existing: BTreeMap<AutoscalerKey, AutoscalerRecord> = self
            .store
            .records()
            .into_iter()
            .map(|r| (r.key(), r))
            .collect();
        let incoming: BTreeMap<AutoscalerKey, &AutoscalerSpec> =
            desired.iter().map(|s| (s.key(), s)).collect();

        let mut failures = Vec::new();
        let mut record_failure = |op: ReconcileOp, key: &AutoscalerKey, error: StateError| {
            warn!(%op, %key, error = %error, "reconcile step failed");
            failures.push(ReconcileFailure {
                op,
                key: key.clone(),
                error,
            });
        };
        let (mut deleted, mut updated, mut added) = (0usize, 0usize, 0usize);

        for key in existing.keys().filter(|k| !incoming.contains_key(*k)) {
            match self.store.delete(&key.name, &key.namespace) {
                Ok(()) => deleted += 1,
                Err(e) => record_failure(ReconcileOp::Delete, key, e),
            }
        }

        for (key, spec) in &incoming {
            if let Some(current) = existing.get(key)
                && current.spec != **spec
            {
                match self.store.update_spec((*spec).clone()) {
                    Ok(()) => updated += 1,
                    Err(e) => record_failure(ReconcileOp::Update, key, e),
                }
            }
        }

        for (key, spec) in incoming.iter().filter(|(k, _)| !existing.contains_key(*k)) {
            match self.store.add(AutoscalerRecord::new((*spec).clone())) {
                Ok(()) => added += 1,
                Err(e) => record_failure(ReconcileOp::Add, key, e),
            }
        }

        info!(
            added,
            updated,
            deleted,
            failed = failures.len(),
            "autoscalers reconciled"
        );

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ReconcileError { failures })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use scalehub_state::{AutoscalerStatus, Metric};

    /// Records every CRUD call; optionally fails calls for one name.
    struct RecordingCrud {
        existing: Vec<AutoscalerRecord>,
        calls: Mutex<Vec<(ReconcileOp, CallArg)>>,
        fail_name: Option<&'static str>,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum CallArg {
        Record(AutoscalerRecord),
        Spec(AutoscalerSpec),
        Key(AutoscalerKey),
    }

    impl RecordingCrud {
        fn new(existing: Vec<AutoscalerRecord>) -> Self {
            Self {
                existing,
                calls: Mutex::new(Vec::new()),
                fail_name: None,
            }
        }

        fn calls(&self) -> Vec<(ReconcileOp, CallArg)> {
            self.calls.lock().unwrap().clone()
        }

        fn outcome(&self, name: &str) -> StateResult<()> {
            if self.fail_name == Some(name) {
                Err(StateError::Invalid(format!("bad {name}")))
            } else {
                Ok(())
            }
        }
    }

    impl AutoscalerCrud for RecordingCrud {
        fn records(&self) -> Vec<AutoscalerRecord> {
            self.existing.clone()
        }

        fn add(&self, record: AutoscalerRecord) -> StateResult<()> {
            let name = record.spec.name.clone();
            self.calls
                .lock()
                .unwrap()
                .push((ReconcileOp::Add, CallArg::Record(record)));
            self.outcome(&name)
        }

        fn update_spec(&self, spec: AutoscalerSpec) -> StateResult<()> {
            let name = spec.name.clone();
            self.calls
                .lock()
                .unwrap()
                .push((ReconcileOp::Update, CallArg::Spec(spec)));
            self.outcome(&name)
        }

        fn delete(&self, name: &str, namespace: &str) -> StateResult<()> {
            self.calls.lock().unwrap().push((
                ReconcileOp::Delete,
                CallArg::Key(AutoscalerKey::new(namespace, name)),
            ));
            self.outcome(name)
        }
    }

    fn spec(name: &str, min: u32) -> AutoscalerSpec {
        AutoscalerSpec {
            namespace: "ns".to_string(),
            name: name.to_string(),
            min_replicas: Some(min),
            max_replicas: 10,
            metrics: vec![Metric {
                name: "m".to_string(),
                target: 1,
                config: None,
            }],
            target: None,
            behavior: None,
        }
    }

    fn stored(spec: AutoscalerSpec, version: u64) -> AutoscalerRecord {
        AutoscalerRecord {
            spec,
            status: AutoscalerStatus {
                current_scale: Some(3),
                ..AutoscalerStatus::default()
            },
            version,
        }
    }

    #[test]
    fn diff_yields_exactly_one_of_each() {
        let crud = RecordingCrud::new(vec![stored(spec("a", 1), 1), stored(spec("b", 1), 2)]);
        let reconciler = Reconciler::new(crud);

        reconciler.reconcile(&[spec("a", 2), spec("c", 1)]).unwrap();

        let calls = reconciler.store().calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(
            calls[0],
            (
                ReconcileOp::Delete,
                CallArg::Key(AutoscalerKey::new("ns", "b"))
            )
        );
        match &calls[1] {
            (ReconcileOp::Update, CallArg::Spec(s)) => assert_eq!(*s, spec("a", 2)),
            other => panic!("expected update, got {other:?}"),
        }
        match &calls[2] {
            (ReconcileOp::Add, CallArg::Record(r)) => {
                assert_eq!(r.spec, spec("c", 1));
            }
            other => panic!("expected add, got {other:?}"),
        }
    }

    #[test]
    fn unchanged_specs_are_left_alone() {
        let crud = RecordingCrud::new(vec![stored(spec("a", 1), 7)]);
        let reconciler = Reconciler::new(crud);

        reconciler.reconcile(&[spec("a", 1)]).unwrap();
        assert!(reconciler.store().calls().is_empty());
    }

    #[test]
    fn empty_desired_deletes_everything() {
        let crud = RecordingCrud::new(vec![stored(spec("a", 1), 1), stored(spec("b", 1), 2)]);
        let reconciler = Reconciler::new(crud);

        reconciler.reconcile(&[]).unwrap();
        let calls = reconciler.store().calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|(op, _)| *op == ReconcileOp::Delete));
    }

    #[test]
    fn failures_are_collected_and_do_not_stop_progress() {
        let mut crud = RecordingCrud::new(vec![stored(spec("gone", 1), 1)]);
        crud.fail_name = Some("bad");
        let reconciler = Reconciler::new(crud);

        let err = reconciler
            .reconcile(&[spec("bad", 1), spec("good", 1)])
            .unwrap_err();

        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].op, ReconcileOp::Add);
        assert_eq!(err.failures[0].key, AutoscalerKey::new("ns", "bad"));
        // delete + two adds were all attempted
        assert_eq!(reconciler.store().calls().len(), 3);
    }

    #[test]
    fn joined_error_lists_one_failure_per_line() {
        let err = ReconcileError {
            failures: vec![
                ReconcileFailure {
                    op: ReconcileOp::Delete,
                    key: AutoscalerKey::new("ns", "a"),
                    error: StateError::NotFound("ns/a".to_string()),
                },
                ReconcileFailure {
                    op: ReconcileOp::Add,
                    key: AutoscalerKey::new("ns", "b"),
                    error: StateError::Invalid("no metrics for ns/b".to_string()),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "delete ns/a: autoscaler not found: ns/a\nadd ns/b: invalid autoscaler: no metrics for ns/b"
        );
    }

    #[test]
    fn reconciles_a_real_store() {
        let store = ObjectStore::new();
        let reconciler = Reconciler::new(store.clone());

        reconciler.reconcile(&[spec("a", 1), spec("b", 1)]).unwrap();
        assert_eq!(store.len(), 2);

        reconciler.reconcile(&[spec("a", 5), spec("c", 1)]).unwrap();
        let names: Vec<_> = store.records().into_iter().map(|r| r.spec.name).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(store.get("a", "ns").unwrap().spec.min_replicas, Some(5));
    }

    /// Writes a status through the sink right after handing out the
    /// snapshot, so the write lands between the diff and the update.
    struct StatusRacingStore {
        store: ObjectStore,
        current_replicas: u32,
    }

    impl AutoscalerCrud for StatusRacingStore {
        fn records(&self) -> Vec<AutoscalerRecord> {
            let snapshot = self.store.records();
            for record in &snapshot {
                let mut view = self.store.get_view(&record.spec.name, &record.spec.namespace).unwrap();
                view.status.current_replicas = self.current_replicas;
                self.store
                    .status_sink(&record.spec.namespace)
                    .update_status(&view)
                    .unwrap();
            }
            snapshot
        }

        fn add(&self, record: AutoscalerRecord) -> StateResult<()> {
            self.store.add(record)
        }

        fn update_spec(&self, spec: AutoscalerSpec) -> StateResult<()> {
            self.store.update_spec(spec)
        }

        fn delete(&self, name: &str, namespace: &str) -> StateResult<()> {
            self.store.delete(name, namespace)
        }
    }

    #[test]
    fn update_keeps_status_written_after_the_snapshot() {
        let store = ObjectStore::new();
        store.add(AutoscalerRecord::new(spec("a", 1))).unwrap();
        let reconciler = Reconciler::new(StatusRacingStore {
            store: store.clone(),
            current_replicas: 7,
        });

        let mut changed = spec("a", 1);
        changed.max_replicas = 5;
        reconciler.reconcile(&[changed]).unwrap();

        let record = store.get("a", "ns").unwrap();
        assert_eq!(record.spec.max_replicas, 5);
        assert_eq!(record.status.current_scale, Some(7));
    }

    #[test]
    fn invalid_spec_surfaces_in_joined_error() {
        let store = ObjectStore::new();
        let reconciler = Reconciler::new(store.clone());
        let mut broken = spec("broken", 1);
        broken.metrics.clear();

        let err = reconciler.reconcile(&[broken, spec("ok", 1)]).unwrap_err();
        assert!(err.failures[0].error.is_invalid());
        assert!(store.get("ok", "ns").is_ok());
    }
}
