//! End-to-end list/watch/status scenarios against the public store API.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use scalehub_state::*;

fn test_record(namespace: &str, name: &str, min: u32) -> AutoscalerRecord {
    AutoscalerRecord::new(AutoscalerSpec {
        namespace: namespace.to_string(),
        name: name.to_string(),
        min_replicas: Some(min),
        max_replicas: 2,
        metrics: vec![Metric {
            name: "testmetric".to_string(),
            target: 1,
            config: None,
        }],
        target: None,
        behavior: None,
    })
}

fn drain(watch: &mut Watch) -> Vec<WatchEvent> {
    std::iter::from_fn(|| watch.try_recv()).collect()
}

#[test]
fn crud_lifecycle_scenario() {
    let store = ObjectStore::new();

    store.add(test_record("ns", "testas", 1)).unwrap();
    assert_eq!(store.get("testas", "ns").unwrap().spec.min_replicas, Some(1));

    store.update(test_record("ns", "testas", 10)).unwrap();
    assert_eq!(store.get("testas", "ns").unwrap().spec.min_replicas, Some(10));

    store.delete("testas", "ns").unwrap();
    assert!(matches!(
        store.get("testas", "ns"),
        Err(StateError::NotFound(_))
    ));
}

#[tokio::test]
async fn watch_delivery_scenario() {
    let store = ObjectStore::new();
    let mut watch = store.watch("ns");

    store.add(test_record("ns", "testas", 1)).unwrap();
    let added = watch.recv().await.unwrap();
    assert_eq!(added.kind, EventKind::Added);
    assert_eq!(added.object.name, "testas");

    store.update(test_record("ns", "testas", 10)).unwrap();
    let modified = watch.recv().await.unwrap();
    assert_eq!(modified.kind, EventKind::Modified);
    assert_eq!(modified.object.spec.min_replicas, Some(10));

    store.delete("testas", "ns").unwrap();
    let deleted = watch.recv().await.unwrap();
    assert_eq!(deleted.kind, EventKind::Deleted);
    assert_eq!(deleted.object.name, "testas");
}

#[test]
fn status_write_back_scenario() {
    let store = ObjectStore::new();
    store.add(test_record("ns", "testas", 1)).unwrap();

    let (tx, rx) = mpsc::channel();
    let tx = Mutex::new(tx);
    store.register_status_listener(
        "ns",
        Arc::new(move |record: &AutoscalerRecord| {
            let _ = tx.lock().unwrap().send(record.status.current_scale);
        }),
    );

    let mut view = store.get_view("testas", "ns").unwrap();
    view.status.current_replicas = 10;
    let updated = store.status_sink("ns").update_status(&view).unwrap();
    assert_eq!(updated.status.current_replicas, 10);

    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Some(10));
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
}

#[test]
fn conflict_and_invalid_scenario() {
    let store = ObjectStore::new();
    store.add(test_record("ns", "testas", 1)).unwrap();
    let view = store.get_view("testas", "ns").unwrap();

    // Record lives in "ns"; a sink scoped elsewhere must refuse it.
    let err = store.status_sink("other").update_status(&view).unwrap_err();
    assert!(err.is_conflict());

    // A default identity never silently succeeds.
    let mut empty = view.clone();
    empty.name.clear();
    empty.namespace.clear();
    let err = store.status_sink("ns").update_status(&empty).unwrap_err();
    assert!(err.is_conflict() || err.is_not_found());
    let err = store.status_sink("").update_status(&empty).unwrap_err();
    assert!(err.is_conflict() || err.is_not_found());

    assert_eq!(
        store.get("testas", "ns").unwrap().status,
        AutoscalerStatus::default()
    );
}

#[test]
fn watch_ordering_across_scopes_with_concurrent_writers() {
    let store = ObjectStore::new();
    let mut all = store.watch(NAMESPACE_ALL);
    let mut scoped = store.watch("n");
    let mut other = store.watch("m");

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let store = store.clone();
            thread::spawn(move || {
                for i in 0..20 {
                    let name = format!("as-{t}-{i}");
                    store.add(test_record("n", &name, 1)).unwrap();
                    store.update(test_record("n", &name, 2)).unwrap();
                    if i % 4 == 0 {
                        store.delete(&name, "n").unwrap();
                    }
                }
            })
        })
        .collect();
    for w in writers {
        w.join().unwrap();
    }

    let observed = |events: Vec<WatchEvent>| -> Vec<(EventKind, String, u64)> {
        events
            .into_iter()
            .map(|e| (e.kind, e.object.name.clone(), e.object.resource_version))
            .collect()
    };
    let all_events = observed(drain(&mut all));
    let scoped_events = observed(drain(&mut scoped));

    assert_eq!(all_events.len(), 4 * (20 * 2 + 5));
    assert_eq!(all_events, scoped_events);
    assert!(all_events.windows(2).all(|w| w[0].2 < w[1].2));
    assert!(drain(&mut other).is_empty());
}

#[test]
fn list_and_watch_resumes_exactly_after_snapshot() {
    let store = ObjectStore::new();
    for i in 0..3 {
        store.add(test_record("ns", &format!("as-{i}"), 1)).unwrap();
    }

    let (snapshot, version, mut watch) = store.list_and_watch(NAMESPACE_ALL);
    assert_eq!(snapshot.len(), 3);
    assert_eq!(version, store.resource_version());

    store.delete("as-0", "ns").unwrap();
    let events = drain(&mut watch);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::Deleted);
    assert!(events[0].object.resource_version > version);
}

#[test]
fn selectors_identify_owning_autoscaler() {
    let store = ObjectStore::new();
    store.add(test_record("ns", "testas", 1)).unwrap();

    let view = store.get_view("testas", "ns").unwrap();
    let selector = &view.spec.metrics[0].selector;
    assert_eq!(selector.to_string(), "autoscaler=testas");
    assert_eq!(AUTOSCALER_SELECTOR.decode(selector), "testas");
}
