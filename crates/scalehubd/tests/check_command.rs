use std::fs;
use std::path::Path;
use std::process::{Command, Output};

const CONFIG: &str = r#"
[storage]
type = "inline"

[[storage.config.autoscalers]]
namespace = "default"
name = "api"
min_replicas = 2
max_replicas = 4
metrics = [{ name = "load", target = 60 }]

[[storage.config.autoscalers]]
namespace = "batch"
name = "crunch"
max_replicas = 8
metrics = [{ name = "queue", target = 10 }]

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

fn check(config: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_scalehubd"))
        .arg("check")
        .arg("--config")
        .arg(config)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap()
}

#[test]
fn check_prints_declared_autoscalers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scalehub.toml");
    fs::write(&path, CONFIG).unwrap();

    let output = check(&path);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let views: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let views = views.as_array().unwrap();
    assert_eq!(views.len(), 2);

    // Listed in (namespace, name) order.
    assert_eq!(views[0]["namespace"], "batch");
    assert_eq!(views[0]["name"], "crunch");
    assert_eq!(views[1]["name"], "api");
    assert_eq!(views[1]["spec"]["min_replicas"], 2);
    assert_eq!(views[1]["spec"]["metrics"][0]["selector"]["autoscaler"], "api");
}

#[test]
fn check_rejects_missing_scaling_section() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scalehub.toml");
    let without_scaling = CONFIG.replace("[scaling]\ntype = \"sim\"\n", "");
    fs::write(&path, without_scaling).unwrap();

    let output = check(&path);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no scaling client specified"));
    assert!(output.stdout.is_empty());
}

#[test]
fn check_rejects_unknown_provider() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scalehub.toml");
    fs::write(&path, CONFIG.replace("[scaling]\ntype = \"sim\"", "[scaling]\ntype = \"kube\"")).unwrap();

    let output = check(&path);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("kube"));
}

#[test]
fn check_reports_unreadable_config() {
    let dir = tempfile::tempdir().unwrap();

    let output = check(&dir.path().join("absent.toml"));
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to read config"));
}
