//! Integration tests for `avdfleet config`.

#![allow(clippy::expect_used)]

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn avdfleet(config: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("avdfleet"));
    cmd.env("NO_COLOR", "1").env("AVDFLEET_CONFIG", config);
    cmd
}

#[test]
fn test_config_path_honours_env() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("fleet.yaml");
    avdfleet(&path)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(path.display().to_string()));
}

#[test]
fn test_config_flag_overrides_env() {
    let dir = tempfile::tempdir().expect("tempdir");
    let explicit = dir.path().join("explicit.yaml");
    avdfleet(&dir.path().join("env.yaml"))
        .args(["config", "path", "--config"])
        .arg(&explicit)
        .assert()
        .success()
        .stdout(predicate::str::contains("explicit.yaml"));
}

#[test]
fn test_config_set_then_show_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.yaml");
    avdfleet(&path)
        .args(["config", "set", "scheduling.concurrency", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set scheduling.concurrency = 4"));

    let output = avdfleet(&path)
        .args(["config", "show", "--json"])
        .output()
        .expect("spawn");
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["config"]["scheduling"]["concurrency"], 4);
}

#[test]
fn test_config_set_unknown_key_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    avdfleet(&dir.path().join("config.yaml"))
        .args(["config", "set", "payload.colour", "red"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown setting: payload.colour"));
}

#[test]
fn test_config_set_link_without_placeholder_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    avdfleet(&dir.path().join("config.yaml"))
        .args(["config", "set", "payload.link_template", "https://example.test/"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("{userId}"));
}

#[test]
fn test_config_set_concurrency_beyond_port_range_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    avdfleet(&dir.path().join("config.yaml"))
        .args(["config", "set", "scheduling.concurrency", "1000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("an integer in 1..=65"));
}
