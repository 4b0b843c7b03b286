//! Integration tests for `avdfleet plan`.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

/// Config whose adb binary does not exist, so no devices are ever live.
fn offline_config(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("config.yaml");
    std::fs::write(
        &path,
        "template:\n  base: Pixel_7\ntools:\n  adb: /nonexistent/platform-tools/adb\n",
    )
    .expect("write config");
    path
}

fn avdfleet(config: &std::path::Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("avdfleet"));
    cmd.env("NO_COLOR", "1").env("AVDFLEET_CONFIG", config);
    cmd
}

#[test]
fn test_plan_json_allocates_from_first_port() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = avdfleet(&offline_config(&dir))
        .args(["plan", "--total", "2", "--json"])
        .output()
        .expect("spawn");
    assert!(output.status.success(), "{output:?}");

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let instances = value["instances"].as_array().expect("array");
    assert_eq!(instances.len(), 2);
    assert_eq!(instances[0]["identity"], "Pixel_7_copy1");
    assert_eq!(instances[0]["port"], 5554);
    assert_eq!(instances[1]["endpoint"], "emulator-5556");
}

#[test]
fn test_plan_human_warns_when_adb_is_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    avdfleet(&offline_config(&dir))
        .args(["plan", "-n", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pixel_7_copy1"))
        .stdout(predicate::str::contains("emulator-5554"));
}

#[test]
fn test_plan_zero_instances_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    avdfleet(&offline_config(&dir))
        .args(["plan", "--total", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("At least 1 instance is required."));
}

#[test]
fn test_plan_zero_instances_json_error_object() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = avdfleet(&offline_config(&dir))
        .args(["plan", "--total", "0", "--json"])
        .output()
        .expect("spawn");
    assert!(!output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["error"], true);
    assert_eq!(value["code"], "NO_INSTANCES");
}

#[test]
fn test_devices_fails_when_adb_is_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    avdfleet(&offline_config(&dir))
        .arg("devices")
        .assert()
        .failure()
        .stderr(predicate::str::contains("querying /nonexistent/platform-tools/adb"));
}
