//! End-to-end runs of the fleet service over a scripted adb and emulator.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::rc::Rc;
use std::time::Duration;

use avdfleet_cli::application::services::{Fleet, RunSummary};
use avdfleet_cli::domain::{FleetConfig, PortRange, Retention};
use avdfleet_cli::infra::adb::AdbChannel;

use crate::mocks::{
    AdbRunner, Emulators, FakeLauncher, RecordingReporter, RecordingTemplater, VirtualClock,
};

fn config(concurrency: usize, retention: Retention) -> FleetConfig {
    let mut cfg = FleetConfig::default();
    cfg.payload.artifact = "/srv/app.apk".into();
    cfg.payload.package = "com.example.app".into();
    cfg.payload.link_template = "https://example.test/r/{userId}".into();
    cfg.scheduling.concurrency = concurrency;
    cfg.scheduling.retention = retention;
    cfg
}

struct Harness {
    host: Rc<Emulators>,
    channel: AdbChannel<AdbRunner>,
    launcher: FakeLauncher,
    templater: RecordingTemplater,
    clock: VirtualClock,
    reporter: RecordingReporter,
}

impl Harness {
    fn new(host: Emulators) -> Self {
        Self::with_templater(host, RecordingTemplater::default())
    }

    fn with_templater(host: Emulators, templater: RecordingTemplater) -> Self {
        let host = Rc::new(host);
        Self {
            channel: AdbChannel::new(AdbRunner(Rc::clone(&host)), "adb", Duration::from_secs(5)),
            launcher: FakeLauncher(Rc::clone(&host)),
            host,
            templater,
            clock: VirtualClock::new(),
            reporter: RecordingReporter::default(),
        }
    }

    async fn run(&self, cfg: &FleetConfig, total: usize) -> anyhow::Result<RunSummary> {
        Fleet {
            channel: &self.channel,
            templater: &self.templater,
            launcher: &self.launcher,
            clock: &self.clock,
            reporter: &self.reporter,
            config: cfg,
            ports: PortRange::EMULATOR,
        }
        .run(total)
        .await
    }
}

#[tokio::test]
async fn three_instances_with_limit_two_all_succeed() {
    let h = Harness::new(Emulators::default());
    let summary = h.run(&config(2, Retention::Keep), 3).await.expect("run");

    assert_eq!(summary.succeeded(), 3);
    assert_eq!(summary.failed(), 0);
    assert_eq!(h.reporter.peak_active.get(), 2);
    let endpoints: Vec<&str> = summary.instances.iter().map(|i| i.endpoint.as_str()).collect();
    assert_eq!(endpoints, vec!["emulator-5554", "emulator-5556", "emulator-5558"]);
    assert_eq!(
        *h.templater.made.borrow(),
        vec!["MyAVD3->MyAVD3_copy1", "MyAVD3->MyAVD3_copy2", "MyAVD3->MyAVD3_copy3"]
    );
    // Kept running.
    assert_eq!(h.host.running().len(), 3);
}

#[tokio::test]
async fn limit_at_least_total_runs_everything_at_once() {
    let h = Harness::new(Emulators::default());
    let summary = h.run(&config(3, Retention::Keep), 3).await.expect("run");

    assert_eq!(summary.succeeded(), 3);
    assert_eq!(h.reporter.peak_active.get(), 3);
}

#[tokio::test]
async fn slow_boot_succeeds_while_sibling_holds() {
    // Twenty `0` answers at the 2s poll interval: about 40s of booting,
    // overlapping the first instance's settles and 180s hold.
    let h = Harness::new(Emulators {
        slow_boot: [("emulator-5556".to_string(), 20)].into(),
        ..Emulators::default()
    });
    let cfg = config(2, Retention::Keep);
    let summary = h.run(&cfg, 2).await.expect("run");

    assert_eq!(summary.succeeded(), 2, "{:?}", summary.instances);
    assert_eq!(h.reporter.peak_active.get(), 2);
    assert_eq!(h.host.boot_queries.borrow()["emulator-5556"], 21);
    assert_eq!(h.host.boot_queries.borrow()["emulator-5554"], 1);
    // The sibling's settles and hold advanced the shared clock during the
    // second instance's boot window.
    assert!(h.clock.elapsed() >= cfg.payload.run_time() * 2);
    assert_eq!(
        h.reporter.states_of("MyAVD3_copy2"),
        vec![
            "pending",
            "launching",
            "awaiting-endpoint",
            "awaiting-ready",
            "running",
            "succeeded"
        ]
    );
}

#[tokio::test]
async fn each_instance_gets_link_then_install_then_launch() {
    let h = Harness::new(Emulators::default());
    let summary = h.run(&config(1, Retention::Keep), 1).await.expect("run");

    let cmds = h.host.commands_for("emulator-5554");
    let link_at = cmds.iter().position(|c| c.starts_with("shell am start")).unwrap();
    let install_at = cmds
        .iter()
        .position(|c| c == "install -r /srv/app.apk")
        .unwrap();
    let launch_at = cmds
        .iter()
        .position(|c| c.starts_with("shell monkey -p com.example.app"))
        .unwrap();
    assert!(link_at < install_at && install_at < launch_at, "{cmds:?}");

    let link = summary.instances[0].link.as_deref().expect("link recorded");
    let id: u32 = link
        .strip_prefix("https://example.test/r/")
        .unwrap()
        .parse()
        .unwrap();
    assert!((100_000..=200_000).contains(&id));
    assert!(cmds[link_at].ends_with(link));
}

#[tokio::test]
async fn live_devices_are_skipped_during_allocation() {
    let h = Harness::new(Emulators {
        preexisting: ["emulator-5554".to_string(), "emulator-5558".to_string()].into(),
        ..Emulators::default()
    });
    let summary = h.run(&config(2, Retention::Keep), 2).await.expect("run");
    let ports: Vec<u16> = summary.instances.iter().map(|i| i.port).collect();
    assert_eq!(ports, vec![5556, 5560]);
    assert_eq!(summary.succeeded(), 2);
}

#[tokio::test]
async fn undiscovered_instance_fails_alone() {
    let h = Harness::new(Emulators {
        hidden: ["emulator-5556".to_string()].into(),
        ..Emulators::default()
    });
    let summary = h.run(&config(3, Retention::Keep), 3).await.expect("run");

    assert_eq!(summary.succeeded(), 2);
    let failed = &summary.instances[1];
    assert_eq!(failed.identity, "MyAVD3_copy2");
    assert_eq!(failed.outcome, "failed");
    let reason = failed.reason.as_deref().unwrap();
    assert!(
        reason.starts_with("emulator-5556 did not appear in the device list within"),
        "got: {reason}"
    );
    assert_eq!(
        h.reporter.states_of("MyAVD3_copy2"),
        vec!["pending", "launching", "awaiting-endpoint", "failed"]
    );
    // The payload never reached the undiscovered instance.
    assert!(h.host.commands_for("emulator-5556").is_empty());
}

#[tokio::test]
async fn boot_timeout_fails_only_that_instance() {
    let h = Harness::new(Emulators {
        never_boots: ["emulator-5554".to_string()].into(),
        ..Emulators::default()
    });
    let summary = h.run(&config(2, Retention::Keep), 2).await.expect("run");

    assert_eq!(summary.instances[0].outcome, "failed");
    assert!(
        summary.instances[0]
            .reason
            .as_deref()
            .unwrap()
            .contains("did not finish booting")
    );
    assert_eq!(summary.instances[1].outcome, "succeeded");
    assert!(
        !h.host
            .commands_for("emulator-5554")
            .iter()
            .any(|c| c.starts_with("install"))
    );
}

#[tokio::test]
async fn launch_failure_frees_the_slot() {
    let h = Harness::new(Emulators {
        launch_fails: ["MyAVD3_copy1".to_string()].into(),
        ..Emulators::default()
    });
    let summary = h.run(&config(1, Retention::Keep), 2).await.expect("run");

    assert!(
        summary.instances[0]
            .reason
            .as_deref()
            .unwrap()
            .starts_with("failed to launch emulator")
    );
    assert!(summary.instances[0].log_path.is_none());
    assert_eq!(summary.instances[1].outcome, "succeeded");
}

#[tokio::test]
async fn template_conflict_aborts_before_any_launch() {
    let h = Harness::with_templater(
        Emulators::default(),
        RecordingTemplater {
            conflict_on: Some("MyAVD3_copy2".into()),
            ..RecordingTemplater::default()
        },
    );
    let err = h.run(&config(2, Retention::Keep), 3).await.unwrap_err();

    assert!(format!("{err:#}").contains("Cannot remove stale copy 'MyAVD3_copy2'"));
    assert!(h.reporter.transitions.borrow().is_empty());
    assert!(h.host.running().is_empty());
}

#[tokio::test]
async fn unreachable_device_list_allocates_from_first_port() {
    let h = Harness::new(Emulators {
        devices_fails: true,
        ..Emulators::default()
    });
    let summary = h.run(&config(1, Retention::Keep), 1).await.expect("run");

    assert_eq!(summary.instances[0].port, 5554);
    // Discovery can never succeed while adb is down.
    assert_eq!(summary.instances[0].outcome, "failed");
    assert!(
        h.reporter
            .warnings
            .borrow()
            .iter()
            .any(|w| w.contains("cannot enumerate devices"))
    );
}

#[tokio::test]
async fn terminate_asks_emulator_to_exit() {
    let h = Harness::new(Emulators::default());
    let summary = h.run(&config(2, Retention::Terminate), 2).await.expect("run");

    assert_eq!(summary.succeeded(), 2);
    assert!(h.host.running().is_empty());
    assert!(h.host.killed.borrow().is_empty());
    assert!(
        h.host
            .commands_for("emulator-5556")
            .contains(&"emu kill".to_string())
    );
}

#[tokio::test]
async fn terminate_falls_back_to_killing_the_process() {
    let h = Harness::new(Emulators {
        kill_fails: true,
        ..Emulators::default()
    });
    h.run(&config(2, Retention::Terminate), 2).await.expect("run");

    assert_eq!(
        *h.host.killed.borrow(),
        vec!["emulator-5554".to_string(), "emulator-5556".to_string()]
    );
    assert!(h.host.running().is_empty());
}

#[tokio::test]
async fn summary_serializes_outcomes() {
    let h = Harness::new(Emulators {
        hidden: ["emulator-5554".to_string()].into(),
        ..Emulators::default()
    });
    let summary = h.run(&config(2, Retention::Keep), 2).await.expect("run");
    let json = serde_json::to_value(&summary).unwrap();

    let instances = json["instances"].as_array().unwrap();
    assert_eq!(instances[0]["outcome"], "failed");
    assert!(instances[0]["reason"].is_string());
    assert_eq!(instances[1]["outcome"], "succeeded");
    assert!(instances[1].get("reason").is_none());
    assert_eq!(instances[1]["log_path"], "logs/MyAVD3_copy2.log");
}
