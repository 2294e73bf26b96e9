use super::*;
use crate::config::TimingConfig;
use crate::consumer::{ConsumerLoop, TickOutcome};
use crate::logging::MemoryLogSink;
use crate::test_support::{FakeAutomation, FakeHost, FakeProbe};
use parking_lot::Mutex;
use std::fs;
use tempfile::TempDir;

struct Fixture {
    _temp: TempDir,
    dirs: BridgeDirs,
    probe: Arc<FakeProbe>,
    automation: Arc<FakeAutomation>,
    sink: Arc<MemoryLogSink>,
    bridge: Bridge,
}

fn fast_config() -> BridgeConfig {
    BridgeConfig {
        timing: TimingConfig {
            await_timeout_ms: 300,
            poll_interval_ms: 10,
            settle_delay_ms: 0,
            ..TimingConfig::default()
        },
        ..BridgeConfig::default()
    }
}

fn fixture_with(config: BridgeConfig, running: bool, automation: FakeAutomation) -> Fixture {
    let temp = TempDir::new().unwrap();
    let dirs = BridgeDirs::new(temp.path());
    let probe = FakeProbe::new(running);
    let automation = Arc::new(automation);
    let sink = Arc::new(MemoryLogSink::default());
    let bridge = Bridge::new(config, dirs.clone(), automation.clone(), probe.clone())
        .with_sink(sink.clone());
    Fixture {
        _temp: temp,
        dirs,
        probe,
        automation,
        sink,
        bridge,
    }
}

fn fixture(running: bool) -> Fixture {
    fixture_with(fast_config(), running, FakeAutomation::default())
}

fn tmp_files(dirs: &BridgeDirs) -> usize {
    fs::read_dir(dirs.tmp_dir())
        .map(|rd| rd.count())
        .unwrap_or(0)
}

fn descriptor_count(dirs: &BridgeDirs) -> usize {
    fs::read_dir(dirs.jobs_dir())
        .map(|rd| {
            rd.filter_map(|e| e.ok())
                .filter(|e| {
                    let name = e.file_name().to_string_lossy().to_string();
                    name.starts_with("rb_") && !name.ends_with(".done.json")
                })
                .count()
        })
        .unwrap_or(0)
}

fn queued_fixture() -> Fixture {
    fixture_with(
        BridgeConfig {
            prefer_queued: true,
            ..fast_config()
        },
        true,
        FakeAutomation::default(),
    )
}

/// Wire the wake call to tick `host` behind a consumer loop, replying the
/// way the wake script does when the loop's gates turn it away
fn wake_ticks(fx: &Fixture, host: FakeHost) -> Arc<Mutex<ConsumerLoop<FakeHost>>> {
    let consumer = Arc::new(Mutex::new(ConsumerLoop::new(
        fx.dirs.clone(),
        host,
        &TimingConfig::default(),
        Arc::new(MemoryLogSink::default()),
    )));
    let ticking = Arc::clone(&consumer);
    fx.automation.on_invoke(move |_| {
        let reply = match ticking.lock().tick().outcome {
            TickOutcome::Stopped => jsx::RESULT_PAUSED,
            TickOutcome::Busy => jsx::RESULT_BUSY,
            _ => jsx::RESULT_OK,
        };
        Some(reply.to_string())
    });
    consumer
}

#[test]
fn test_direct_not_running_leaves_nothing_behind() {
    let fx = fixture(false);

    let result = fx
        .bridge
        .deliver(&Command::run_script_text("alert('hi');"));

    assert!(matches!(result, Err(BridgeError::NotRunning { .. })));
    assert_eq!(tmp_files(&fx.dirs), 0);
    assert_eq!(fx.automation.invocation_count(), 0);
    assert!(fx.automation.launches.lock().is_empty());
    assert!(fx.sink.contains("Host not running"));
}

#[test]
fn test_direct_runs_script_and_deletes_it() {
    let fx = fixture(true);

    let receipt = fx
        .bridge
        .deliver(&Command::import_audio("/tmp/a.wav"))
        .unwrap();

    assert_eq!(receipt, DeliveryReceipt::Executed);
    let invoked = fx.automation.invoked.lock();
    assert_eq!(invoked.len(), 1);
    let (path, text) = &invoked[0];
    assert!(path.starts_with(fx.dirs.tmp_dir()));
    assert!(text.contains("\"/tmp/a.wav\""));
    assert!(text.contains("app.beginUndoGroup"));
    assert!(!path.exists());
    assert_eq!(descriptor_count(&fx.dirs), 0);
}

#[test]
fn test_direct_busy_and_no_session_are_distinct() {
    let busy = fixture_with(
        fast_config(),
        true,
        FakeAutomation::replying(Some(0), jsx::RESULT_BUSY),
    );
    let result = busy.bridge.deliver(&Command::import_audio("/tmp/a.wav"));
    assert!(matches!(result, Err(BridgeError::HostBusy)));
    assert_eq!(tmp_files(&busy.dirs), 0);

    let no_session = fixture_with(
        fast_config(),
        true,
        FakeAutomation::replying(Some(0), jsx::RESULT_NO_SESSION),
    );
    let result = no_session
        .bridge
        .deliver(&Command::import_audio("/tmp/a.wav"));
    assert!(matches!(result, Err(BridgeError::NoActiveSession)));
}

#[test]
fn test_direct_nonzero_exit_is_rejection() {
    let fx = fixture_with(fast_config(), true, FakeAutomation::replying(Some(1), ""));

    let result = fx.bridge.deliver(&Command::run_script_text("1"));

    match result {
        Err(BridgeError::AutomationInvocation { status, .. }) => assert_eq!(status, Some(1)),
        other => panic!("expected AutomationInvocation, got {:?}", other),
    }
    assert_eq!(tmp_files(&fx.dirs), 0);
}

#[test]
fn test_direct_spawn_failure_cleans_temp_script() {
    let fx = fixture_with(fast_config(), true, FakeAutomation::failing_spawn());

    let result = fx.bridge.deliver(&Command::run_script_text("1"));

    assert!(matches!(
        result,
        Err(BridgeError::AutomationInvocation { status: None, .. })
    ));
    assert_eq!(tmp_files(&fx.dirs), 0);
}

#[test]
fn test_mode_selection() {
    let fx = fixture(true);
    assert_eq!(
        fx.bridge.mode_for(&Command::import_audio("/a.wav")),
        DeliveryMode::Direct
    );
    assert_eq!(
        fx.bridge.mode_for(&Command::run_script_file("/a.jsx")),
        DeliveryMode::Queued
    );

    let queued = fixture_with(
        BridgeConfig {
            prefer_queued: true,
            ..fast_config()
        },
        true,
        FakeAutomation::default(),
    );
    assert_eq!(
        queued.bridge.mode_for(&Command::import_audio("/a.wav")),
        DeliveryMode::Queued
    );
    assert_eq!(
        queued.bridge.mode_for(&Command::run_script_text("1")),
        DeliveryMode::Queued
    );
    assert_eq!(queued.bridge.direct.mode(), DeliveryMode::Direct);
    assert_eq!(queued.bridge.queued.mode(), DeliveryMode::Queued);
}

#[test]
fn test_queued_end_to_end_with_consumer() {
    let fx = queued_fixture();
    let consumer = wake_ticks(&fx, FakeHost::with_timeline());

    let receipt = fx
        .bridge
        .deliver(&Command::import_audio("/tmp/a.wav"))
        .unwrap();

    match receipt {
        DeliveryReceipt::Completed(artifact) => {
            assert!(artifact.ok);
            assert_eq!(artifact.operation, "importAudio");
        }
        other => panic!("expected Completed, got {:?}", other),
    }
    let consumer = consumer.lock();
    assert_eq!(consumer.host().bins, vec!["Audio".to_string()]);
    assert_eq!(consumer.host().timeline.len(), 1);
    assert_eq!(descriptor_count(&fx.dirs), 0);
    assert_eq!(fs::read_dir(fx.dirs.jobs_dir()).unwrap().count(), 0);
    assert_eq!(tmp_files(&fx.dirs), 0);
    assert!(fx.automation.invoked.lock()[0].1.contains("relayBridgeTick"));
}

#[test]
fn test_queued_with_selection_is_busy_not_timeout() {
    let fx = queued_fixture();
    let consumer = wake_ticks(
        &fx,
        FakeHost {
            selection: true,
            timeline_open: true,
            ..Default::default()
        },
    );

    let result = fx.bridge.deliver(&Command::run_script_text("1"));

    assert!(matches!(result, Err(BridgeError::HostBusy)), "got {:?}", result);
    assert_eq!(descriptor_count(&fx.dirs), 0);
    assert!(consumer.lock().host().evaluated.is_empty());
    assert!(fx.sink.contains("Host busy"));
}

#[test]
fn test_queued_with_stop_flag_reports_paused() {
    let fx = queued_fixture();
    let consumer = wake_ticks(&fx, FakeHost::with_timeline());
    fx.dirs.ensure().unwrap();
    fs::write(fx.dirs.stop_flag(), "").unwrap();

    let result = fx
        .bridge
        .deliver(&Command::run_script_file("/scripts/fix.jsx"));

    assert!(
        matches!(result, Err(BridgeError::ConsumerPaused)),
        "got {:?}",
        result
    );
    assert_eq!(descriptor_count(&fx.dirs), 0);
    assert!(consumer.lock().host().evaluated.is_empty());
}

#[test]
fn test_queued_timeout_removes_descriptor() {
    // Consumer never runs: the wake call is accepted but nothing happens
    let fx = fixture(true);

    let result = fx
        .bridge
        .deliver(&Command::run_script_file("/scripts/fix.jsx"));

    assert!(matches!(result, Err(BridgeError::Timeout { .. })));
    assert_eq!(descriptor_count(&fx.dirs), 0);
    assert!(fx.sink.contains("Timed out waiting for result"));
}

#[test]
fn test_queued_wake_failure_withdraws_job() {
    let fx = fixture_with(fast_config(), true, FakeAutomation::replying(Some(1), ""));

    let result = fx
        .bridge
        .deliver(&Command::run_script_file("/scripts/fix.jsx"));

    assert!(matches!(
        result,
        Err(BridgeError::AutomationInvocation { .. })
    ));
    assert_eq!(descriptor_count(&fx.dirs), 0);
}

#[test]
fn test_queued_not_running_writes_no_job() {
    let fx = fixture(false);

    let result = fx
        .bridge
        .deliver(&Command::run_script_file("/scripts/fix.jsx"));

    assert!(matches!(result, Err(BridgeError::NotRunning { .. })));
    assert_eq!(descriptor_count(&fx.dirs), 0);
    assert_eq!(fx.automation.invocation_count(), 0);
}

#[test]
fn test_queued_without_await_returns_job() {
    let fx = fixture(true);
    let bridge = fx.bridge.without_await();

    let receipt = bridge
        .deliver(&Command::run_script_file("/scripts/fix.jsx"))
        .unwrap();

    match receipt {
        DeliveryReceipt::Queued(job) => assert!(job.descriptor_path().exists()),
        other => panic!("expected Queued, got {:?}", other),
    }
}

#[test]
fn test_ensure_running_launches_once() {
    let fx = fixture(false);
    fx.automation.launch_starts(fx.probe.clone());

    fx.bridge.ensure_running().unwrap();
    fx.bridge.ensure_running().unwrap();

    assert_eq!(fx.automation.launches.lock().len(), 1);
    assert!(fx.bridge.is_running());
}

#[test]
fn test_ensure_running_reports_host_that_never_came_up() {
    let fx = fixture(false);

    let result = fx.bridge.ensure_running();

    assert!(matches!(result, Err(BridgeError::NotRunning { .. })));
    assert_eq!(fx.automation.launches.lock().len(), 1);
}

#[test]
fn test_restart_refuses_live_host() {
    let fx = fixture(true);
    let script = fx._temp.path().join("once.jsx");
    fs::write(&script, "1;").unwrap();

    let result = fx.bridge.restart_with_script(&script);

    assert!(matches!(result, Err(BridgeError::AlreadyRunning { .. })));
    assert!(fx.automation.launches.lock().is_empty());
}

#[test]
fn test_restart_passes_startup_flag() {
    let fx = fixture(false);
    let script = fx._temp.path().join("once.jsx");
    fs::write(&script, "1;").unwrap();

    fx.bridge.restart_with_script(&script).unwrap();

    let launches = fx.automation.launches.lock();
    assert_eq!(launches.len(), 1);
    assert_eq!(launches[0][0], "-r");
    assert!(launches[0][1].ends_with("once.jsx"));
}
