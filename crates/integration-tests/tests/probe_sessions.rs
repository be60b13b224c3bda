//! Probe Session Tests
//!
//! Real child processes (`sh` stubs standing in for ping) writing to real log files.

#![cfg(unix)]

mod common;

use chrono::{Local, TimeZone};
use std::sync::Arc;
use std::time::Duration;

use netprobe_core::domain::{SessionOutcome, SessionState};
use netprobe_core::port::clock::mocks::FixedClock;

use common::{harness, read_log, wait_finished, MissingProgram, ShellCommands};

fn reply_script(target: &netprobe_core::domain::Target) -> String {
    format!(
        "for i in $(seq 1 {}); do echo \"reply from {} seq=$i\"; done",
        target.repeat_count(),
        target.address()
    )
}

/// M output lines end up between the two banners, in order
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_output_lines_framed_by_banners() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), ShellCommands(reply_script), None);

    let handle = h.registry.start_run(["10.0.0.1"], 4).unwrap();
    wait_finished(&handle, Duration::from_secs(10)).await;

    let snapshot = &handle.snapshot()[0];
    assert_eq!(snapshot.state, SessionState::Completed);
    assert_eq!(
        snapshot.outcome,
        Some(SessionOutcome::Finished {
            exit_code: Some(0),
            lines: 4
        })
    );

    let lines = read_log(snapshot.log_path.as_ref().unwrap());
    assert_eq!(lines.len(), 6);
    assert!(lines[0].contains("Starting probe of 10.0.0.1, count: 4"));
    for (i, line) in lines[1..5].iter().enumerate() {
        assert_eq!(line, &format!("reply from 10.0.0.1 seq={}", i + 1));
    }
    assert!(lines[5].contains("Probe finished: 10.0.0.1"));

    assert_eq!(h.sink.all_finished_count(), 1);
}

/// stderr is captured alongside stdout
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stderr_is_logged() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(
        dir.path(),
        ShellCommands(|_: &netprobe_core::domain::Target| {
            "echo 'Request timed out.'; echo 'ping: unknown host' 1>&2; exit 2".to_string()
        }),
        None,
    );

    let handle = h.registry.start_run(["bad.invalid"], 1).unwrap();
    wait_finished(&handle, Duration::from_secs(10)).await;

    let snapshot = &handle.snapshot()[0];
    let lines = read_log(snapshot.log_path.as_ref().unwrap());
    assert!(lines.iter().any(|l| l == "Request timed out."));
    assert!(lines.iter().any(|l| l == "ping: unknown host"));
    assert_eq!(
        snapshot.outcome,
        Some(SessionOutcome::Finished {
            exit_code: Some(2),
            lines: 2
        })
    );
}

/// A missing probe program leaves a diagnostic in the log and still completes the run
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_spawn_failure_is_logged_and_counted() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(dir.path(), MissingProgram, None);

    let handle = h.registry.start_run(["10.0.0.9", "10.0.0.10"], 2).unwrap();
    wait_finished(&handle, Duration::from_secs(10)).await;

    for snapshot in handle.snapshot() {
        assert_eq!(snapshot.state, SessionState::Failed);
        assert!(matches!(
            snapshot.outcome,
            Some(SessionOutcome::SpawnFailed { .. })
        ));
        let lines = read_log(snapshot.log_path.as_ref().unwrap());
        assert!(lines
            .iter()
            .any(|l| l.starts_with("Failed to launch `/nonexistent/netprobe-stub")));
    }
    assert_eq!(h.sink.all_finished_count(), 1);
    assert_eq!(h.sink.failure_count(), 2);
}

/// Two runs on the same address within one second write two files
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_same_second_runs_write_distinct_files() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(FixedClock::new(
        Local.with_ymd_and_hms(2024, 7, 1, 9, 30, 0).unwrap(),
    ));
    let h = harness(dir.path(), ShellCommands(reply_script), Some(clock));

    let first = h.registry.start_run(["example.com"], 1).unwrap();
    wait_finished(&first, Duration::from_secs(10)).await;
    let second = h.registry.start_run(["example.com"], 1).unwrap();
    wait_finished(&second, Duration::from_secs(10)).await;

    let first_path = first.snapshot()[0].log_path.clone().unwrap();
    let second_path = second.snapshot()[0].log_path.clone().unwrap();
    assert_ne!(first_path, second_path);
    assert_eq!(read_log(&first_path).len(), 3);
    assert_eq!(read_log(&second_path).len(), 3);

    let files = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(files, 2);
}

/// Invalid UTF-8 in the output is replaced, not fatal
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_undecodable_output_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(
        dir.path(),
        ShellCommands(|_: &netprobe_core::domain::Target| {
            "printf 'caf\\351 ok\\r\\n'".to_string()
        }),
        None,
    );

    let handle = h.registry.start_run(["10.0.0.3"], 1).unwrap();
    wait_finished(&handle, Duration::from_secs(10)).await;

    let snapshot = &handle.snapshot()[0];
    let lines = read_log(snapshot.log_path.as_ref().unwrap());
    assert_eq!(lines[1], "caf\u{FFFD} ok");
}
