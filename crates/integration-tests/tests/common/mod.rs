//! Shared fixtures: real subprocess runner and file log store, stub commands.

#![allow(dead_code)]

use encoding_rs::UTF_8;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use netprobe_core::application::{RunHandle, SessionContext, SessionRegistry};
use netprobe_core::domain::{BannerLocale, CommandFactory, ProbeCommand, Target};
use netprobe_core::port::clock::mocks::FixedClock;
use netprobe_core::port::result_sink::mocks::RecordingSink;
use netprobe_core::port::{Clock, SystemClock};
use netprobe_infra_system::{FileLogStore, SubprocessRunner, SubprocessRunnerConfig};

/// Runs `sh -c <script>` instead of ping; the script may depend on the target
pub struct ShellCommands<F>(pub F);

impl<F> CommandFactory for ShellCommands<F>
where
    F: Fn(&Target) -> String + Send + Sync,
{
    fn build(&self, target: &Target) -> ProbeCommand {
        ProbeCommand::new("sh", ["-c".to_string(), (self.0)(target)])
    }
}

/// Always launches a program that does not exist
pub struct MissingProgram;

impl CommandFactory for MissingProgram {
    fn build(&self, target: &Target) -> ProbeCommand {
        ProbeCommand::new("/nonexistent/netprobe-stub", [target.address()])
    }
}

pub struct Harness {
    pub registry: SessionRegistry,
    pub sink: Arc<RecordingSink>,
}

pub fn harness(
    log_dir: &Path,
    commands: impl CommandFactory + 'static,
    clock: Option<Arc<FixedClock>>,
) -> Harness {
    let clock: Arc<dyn Clock> = match clock {
        Some(clock) => clock as Arc<dyn Clock>,
        None => Arc::new(SystemClock) as Arc<dyn Clock>,
    };
    let context = SessionContext {
        runner: Arc::new(SubprocessRunner::new(SubprocessRunnerConfig {
            encoding: UTF_8,
            ..SubprocessRunnerConfig::default()
        })),
        log_store: Arc::new(FileLogStore::new(log_dir)),
        commands: Arc::new(commands),
        clock,
        locale: BannerLocale::En,
    };
    let sink = Arc::new(RecordingSink::new());
    Harness {
        registry: SessionRegistry::new(context, sink.clone()),
        sink,
    }
}

/// Stub that sleeps long enough to be stopped, replacing the shell
pub fn blocking_script(_: &Target) -> String {
    "exec sleep 30".to_string()
}

pub async fn wait_finished(handle: &RunHandle, limit: Duration) {
    tokio::time::timeout(limit, handle.wait())
        .await
        .expect("run did not finish in time");
}

/// Poll until every session of the run reports a pid
pub async fn wait_for_pids(handle: &RunHandle) -> Vec<u32> {
    for _ in 0..200 {
        let pids: Vec<u32> = handle.snapshot().iter().filter_map(|s| s.pid).collect();
        if pids.len() == handle.total() {
            return pids;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("sessions never reported their pids");
}

pub fn read_log(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}
