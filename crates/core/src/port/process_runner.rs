// Process Runner Port (ADR-002)
// Abstraction for launching one probe command and consuming its output

use crate::application::StopToken;
use crate::domain::ProbeCommand;
use async_trait::async_trait;
use thiserror::Error;

/// Exit summary of a reaped probe process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeExit {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    /// True when the process was terminated on request
    pub forced: bool,
}

impl ProbeExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Process errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("Failed to spawn `{command}`: {reason}")]
    SpawnFailed { command: String, reason: String },

    #[error("Failed to reap process: {0}")]
    WaitFailed(String),

    #[error("Failed to terminate process: {0}")]
    KillFailed(String),
}

/// Launches probe processes
///
/// Implementations:
/// - SubprocessRunner: spawns an OS child process
/// - MockProcessRunner: scripted output for tests
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Spawn `command`. The process observes `stop` between reads.
    ///
    /// # Errors
    /// - ProcessError::SpawnFailed if the program is missing or not executable
    async fn spawn(
        &self,
        command: &ProbeCommand,
        stop: StopToken,
    ) -> Result<Box<dyn ProbeProcess>, ProcessError>;
}

/// A running probe process, owned by exactly one session
#[async_trait]
pub trait ProbeProcess: Send {
    /// OS process id, if the process has one
    fn pid(&self) -> Option<u32>;

    /// Next decoded output line.
    ///
    /// Returns `None` once every output stream is closed, or as soon as stop is
    /// requested (which also triggers termination).
    async fn next_line(&mut self) -> Option<String>;

    /// Request forceful termination. Idempotent.
    fn request_stop(&mut self);

    /// Reap the process, terminating it first if stop was requested.
    async fn wait(&mut self) -> Result<ProbeExit, ProcessError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Scripted behaviour of one mock process
    #[derive(Debug, Clone)]
    pub struct MockScript {
        pub lines: Vec<String>,
        pub line_delay: Duration,
        /// Keep emitting lines until stopped
        pub endless: bool,
        pub exit_code: i32,
        /// Fail to spawn with this reason
        pub spawn_error: Option<String>,
    }

    impl MockScript {
        /// Emit `count` lines then exit 0
        pub fn lines(count: usize, line_delay: Duration) -> Self {
            Self {
                lines: (1..=count).map(|i| format!("reply {}", i)).collect(),
                line_delay,
                endless: false,
                exit_code: 0,
                spawn_error: None,
            }
        }

        /// Emit a line every `line_delay` until stopped
        pub fn endless(line_delay: Duration) -> Self {
            Self {
                endless: true,
                ..Self::lines(0, line_delay)
            }
        }

        pub fn spawn_failure(reason: impl Into<String>) -> Self {
            Self {
                spawn_error: Some(reason.into()),
                ..Self::lines(0, Duration::ZERO)
            }
        }
    }

    type Behavior = dyn Fn(&ProbeCommand) -> MockScript + Send + Sync;

    /// Mock Process Runner for testing
    pub struct MockProcessRunner {
        behavior: Box<Behavior>,
        spawn_count: AtomicUsize,
        live: Arc<AtomicUsize>,
    }

    impl MockProcessRunner {
        pub fn new(behavior: impl Fn(&ProbeCommand) -> MockScript + Send + Sync + 'static) -> Self {
            Self {
                behavior: Box::new(behavior),
                spawn_count: AtomicUsize::new(0),
                live: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Same script for every command
        pub fn with_script(script: MockScript) -> Self {
            Self::new(move |_| script.clone())
        }

        /// Number of successful spawns
        pub fn spawn_count(&self) -> usize {
            self.spawn_count.load(Ordering::SeqCst)
        }

        /// Processes spawned but not yet dropped
        pub fn live_processes(&self) -> usize {
            self.live.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProcessRunner for MockProcessRunner {
        async fn spawn(
            &self,
            command: &ProbeCommand,
            stop: StopToken,
        ) -> Result<Box<dyn ProbeProcess>, ProcessError> {
            let script = (self.behavior)(command);
            if let Some(reason) = script.spawn_error.clone() {
                return Err(ProcessError::SpawnFailed {
                    command: command.to_string(),
                    reason,
                });
            }
            self.spawn_count.fetch_add(1, Ordering::SeqCst);
            self.live.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(MockProbe {
                script,
                stop,
                emitted: 0,
                stop_requested: false,
                live: Arc::clone(&self.live),
            }))
        }
    }

    struct MockProbe {
        script: MockScript,
        stop: StopToken,
        emitted: usize,
        stop_requested: bool,
        live: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ProbeProcess for MockProbe {
        fn pid(&self) -> Option<u32> {
            None
        }

        async fn next_line(&mut self) -> Option<String> {
            if self.stop_requested {
                return None;
            }
            if !self.script.endless && self.emitted >= self.script.lines.len() {
                return None;
            }
            tokio::select! {
                biased;
                _ = self.stop.stopped() => {
                    self.request_stop();
                    None
                }
                _ = tokio::time::sleep(self.script.line_delay) => {
                    let line = self
                        .script
                        .lines
                        .get(self.emitted)
                        .cloned()
                        .unwrap_or_else(|| format!("tick {}", self.emitted + 1));
                    self.emitted += 1;
                    Some(line)
                }
            }
        }

        fn request_stop(&mut self) {
            self.stop_requested = true;
        }

        async fn wait(&mut self) -> Result<ProbeExit, ProcessError> {
            if self.stop_requested {
                Ok(ProbeExit {
                    code: None,
                    forced: true,
                })
            } else {
                Ok(ProbeExit {
                    code: Some(self.script.exit_code),
                    forced: false,
                })
            }
        }
    }

    impl Drop for MockProbe {
        fn drop(&mut self) {
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}
