// Probe Session - one target, one process, one log

use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::stop::{stop_channel, StopSender, StopToken};
use crate::domain::{
    BannerLocale, CommandFactory, SessionOutcome, SessionSnapshot, SessionState, Target,
};
use crate::error::{AppError, Result};
use crate::port::{Clock, LogStore, ProbeLog, ProcessError, ProcessRunner};

/// Collaborators shared by every session of a registry
pub struct SessionContext {
    pub runner: Arc<dyn ProcessRunner>,
    pub log_store: Arc<dyn LogStore>,
    pub commands: Arc<dyn CommandFactory>,
    pub clock: Arc<dyn Clock>,
    pub locale: BannerLocale,
}

/// Managed lifecycle of one probe
///
/// `run` drives the capture loop exactly once; `stop` may be called from any
/// thread at any time.
pub struct ProbeSession {
    target: Target,
    run_started_at: DateTime<Local>,
    started: AtomicBool,
    stop_tx: StopSender,
    stop_rx: StopToken,
    status: watch::Sender<SessionSnapshot>,
}

impl ProbeSession {
    pub fn new(target: Target, run_started_at: DateTime<Local>) -> Self {
        let (stop_tx, stop_rx) = stop_channel();
        let (status, _) = watch::channel(SessionSnapshot::pending(&target, run_started_at));
        Self {
            target,
            run_started_at,
            started: AtomicBool::new(false),
            stop_tx,
            stop_rx,
            status,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn state(&self) -> SessionState {
        self.status.borrow().state
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.status.borrow().clone()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.status.subscribe()
    }

    /// Request stop. Idempotent; a no-op once the session is terminal.
    pub fn stop(&self) {
        if !self.stop_tx.stop() {
            return;
        }
        self.status.send_if_modified(|snapshot| {
            match snapshot.state.transition(SessionState::Stopping) {
                Ok(next) => {
                    snapshot.state = next;
                    true
                }
                Err(_) => false,
            }
        });
        debug!(address = %self.target.address(), "Session stop requested");
    }

    /// Run the session to completion.
    ///
    /// Always ends in a terminal state. Only a second call returns an error.
    pub async fn run(&self, ctx: &SessionContext) -> Result<SessionOutcome> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(AppError::InvalidState(format!(
                "session for {} already ran",
                self.target.address()
            )));
        }

        if !self.begin() {
            info!(address = %self.target.address(), "Session stopped before start");
            return Ok(self.finish(SessionOutcome::Stopped { lines: 0 }));
        }

        let mut log = match ctx.log_store.open(&self.target, self.run_started_at).await {
            Ok(log) => log,
            Err(e) => {
                error!(address = %self.target.address(), error = %e, "Cannot open session log");
                return Ok(self.finish(SessionOutcome::LogFailed {
                    reason: e.to_string(),
                }));
            }
        };
        let log_path = log.path().to_path_buf();
        self.status.send_modify(|snapshot| snapshot.log_path = Some(log_path));

        let mut outcome = self.capture(ctx, log.as_mut()).await;

        // Best effort: the end banner is attempted even after a write failure
        let end = ctx.locale.end_banner(&self.target, ctx.clock.now());
        let closing = match log.append_line(&end).await {
            Ok(()) => log.close().await,
            Err(e) => Err(e),
        };
        if let Err(e) = closing {
            warn!(address = %self.target.address(), error = %e, "Failed to finalize session log");
            if !outcome.is_failure() {
                outcome = SessionOutcome::LogFailed {
                    reason: e.to_string(),
                };
            }
        }

        Ok(self.finish(outcome))
    }

    /// Mark a session whose task died without finishing
    pub(crate) fn abort(&self, reason: impl Into<String>) -> SessionOutcome {
        let outcome = SessionOutcome::Aborted {
            reason: reason.into(),
        };
        if self.state().is_terminal() {
            return outcome;
        }
        self.finish(outcome)
    }

    /// Pending -> Running. False when stop won the race.
    fn begin(&self) -> bool {
        let mut running = false;
        self.status.send_if_modified(|snapshot| {
            if snapshot.state == SessionState::Pending {
                snapshot.state = SessionState::Running;
                running = true;
                true
            } else {
                false
            }
        });
        running
    }

    /// Start banner, spawn, line copy loop, reap
    async fn capture(&self, ctx: &SessionContext, log: &mut dyn ProbeLog) -> SessionOutcome {
        let start = ctx.locale.start_banner(&self.target, ctx.clock.now());
        if let Err(e) = log.append_line(&start).await {
            return SessionOutcome::LogFailed {
                reason: e.to_string(),
            };
        }
        if self.stop_rx.is_stopped() {
            return SessionOutcome::Stopped { lines: 0 };
        }

        let command = ctx.commands.build(&self.target);
        let mut process = match ctx.runner.spawn(&command, self.stop_rx.clone()).await {
            Ok(process) => process,
            Err(e) => {
                let reason = match &e {
                    ProcessError::SpawnFailed { reason, .. } => reason.clone(),
                    other => other.to_string(),
                };
                warn!(
                    address = %self.target.address(),
                    command = %command,
                    error = %reason,
                    "Probe spawn failed"
                );
                let diagnostic = ctx.locale.spawn_failure(&command.to_string(), &reason);
                if let Err(log_err) = log.append_line(&diagnostic).await {
                    warn!(error = %log_err, "Failed to write spawn diagnostic");
                }
                return SessionOutcome::SpawnFailed { reason };
            }
        };

        let pid = process.pid();
        self.status.send_modify(|snapshot| snapshot.pid = pid);
        info!(address = %self.target.address(), command = %command, pid = ?pid, "Probe started");

        let mut lines = 0usize;
        let mut write_error = None;
        while let Some(line) = process.next_line().await {
            if let Err(e) = log.append_line(&line).await {
                write_error = Some(e);
                process.request_stop();
                break;
            }
            lines += 1;
            if self.stop_rx.is_stopped() {
                process.request_stop();
                break;
            }
        }

        let exit = process.wait().await;
        drop(process);

        if let Some(e) = write_error {
            error!(address = %self.target.address(), error = %e, "Session log write failed");
            return SessionOutcome::LogFailed {
                reason: e.to_string(),
            };
        }

        match exit {
            Ok(exit) if exit.forced || self.stop_rx.is_stopped() => {
                SessionOutcome::Stopped { lines }
            }
            Ok(exit) => SessionOutcome::Finished {
                exit_code: exit.code,
                lines,
            },
            Err(e) => SessionOutcome::Aborted {
                reason: e.to_string(),
            },
        }
    }

    fn finish(&self, outcome: SessionOutcome) -> SessionOutcome {
        let state = outcome.final_state();
        let recorded = outcome.clone();
        self.status.send_modify(|snapshot| {
            snapshot.state = state;
            snapshot.outcome = Some(recorded);
        });
        info!(
            address = %self.target.address(),
            state = %state,
            outcome = %outcome,
            "Session finished"
        );
        outcome
    }
}
