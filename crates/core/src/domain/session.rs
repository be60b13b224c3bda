// Session Domain Model

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::error::{DomainError, Result};
use super::target::Target;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Pending,
    Running,
    Stopping,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }

    /// Validate a transition. Terminal states are final.
    pub fn transition(self, to: SessionState) -> Result<SessionState> {
        use SessionState::*;
        let allowed = match (self, to) {
            (Pending, Running) | (Pending, Stopping) => true,
            (Running, Stopping) => true,
            (Pending | Running | Stopping, Completed | Failed) => true,
            _ => false,
        };
        if allowed {
            Ok(to)
        } else {
            Err(DomainError::InvalidStateTransition {
                from: self.to_string(),
                to: to.to_string(),
            })
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Pending => write!(f, "PENDING"),
            SessionState::Running => write!(f, "RUNNING"),
            SessionState::Stopping => write!(f, "STOPPING"),
            SessionState::Completed => write!(f, "COMPLETED"),
            SessionState::Failed => write!(f, "FAILED"),
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionOutcome {
    /// The probe process exited on its own
    Finished { exit_code: Option<i32>, lines: usize },
    /// Stop was requested before the process finished
    Stopped { lines: usize },
    /// The probe command could not be launched
    SpawnFailed { reason: String },
    /// The log could not be opened or written
    LogFailed { reason: String },
    /// The session task died (panic or runtime shutdown)
    Aborted { reason: String },
}

impl SessionOutcome {
    /// Terminal state this outcome maps to
    pub fn final_state(&self) -> SessionState {
        match self {
            SessionOutcome::Finished { .. } | SessionOutcome::Stopped { .. } => {
                SessionState::Completed
            }
            _ => SessionState::Failed,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.final_state() == SessionState::Failed
    }

    /// Output lines captured, when the process got far enough to produce any
    pub fn lines(&self) -> Option<usize> {
        match self {
            SessionOutcome::Finished { lines, .. } | SessionOutcome::Stopped { lines } => {
                Some(*lines)
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionOutcome::Finished { exit_code: Some(code), lines } => {
                write!(f, "finished (exit {}, {} lines)", code, lines)
            }
            SessionOutcome::Finished { exit_code: None, lines } => {
                write!(f, "finished (signal, {} lines)", lines)
            }
            SessionOutcome::Stopped { lines } => write!(f, "stopped ({} lines)", lines),
            SessionOutcome::SpawnFailed { reason } => write!(f, "spawn failed: {}", reason),
            SessionOutcome::LogFailed { reason } => write!(f, "log failed: {}", reason),
            SessionOutcome::Aborted { reason } => write!(f, "aborted: {}", reason),
        }
    }
}

/// Point-in-time view of one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub address: String,
    pub repeat_count: u32,
    pub state: SessionState,
    pub started_at: DateTime<Local>,
    pub log_path: Option<PathBuf>,
    pub pid: Option<u32>,
    pub outcome: Option<SessionOutcome>,
}

impl SessionSnapshot {
    pub fn pending(target: &Target, started_at: DateTime<Local>) -> Self {
        Self {
            address: target.address().to_string(),
            repeat_count: target.repeat_count().get(),
            state: SessionState::Pending,
            started_at,
            log_path: None,
            pid: None,
            outcome: None,
        }
    }
}
