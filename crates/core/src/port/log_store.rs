// Log Store Port
// Where a session's captured output is persisted

use crate::domain::Target;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Log errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogError {
    #[error("Cannot open log {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("Log write failed: {0}")]
    Write(String),

    #[error("Log close failed: {0}")]
    Close(String),
}

/// Opens one log per (address, run)
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Create a fresh log for `target` in the run started at `run_started_at`.
    /// Never reuses or truncates an existing log.
    async fn open(
        &self,
        target: &Target,
        run_started_at: DateTime<Local>,
    ) -> Result<Box<dyn ProbeLog>, LogError>;
}

/// An open, append-only log. Dropping it releases the underlying handle.
#[async_trait]
pub trait ProbeLog: Send {
    fn path(&self) -> &Path;

    /// Append one line and flush it
    async fn append_line(&mut self, line: &str) -> Result<(), LogError>;

    /// Flush and release the handle
    async fn close(self: Box<Self>) -> Result<(), LogError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct Shared {
        logs: HashMap<String, Vec<String>>,
        open: usize,
        closed: usize,
    }

    /// In-memory log store keyed by address
    #[derive(Clone, Default)]
    pub struct MemoryLogStore {
        shared: Arc<Mutex<Shared>>,
        fail_open: Option<String>,
        fail_write_after: Option<usize>,
    }

    impl MemoryLogStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Opening the log for `address` fails
        pub fn failing_open(address: impl Into<String>) -> Self {
            Self {
                fail_open: Some(address.into()),
                ..Self::default()
            }
        }

        /// Every log accepts `n` lines, then writes fail
        pub fn failing_after(n: usize) -> Self {
            Self {
                fail_write_after: Some(n),
                ..Self::default()
            }
        }

        /// Lines written for `address` so far
        pub fn lines(&self, address: &str) -> Vec<String> {
            self.shared
                .lock()
                .unwrap()
                .logs
                .get(address)
                .cloned()
                .unwrap_or_default()
        }

        /// Logs opened but not yet dropped
        pub fn open_count(&self) -> usize {
            self.shared.lock().unwrap().open
        }

        /// Logs closed explicitly via `close`
        pub fn closed_count(&self) -> usize {
            self.shared.lock().unwrap().closed
        }
    }

    #[async_trait]
    impl LogStore for MemoryLogStore {
        async fn open(
            &self,
            target: &Target,
            run_started_at: DateTime<Local>,
        ) -> Result<Box<dyn ProbeLog>, LogError> {
            let path = PathBuf::from(crate::domain::log_file_name(
                target.address(),
                run_started_at,
            ));
            if self.fail_open.as_deref() == Some(target.address()) {
                return Err(LogError::Open {
                    path,
                    reason: "mock open failure".to_string(),
                });
            }
            let mut shared = self.shared.lock().unwrap();
            shared.logs.insert(target.address().to_string(), Vec::new());
            shared.open += 1;
            Ok(Box::new(MemoryLog {
                address: target.address().to_string(),
                path,
                written: 0,
                fail_write_after: self.fail_write_after,
                shared: Arc::clone(&self.shared),
            }))
        }
    }

    struct MemoryLog {
        address: String,
        path: PathBuf,
        written: usize,
        fail_write_after: Option<usize>,
        shared: Arc<Mutex<Shared>>,
    }

    #[async_trait]
    impl ProbeLog for MemoryLog {
        fn path(&self) -> &Path {
            &self.path
        }

        async fn append_line(&mut self, line: &str) -> Result<(), LogError> {
            if self.fail_write_after.is_some_and(|n| self.written >= n) {
                return Err(LogError::Write("mock disk full".to_string()));
            }
            self.written += 1;
            self.shared
                .lock()
                .unwrap()
                .logs
                .entry(self.address.clone())
                .or_default()
                .push(line.to_string());
            Ok(())
        }

        async fn close(self: Box<Self>) -> Result<(), LogError> {
            self.shared.lock().unwrap().closed += 1;
            Ok(())
        }
    }

    impl Drop for MemoryLog {
        fn drop(&mut self) {
            if let Ok(mut shared) = self.shared.lock() {
                shared.open -= 1;
            }
        }
    }
}
