// Result Sink Port
// Observer for run progress; the core never blocks on it.

use crate::domain::SessionOutcome;

/// Receives run notifications.
///
/// Called from session tasks on arbitrary runtime threads. Front ends that need
/// a specific thread (e.g. a UI thread) must marshal the call themselves.
pub trait ResultSink: Send + Sync {
    /// A session for `address` was launched
    fn on_progress(&self, address: &str);

    /// Every session of the run reached a terminal state. Fired once per run.
    fn on_all_finished(&self);

    /// A single session ended
    fn on_session_finished(&self, _address: &str, _outcome: &SessionOutcome) {}

    /// The run was cancelled via `stop_run`
    fn on_run_stopped(&self) {}
}

/// Sink that ignores everything
pub struct NoopSink;

impl ResultSink for NoopSink {
    fn on_progress(&self, _address: &str) {}
    fn on_all_finished(&self) {}
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Default, Clone)]
    pub struct SinkEvents {
        pub progress: Vec<String>,
        pub finished: Vec<(String, SessionOutcome)>,
        pub all_finished: usize,
        pub stopped: usize,
    }

    /// Sink recording every notification
    #[derive(Default)]
    pub struct RecordingSink {
        events: Mutex<SinkEvents>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> SinkEvents {
            self.events.lock().unwrap().clone()
        }

        pub fn all_finished_count(&self) -> usize {
            self.events.lock().unwrap().all_finished
        }

        pub fn failure_count(&self) -> usize {
            self.events
                .lock()
                .unwrap()
                .finished
                .iter()
                .filter(|(_, outcome)| outcome.is_failure())
                .count()
        }
    }

    impl ResultSink for RecordingSink {
        fn on_progress(&self, address: &str) {
            self.events.lock().unwrap().progress.push(address.to_string());
        }

        fn on_all_finished(&self) {
            self.events.lock().unwrap().all_finished += 1;
        }

        fn on_session_finished(&self, address: &str, outcome: &SessionOutcome) {
            self.events
                .lock()
                .unwrap()
                .finished
                .push((address.to_string(), outcome.clone()));
        }

        fn on_run_stopped(&self) {
            self.events.lock().unwrap().stopped += 1;
        }
    }
}
