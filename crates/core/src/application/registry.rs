// Session Registry - owns the sessions of the current run

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, error, info};

use super::session::{ProbeSession, SessionContext};
use crate::domain::{DomainError, RepeatCount, RunId, SessionOutcome, SessionSnapshot, Target};
use crate::error::Result;
use crate::port::ResultSink;

/// Completion bookkeeping for one run
///
/// `on_session_completed` is the only place the counter changes.
struct RunTracker {
    run_id: RunId,
    total: usize,
    completed: AtomicUsize,
    notified: AtomicBool,
    detached: AtomicBool,
    progress: watch::Sender<usize>,
    sink: Arc<dyn ResultSink>,
}

impl RunTracker {
    fn new(run_id: RunId, total: usize, sink: Arc<dyn ResultSink>) -> Self {
        let (progress, _) = watch::channel(0);
        Self {
            run_id,
            total,
            completed: AtomicUsize::new(0),
            notified: AtomicBool::new(false),
            detached: AtomicBool::new(false),
            progress,
            sink,
        }
    }

    fn on_session_completed(&self, address: &str, outcome: &SessionOutcome) {
        let completed = self.completed.fetch_add(1, Ordering::AcqRel) + 1;
        debug_assert!(completed <= self.total, "more completions than sessions");

        // A stopped or replaced run no longer reports to the sink
        if self.detached.load(Ordering::Acquire) {
            debug!(run_id = %self.run_id, address = %address, "Late completion from detached run");
        } else {
            self.sink.on_session_finished(address, outcome);
            if completed == self.total && !self.notified.swap(true, Ordering::AcqRel) {
                info!(run_id = %self.run_id, sessions = self.total, "All sessions finished");
                self.sink.on_all_finished();
            }
        }

        self.progress.send_if_modified(|seen| {
            if completed > *seen {
                *seen = completed;
                true
            } else {
                false
            }
        });
    }

    fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    fn detach(&self) {
        self.detached.store(true, Ordering::Release);
    }
}

/// Sessions of the run the registry currently tracks
struct ActiveRun {
    tracker: Arc<RunTracker>,
    sessions: Vec<Arc<ProbeSession>>,
}

impl ActiveRun {
    /// Detach from the sink and signal every session. Does not wait.
    fn cancel(self) {
        self.tracker.detach();
        for session in &self.sessions {
            session.stop();
        }
        info!(
            run_id = %self.tracker.run_id,
            sessions = self.sessions.len(),
            "Run cancelled"
        );
    }
}

/// Caller's view of one run
///
/// Stays valid after the registry stops or replaces the run.
#[derive(Clone)]
pub struct RunHandle {
    run_id: RunId,
    total: usize,
    progress: watch::Receiver<usize>,
    sessions: Vec<Arc<ProbeSession>>,
}

impl RunHandle {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Number of sessions in the run
    pub fn total(&self) -> usize {
        self.total
    }

    /// Sessions that reached a terminal state
    pub fn completed(&self) -> usize {
        *self.progress.borrow()
    }

    pub fn is_finished(&self) -> bool {
        self.completed() >= self.total
    }

    /// Wait until every session of the run is terminal.
    ///
    /// Processes are reaped and logs closed once this resolves. Resolves
    /// immediately for an empty run.
    pub async fn wait(&self) {
        let mut progress = self.progress.clone();
        let total = self.total;
        let _ = progress.wait_for(|completed| *completed >= total).await;
    }

    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        self.sessions.iter().map(|s| s.snapshot()).collect()
    }
}

/// Owns the concurrently running sessions of one run at a time
///
/// One tracker per run, sessions kept in target insertion order.
pub struct SessionRegistry {
    context: Arc<SessionContext>,
    sink: Arc<dyn ResultSink>,
    active: Mutex<Option<ActiveRun>>,
}

impl SessionRegistry {
    pub fn new(context: SessionContext, sink: Arc<dyn ResultSink>) -> Self {
        Self {
            context: Arc::new(context),
            sink,
            active: Mutex::new(None),
        }
    }

    /// Validate `addresses` and start one session per address.
    ///
    /// Validation happens before anything else, so an invalid address leaves
    /// the current run untouched. Must be called inside a Tokio runtime.
    ///
    /// # Errors
    /// - DomainError::InvalidRepeatCount for a zero count
    /// - DomainError::InvalidAddress for blank or option-like addresses
    pub fn start_run<I, S>(&self, addresses: I, repeat_count: u32) -> Result<RunHandle>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let count = RepeatCount::new(repeat_count)?;
        let targets = addresses
            .into_iter()
            .map(|address| Target::new(address, count))
            .collect::<std::result::Result<Vec<_>, DomainError>>()?;
        Ok(self.start_targets(targets))
    }

    /// Start a run from prebuilt targets, discarding the previous run first.
    pub fn start_targets(&self, targets: Vec<Target>) -> RunHandle {
        let run_id = RunId::new();
        let started_at = self.context.clock.now();
        let tracker = Arc::new(RunTracker::new(
            run_id,
            targets.len(),
            Arc::clone(&self.sink),
        ));
        let sessions: Vec<Arc<ProbeSession>> = targets
            .into_iter()
            .map(|target| Arc::new(ProbeSession::new(target, started_at)))
            .collect();

        let previous = self.lock_active().replace(ActiveRun {
            tracker: Arc::clone(&tracker),
            sessions: sessions.clone(),
        });
        if let Some(previous) = previous {
            debug!(run_id = %previous.tracker.run_id, "Discarding previous run");
            previous.cancel();
        }

        info!(run_id = %run_id, sessions = sessions.len(), "Starting run");
        for session in &sessions {
            self.launch(Arc::clone(session), Arc::clone(&tracker));
        }

        RunHandle {
            run_id,
            total: tracker.total,
            progress: tracker.progress.subscribe(),
            sessions,
        }
    }

    /// Signal every tracked session to stop and forget them.
    ///
    /// Best effort: returns immediately, sessions unwind on their own. A second
    /// call is a no-op.
    pub fn stop_run(&self) {
        let Some(run) = self.lock_active().take() else {
            debug!("stop_run: no active run");
            return;
        };
        run.cancel();
        self.sink.on_run_stopped();
    }

    /// Snapshots of the tracked sessions, in target order
    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        self.lock_active()
            .as_ref()
            .map(|run| run.sessions.iter().map(|s| s.snapshot()).collect())
            .unwrap_or_default()
    }

    pub fn session_count(&self) -> usize {
        self.lock_active()
            .as_ref()
            .map_or(0, |run| run.sessions.len())
    }

    /// Completed sessions of the tracked run
    pub fn completed_count(&self) -> usize {
        self.lock_active()
            .as_ref()
            .map_or(0, |run| run.tracker.completed())
    }

    fn launch(&self, session: Arc<ProbeSession>, tracker: Arc<RunTracker>) {
        let context = Arc::clone(&self.context);
        self.sink.on_progress(session.target().address());

        tokio::spawn(async move {
            // Inner task isolates panics (ADR-002: a session panic must not
            // leave the run waiting forever)
            let body = {
                let session = Arc::clone(&session);
                tokio::spawn(async move { session.run(&context).await })
            };

            let outcome = match body.await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    error!(address = %session.target().address(), error = %e, "Session rejected");
                    session.abort(e.to_string())
                }
                Err(join_err) => {
                    let reason = if join_err.is_panic() {
                        "session task panicked"
                    } else {
                        "session task cancelled"
                    };
                    error!(address = %session.target().address(), error = ?join_err, "{}", reason);
                    session.abort(reason)
                }
            };

            tracker.on_session_completed(session.target().address(), &outcome);
        });
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveRun>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        let active = self
            .active
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(run) = active {
            run.cancel();
        }
    }
}
