// Console ResultSink
// Progress goes to stderr so stdout stays clean for the summary.

use colored::Colorize;
use std::sync::atomic::{AtomicUsize, Ordering};

use netprobe_core::domain::SessionOutcome;
use netprobe_core::port::ResultSink;

/// Prints run notifications as they happen
#[derive(Default)]
pub struct ConsoleSink {
    failures: AtomicUsize,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sessions that ended in a failure outcome
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

impl ResultSink for ConsoleSink {
    fn on_progress(&self, address: &str) {
        eprintln!("{} {}", "▶".cyan(), format!("Probing {}", address).bold());
    }

    fn on_session_finished(&self, address: &str, outcome: &SessionOutcome) {
        if outcome.is_failure() {
            self.failures.fetch_add(1, Ordering::SeqCst);
            eprintln!("  {} {} {}", "✗".red(), address, outcome);
        } else {
            eprintln!("  {} {} {}", "✓".green(), address, outcome);
        }
    }

    fn on_all_finished(&self) {
        eprintln!("{}", "✓ All probes finished".green().bold());
    }

    fn on_run_stopped(&self) {
        eprintln!("{}", "■ Run stopped".yellow().bold());
    }
}
