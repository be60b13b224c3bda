// Port Layer - Interfaces for external dependencies

pub mod clock; // For deterministic log naming
pub mod log_store;
pub mod process_runner;
pub mod result_sink;

// Re-exports
pub use clock::{Clock, SystemClock};
pub use log_store::{LogError, LogStore, ProbeLog};
pub use process_runner::{ProbeExit, ProbeProcess, ProcessError, ProcessRunner};
pub use result_sink::{NoopSink, ResultSink};
