// Netprobe Infrastructure - System Adapters
// Implements: ProcessRunner, LogStore (ADR-002)

pub mod file_log_store;
pub mod host_encoding;
pub mod line_decoder;
pub mod liveness;
pub mod subprocess_runner;

pub use file_log_store::FileLogStore;
pub use host_encoding::host_encoding;
pub use liveness::{is_alive, lingering};
pub use subprocess_runner::{SubprocessRunner, SubprocessRunnerConfig};
