// Application Layer - Session orchestration

pub mod constants;
pub mod registry;
pub mod session;
mod stop;

// Re-exports
pub use registry::{RunHandle, SessionRegistry};
pub use session::{ProbeSession, SessionContext};
pub use stop::{stop_channel, StopSender, StopToken};
