// Domain Layer - Pure probe model, no I/O

pub mod command;
pub mod error;
pub mod log_record;
pub mod run;
pub mod session;
pub mod target;

// Re-exports
pub use command::{CommandFactory, HostFamily, PingCommandFactory, ProbeCommand};
pub use error::DomainError;
pub use log_record::{log_file_name, sanitize_address, BannerLocale};
pub use run::RunId;
pub use session::{SessionOutcome, SessionSnapshot, SessionState};
pub use target::{RepeatCount, Target};
