// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid session state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Invalid repeat count: {0} (must be positive)")]
    InvalidRepeatCount(u32),

    #[error("Invalid address: {0:?}")]
    InvalidAddress(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
