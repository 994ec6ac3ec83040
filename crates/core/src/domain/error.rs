// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid job status transition: {from} -> {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Job is terminal and can no longer change: {0}")]
    TerminalJobMutation(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
