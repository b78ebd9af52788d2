//! Scratch space error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScratchError {
    #[error("Scratch space already active")]
    AlreadyActive,

    #[error("Scratch space not active")]
    NotActive,

    #[error("Scratch space was torn down and cannot be reactivated")]
    TornDown,

    #[error("No async runtime available to schedule sweeps")]
    NoRuntime,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ScratchResult<T> = Result<T, ScratchError>;
