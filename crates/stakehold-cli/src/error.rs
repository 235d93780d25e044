use stakehold_core::{AuxDataError, LedgerError};
use stakehold_journal::JournalError;
use stakehold_types::ValidationError;
use thiserror::Error;

/// Everything a command can fail with.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("journal error: {0}")]
    Journal(#[from] JournalError),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("auxiliary data error: {0}")]
    Aux(#[from] AuxDataError),
    #[error("invalid address: {0}")]
    Address(#[from] ValidationError),
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("{0}")]
    Usage(String),
    #[error("check failed: {0}")]
    CheckFailed(String),
    #[error("{failed} of {total} steps failed")]
    StepsFailed { failed: usize, total: usize },
}
