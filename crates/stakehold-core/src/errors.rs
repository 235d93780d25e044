//! Ledger error taxonomy.

use crate::access::Role;
use crate::assets::AssetError;
use crate::aux_data::AuxDataError;
use crate::checkpoints::CheckpointError;
use stakehold_types::{Address, Amount};
use thiserror::Error;

/// Error taxonomy shared by every ledger component.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Zero-amount stake.
    #[error("amount must be non-zero")]
    ZeroAmount,
    /// Checkpoint history error.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
    /// Auxiliary payload could not be decoded or sliced.
    #[error("auxiliary data error: {0}")]
    AuxData(#[from] AuxDataError),
    /// Underlying asset transfer failed.
    #[error("asset error: {0}")]
    Asset(#[from] AssetError),
    /// Plugin index past the end of the registry.
    #[error("plugin index {index} out of bounds for {len} plugins")]
    IndexOutOfBounds {
        /// Requested index.
        index: usize,
        /// Registry length.
        len: usize,
    },
    /// Plugin already present in the registry.
    #[error("plugin {0} is already registered")]
    AlreadyRegistered(Address),
    /// Withdrawal exceeds stake plus claimable yield.
    #[error("requested {requested} exceeds available balance {available}")]
    InsufficientBalance {
        /// Requested amount.
        requested: Amount,
        /// Stake plus claimable yield.
        available: Amount,
    },
    /// Caller is not the component allowed to perform `action`.
    #[error("{caller} is not authorized to {action}")]
    Unauthorized {
        /// Rejected caller.
        caller: Address,
        /// Attempted action.
        action: &'static str,
    },
    /// Caller lacks a ledger role.
    #[error("{account} lacks role {role:?}")]
    MissingRole {
        /// Required role.
        role: Role,
        /// Rejected caller.
        account: Address,
    },
    /// Happy-path operation attempted while paused.
    #[error("ledger is paused")]
    Paused,
    /// Recovery operation attempted while not paused.
    #[error("ledger is not paused")]
    NotPaused,
    /// Mutating call re-entered a busy component.
    #[error("reentrant call")]
    Reentrancy,
    /// Plugins reported a different total than the recipient received.
    #[error("settlement mismatch: plugins reported {reported}, recipient received {received}")]
    SettlementMismatch {
        /// Sum of amounts the plugins returned.
        reported: Amount,
        /// Observed balance increase.
        received: Amount,
    },
    /// The buyback's wallet call failed.
    #[error("wallet execution failed: {0}")]
    WalletExecutionFailed(String),
    /// The buyback's swap call failed.
    #[error("swap execution failed: {0}")]
    SwapExecutionFailed(String),
    /// The yield plugin refused the referral credit.
    #[error("referral credit was not accepted")]
    InsufficientCredit,
    /// Rescue would dip into accounted funds.
    #[error("rescue of {requested} exceeds unaccounted surplus {surplus}")]
    RescueExceedsSurplus {
        /// Requested amount.
        requested: Amount,
        /// Balance above the accounted total.
        surplus: Amount,
    },
    /// `accept_executor` called by someone other than the nominee.
    #[error("{0} has no pending executor nomination")]
    NotNominated(Address),
    /// Arithmetic overflow or underflow.
    #[error("arithmetic overflow")]
    Overflow,
}

/// Coarse classification of [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected input: bad amount, index, payload or checkpoint query.
    Validation,
    /// Caller lacks a role or capability.
    Authorization,
    /// Reported and observed asset movement disagree.
    Settlement,
    /// Wallet, swap or credit call failed.
    ExternalCall,
    /// The asset layer refused a transfer.
    Asset,
    /// Component state forbids the call (paused, reentrant).
    State,
}

impl LedgerError {
    /// Returns the taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::ZeroAmount
            | LedgerError::Checkpoint(_)
            | LedgerError::AuxData(_)
            | LedgerError::IndexOutOfBounds { .. }
            | LedgerError::AlreadyRegistered(_)
            | LedgerError::InsufficientBalance { .. }
            | LedgerError::RescueExceedsSurplus { .. }
            | LedgerError::Overflow => ErrorKind::Validation,
            LedgerError::Unauthorized { .. }
            | LedgerError::MissingRole { .. }
            | LedgerError::NotNominated(_) => ErrorKind::Authorization,
            LedgerError::SettlementMismatch { .. } => ErrorKind::Settlement,
            LedgerError::WalletExecutionFailed(_)
            | LedgerError::SwapExecutionFailed(_)
            | LedgerError::InsufficientCredit => ErrorKind::ExternalCall,
            LedgerError::Asset(_) => ErrorKind::Asset,
            LedgerError::Paused | LedgerError::NotPaused | LedgerError::Reentrancy => {
                ErrorKind::State
            }
        }
    }
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
