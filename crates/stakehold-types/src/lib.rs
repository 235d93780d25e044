//! Primitive types for the Stakehold staking ledger.
//!
//! Every component of the ledger speaks in terms of these three values:
//! who ([`Address`]), how much ([`Amount`]) and when ([`TimeIndex`]).
//!
#![deny(missing_docs)]

/// Account and component addresses.
pub mod address;
/// Amount and time-index aliases.
pub mod amount;
/// Validation helpers used by the primitive types.
pub mod validation;

pub use address::{Address, ADDRESS_LEN};
pub use amount::{Amount, TimeIndex};
pub use validation::ValidationError;
