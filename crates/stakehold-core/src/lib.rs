//! Stakehold core: a checkpointed staking ledger with pluggable yield
//! sources.
//!
//! Components run inside an [`Env`], a single-writer environment that owns
//! the clock, the asset balances and the event log and makes every top-level
//! operation atomic:
//!
//! - [`StakingLedger`] tracks stake per account over time and aggregates
//!   yield across registered [`YieldPlugin`]s, verifying every payout
//!   against the balance change it actually observes.
//! - [`SimplePlugin`] is the reference yield source: an increaser credits
//!   yield per account, the ledger claims it.
//! - [`FeeBuyback`] converts fees into the reward asset and credits a
//!   referral account through a plugin.
//! - [`aux_data`] multiplexes one opaque per-call payload across plugins.

#![deny(missing_docs)]

pub mod access;
pub mod assets;
pub mod aux_data;
pub mod buyback;
pub mod checkpoints;
pub mod env;
pub mod errors;
pub mod events;
pub mod guard;
pub mod ledger;
pub mod plugin;
pub mod simple_plugin;

pub use access::{AccessControl, Role};
pub use assets::{AssetBook, AssetError};
pub use aux_data::{AuxData, AuxDataBuilder, AuxDataError, AuxHeader};
pub use buyback::{BuybackConfig, CallTarget, ClaimableCredit, FeeBuyback, NATIVE_ASSET};
pub use checkpoints::{Checkpoint, CheckpointError, Checkpoints};
pub use env::{Env, Transactional};
pub use errors::{ErrorKind, LedgerError, LedgerResult};
pub use events::{EventRecord, LedgerEvent};
pub use guard::ReentrancyGuard;
pub use ledger::{LedgerConfig, StakingLedger};
pub use plugin::YieldPlugin;
pub use simple_plugin::{SimplePlugin, SimplePluginConfig};
pub use stakehold_types::{Address, Amount, TimeIndex};
