//! Yield plugin capability interface.

use crate::errors::LedgerResult;
use stakehold_types::{Address, Amount, TimeIndex};

/// A pluggable yield source the staking ledger aggregates over.
///
/// Implementations keep their own per-account claimable history and custody
/// of the reward asset. The ledger calls [`claim`](Self::claim) and
/// [`notify_stake_change`](Self::notify_stake_change) with its own address as
/// `caller`; implementations must reject any other caller.
///
/// `aux` is the full auxiliary payload of the call. Variants that need
/// per-call data extract their slice with
/// [`select_relevant_bytes`](crate::aux_data::select_relevant_bytes).
pub trait YieldPlugin {
    /// Address the plugin is deployed at.
    fn address(&self) -> Address;

    /// Yield currently owed to `account`.
    fn claimable(&self, account: &Address, aux: &[u8]) -> LedgerResult<Amount>;

    /// Yield owed to `account` at a past time index.
    fn claimable_at(&self, account: &Address, index: TimeIndex, aux: &[u8])
        -> LedgerResult<Amount>;

    /// Total yield owed across all accounts.
    fn total_claimable(&self) -> Amount;

    /// Pays out everything owed to `account` to `to`; returns the amount paid.
    fn claim(&self, caller: Address, account: Address, to: Address, aux: &[u8])
        -> LedgerResult<Amount>;

    /// Hook invoked before the ledger records a stake change for `account`.
    fn notify_stake_change(
        &self,
        caller: Address,
        account: Address,
        amount_before: Amount,
        amount_after: Amount,
    ) -> LedgerResult<()>;

    /// Whether the variant relies on stake-change notifications.
    fn requires_notification(&self) -> bool;
}
