//! Typed notifications emitted by ledger components.

use crate::access::Role;
use serde::{Deserialize, Serialize};
use stakehold_types::{Address, Amount, TimeIndex};

/// Notification emitted by a ledger component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEvent {
    /// Stake of `account` moved from `amount_before` to `amount_after`.
    StakeChanged {
        /// Staker.
        account: Address,
        /// Stake before the operation.
        amount_before: Amount,
        /// Stake after the operation.
        amount_after: Amount,
    },
    /// Yield paid out, either by the ledger (aggregate) or by one plugin.
    Claimed {
        /// Account whose yield was claimed.
        account: Address,
        /// Recipient of the funds.
        to: Address,
        /// Amount paid.
        amount: Amount,
    },
    /// Forced withdrawal of stake and yield.
    Slashed {
        /// Slashed account.
        account: Address,
        /// Collector.
        to: Address,
        /// Amount removed.
        amount: Amount,
    },
    /// Plugin appended to the registry.
    PluginAdded {
        /// Plugin address.
        plugin: Address,
    },
    /// Plugin removed from the registry.
    PluginRemoved {
        /// Plugin address.
        plugin: Address,
        /// Slot it occupied before removal.
        index: usize,
    },
    /// Plugin credited yield to an account.
    ClaimableIncreased {
        /// Credited account.
        account: Address,
        /// Credited amount.
        amount: Amount,
    },
    /// Plugin increaser designation changed.
    IncreaserTransferred {
        /// Previous increaser.
        previous: Address,
        /// New increaser.
        new: Address,
    },
    /// Plugin owner changed.
    OwnershipTransferred {
        /// Previous owner.
        previous: Address,
        /// New owner.
        new: Address,
    },
    /// Emergency stop engaged.
    Paused {
        /// Pauser.
        by: Address,
    },
    /// Emergency stop released.
    Unpaused {
        /// Pauser.
        by: Address,
    },
    /// Role granted.
    RoleGranted {
        /// Role.
        role: Role,
        /// New member.
        account: Address,
        /// Granting admin.
        by: Address,
    },
    /// Role revoked.
    RoleRevoked {
        /// Role.
        role: Role,
        /// Former member.
        account: Address,
        /// Revoking admin.
        by: Address,
    },
    /// Unaccounted funds withdrawn.
    Rescued {
        /// Asset withdrawn.
        asset: Address,
        /// Recipient.
        to: Address,
        /// Amount withdrawn.
        amount: Amount,
    },
    /// Fee converted and credited to a referral account.
    ReferralCredited {
        /// Asset the fee was paid in.
        fee_asset: Address,
        /// Credited referral account.
        referral: Address,
        /// Fee amount pulled from the safe.
        fee_amount: Amount,
        /// Reward asset credited.
        credited: Amount,
    },
    /// Owner added to the buyback owner set.
    OwnerAdded {
        /// New owner.
        owner: Address,
    },
    /// Owner removed from the buyback owner set.
    OwnerRemoved {
        /// Removed owner.
        owner: Address,
    },
    /// Executor nominated a successor.
    ExecutorNominated {
        /// Pending executor.
        nominee: Address,
    },
    /// Nominee accepted the executor seat.
    ExecutorAccepted {
        /// Previous executor.
        previous: Address,
        /// New executor.
        new: Address,
    },
}

impl LedgerEvent {
    /// Stable snake_case name of the variant.
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::StakeChanged { .. } => "stake_changed",
            LedgerEvent::Claimed { .. } => "claimed",
            LedgerEvent::Slashed { .. } => "slashed",
            LedgerEvent::PluginAdded { .. } => "plugin_added",
            LedgerEvent::PluginRemoved { .. } => "plugin_removed",
            LedgerEvent::ClaimableIncreased { .. } => "claimable_increased",
            LedgerEvent::IncreaserTransferred { .. } => "increaser_transferred",
            LedgerEvent::OwnershipTransferred { .. } => "ownership_transferred",
            LedgerEvent::Paused { .. } => "paused",
            LedgerEvent::Unpaused { .. } => "unpaused",
            LedgerEvent::RoleGranted { .. } => "role_granted",
            LedgerEvent::RoleRevoked { .. } => "role_revoked",
            LedgerEvent::Rescued { .. } => "rescued",
            LedgerEvent::ReferralCredited { .. } => "referral_credited",
            LedgerEvent::OwnerAdded { .. } => "owner_added",
            LedgerEvent::OwnerRemoved { .. } => "owner_removed",
            LedgerEvent::ExecutorNominated { .. } => "executor_nominated",
            LedgerEvent::ExecutorAccepted { .. } => "executor_accepted",
        }
    }

    /// Accounts the event is about (used for filtering).
    pub fn accounts(&self) -> Vec<Address> {
        match self {
            LedgerEvent::StakeChanged { account, .. }
            | LedgerEvent::ClaimableIncreased { account, .. } => vec![*account],
            LedgerEvent::Claimed { account, to, .. } | LedgerEvent::Slashed { account, to, .. } => {
                vec![*account, *to]
            }
            LedgerEvent::PluginAdded { plugin } | LedgerEvent::PluginRemoved { plugin, .. } => {
                vec![*plugin]
            }
            LedgerEvent::IncreaserTransferred { previous, new }
            | LedgerEvent::OwnershipTransferred { previous, new }
            | LedgerEvent::ExecutorAccepted { previous, new } => vec![*previous, *new],
            LedgerEvent::Paused { by } | LedgerEvent::Unpaused { by } => vec![*by],
            LedgerEvent::RoleGranted { account, by, .. }
            | LedgerEvent::RoleRevoked { account, by, .. } => vec![*account, *by],
            LedgerEvent::Rescued { to, .. } => vec![*to],
            LedgerEvent::ReferralCredited { referral, .. } => vec![*referral],
            LedgerEvent::OwnerAdded { owner } | LedgerEvent::OwnerRemoved { owner } => {
                vec![*owner]
            }
            LedgerEvent::ExecutorNominated { nominee } => vec![*nominee],
        }
    }
}

/// An event together with where and when it was emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Time index at emission.
    pub time_index: TimeIndex,
    /// Address of the emitting component.
    pub emitter: Address,
    /// The event itself.
    pub event: LedgerEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_record_json_shape() {
        let account = Address::new([1; 20]);
        let record = EventRecord {
            time_index: 7,
            emitter: Address::new([2; 20]),
            event: LedgerEvent::StakeChanged {
                account,
                amount_before: 0,
                amount_after: 20,
            },
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["time_index"], 7);
        assert_eq!(value["event"]["stake_changed"]["amount_after"], 20);
        let back: EventRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
        assert_eq!(record.event.name(), "stake_changed");
        assert_eq!(record.event.accounts(), vec![account]);
    }
}
