//! Staking ledger: checkpointed stake per account plus yield aggregated over
//! a registry of plugins.
//!
//! Every payout from plugins is settlement-verified: the ledger compares the
//! sum the plugins report against the balance change it observes at the
//! recipient, and fails the whole operation on any difference.
//!
//! Plugins are notified of every stake change before the new checkpoint is
//! written, regardless of [`YieldPlugin::requires_notification`].
//!
//! Only mutating operations take the reentrancy guard. Read-only views stay
//! unguarded, so a plugin that calls back into a view during notification
//! observes the pre-transition state instead of failing.
//!
//! Removing a plugin drops it from every aggregate view. Yield it still owes
//! stays in its custody and can only be paid out by calling the plugin
//! directly with this ledger as caller.

use crate::access::{AccessControl, Role};
use crate::checkpoints::Checkpoints;
use crate::env::{Env, Transactional};
use crate::errors::{LedgerError, LedgerResult};
use crate::events::LedgerEvent;
use crate::guard::ReentrancyGuard;
use crate::plugin::YieldPlugin;
use serde::{Deserialize, Serialize};
use stakehold_types::{Address, Amount, TimeIndex};
use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};
use tracing::{debug, info, warn};

/// Deployment parameters for [`StakingLedger`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Address the ledger is deployed at.
    pub address: Address,
    /// Asset that is staked (and that plugins pay yield in).
    pub asset: Address,
    /// Initial holder of every role.
    pub admin: Address,
}

#[derive(Clone, Default)]
struct LedgerState {
    stakes: HashMap<Address, Checkpoints>,
    total_staked: Checkpoints,
    plugins: Vec<Rc<dyn YieldPlugin>>,
    members: HashSet<Address>,
    access: AccessControl,
}

/// The staking ledger.
pub struct StakingLedger {
    env: Rc<Env>,
    address: Address,
    asset: Address,
    state: RefCell<LedgerState>,
    guard: ReentrancyGuard,
}

impl StakingLedger {
    /// Deploys the ledger into `env`; `config.admin` receives every role.
    pub fn deploy(env: &Rc<Env>, config: LedgerConfig) -> Rc<Self> {
        let ledger = Rc::new(Self {
            env: Rc::clone(env),
            address: config.address,
            asset: config.asset,
            state: RefCell::new(LedgerState {
                access: AccessControl::with_admin(config.admin),
                ..LedgerState::default()
            }),
            guard: ReentrancyGuard::new(),
        });
        let weak: Weak<dyn Transactional> = Rc::downgrade(&ledger) as Weak<dyn Transactional>;
        env.register(weak);
        ledger
    }

    /// Address of the ledger.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Staked asset.
    pub fn asset(&self) -> Address {
        self.asset
    }

    // ------------------------------------------------------------------
    // Public happy path
    // ------------------------------------------------------------------

    /// Stakes `amount` of the caller's funds.
    ///
    /// The caller must have approved the ledger for `amount`.
    pub fn stake(&self, caller: Address, amount: Amount) -> LedgerResult<()> {
        self.env.atomic(|| {
            let _entered = self.guard.enter()?;
            self.state.borrow().access.require_not_paused()?;
            self.stake_into(caller, caller, amount)
        })
    }

    /// Withdraws the caller's entire stake; returns the amount withdrawn.
    pub fn exit(&self, caller: Address) -> LedgerResult<Amount> {
        self.env.atomic(|| {
            let _entered = self.guard.enter()?;
            self.state.borrow().access.require_not_paused()?;
            self.exit_to(caller, caller)
        })
    }

    /// Claims the caller's yield from every registered plugin.
    pub fn claim(&self, caller: Address, aux: &[u8]) -> LedgerResult<Amount> {
        self.env.atomic(|| {
            let _entered = self.guard.enter()?;
            self.state.borrow().access.require_not_paused()?;
            self.claim_to(caller, caller, aux)
        })
    }

    /// Claims the caller's yield from the plugin at `index` only.
    pub fn claim_from_individual_plugin(
        &self,
        caller: Address,
        index: usize,
        aux: &[u8],
    ) -> LedgerResult<Amount> {
        self.env.atomic(|| {
            let _entered = self.guard.enter()?;
            self.state.borrow().access.require_not_paused()?;
            let plugin = self.plugin_at(index)?;
            self.settle(&[plugin], caller, caller, aux)
        })
    }

    /// Realizes all yield into stake, then withdraws `amount`.
    pub fn partial_claim_and_exit(
        &self,
        caller: Address,
        amount: Amount,
        aux: &[u8],
    ) -> LedgerResult<Amount> {
        self.env.atomic(|| {
            let _entered = self.guard.enter()?;
            self.state.borrow().access.require_not_paused()?;
            self.claim_and_exit(caller, amount, caller, aux)
        })
    }

    /// Withdraws stake plus all yield; returns the amount withdrawn.
    pub fn full_claim_and_exit(&self, caller: Address, aux: &[u8]) -> LedgerResult<Amount> {
        self.env.atomic(|| {
            let _entered = self.guard.enter()?;
            self.state.borrow().access.require_not_paused()?;
            let amount = self.balance_of(&caller, aux)?;
            let withdrawn = self.claim_and_exit(caller, amount, caller, aux)?;
            let rest = self.exit_to(caller, caller)?;
            withdrawn.checked_add(rest).ok_or(LedgerError::Overflow)
        })
    }

    // ------------------------------------------------------------------
    // Privileged
    // ------------------------------------------------------------------

    /// Forces `amount` out of `account`'s stake and yield to `to`.
    pub fn slash(
        &self,
        caller: Address,
        account: Address,
        amount: Amount,
        to: Address,
        aux: &[u8],
    ) -> LedgerResult<()> {
        self.env.atomic(|| {
            let _entered = self.guard.enter()?;
            self.state.borrow().access.require_role(Role::Slasher, &caller)?;
            self.claim_and_exit(account, amount, to, aux)?;
            info!(ledger = %self.address, %account, %to, amount = %amount, "slashed");
            self.env
                .emit(self.address, LedgerEvent::Slashed { account, to, amount });
            Ok(())
        })
    }

    /// Appends `plugin` to the registry.
    pub fn add_plugin(&self, caller: Address, plugin: Rc<dyn YieldPlugin>) -> LedgerResult<()> {
        self.env.atomic(|| {
            let _entered = self.guard.enter()?;
            let address = plugin.address();
            {
                let mut state = self.state.borrow_mut();
                state.access.require_role(Role::PluginManager, &caller)?;
                if !state.members.insert(address) {
                    return Err(LedgerError::AlreadyRegistered(address));
                }
                state.plugins.push(plugin);
            }
            info!(ledger = %self.address, plugin = %address, "plugin added");
            self.env
                .emit(self.address, LedgerEvent::PluginAdded { plugin: address });
            Ok(())
        })
    }

    /// Removes the plugin at `index`; the last plugin moves into its slot.
    pub fn remove_plugin(&self, caller: Address, index: usize) -> LedgerResult<()> {
        self.env.atomic(|| {
            let _entered = self.guard.enter()?;
            let removed = {
                let mut state = self.state.borrow_mut();
                state.access.require_role(Role::PluginManager, &caller)?;
                let len = state.plugins.len();
                if index >= len {
                    return Err(LedgerError::IndexOutOfBounds { index, len });
                }
                let removed = state.plugins.swap_remove(index).address();
                state.members.remove(&removed);
                removed
            };
            info!(ledger = %self.address, plugin = %removed, index, "plugin removed");
            self.env.emit(
                self.address,
                LedgerEvent::PluginRemoved {
                    plugin: removed,
                    index,
                },
            );
            Ok(())
        })
    }

    /// Stakes `amount` of the caller's funds on behalf of `account`.
    /// Recovery role, paused state only.
    pub fn stake_for(&self, caller: Address, account: Address, amount: Amount) -> LedgerResult<()> {
        self.env.atomic(|| {
            let _entered = self.guard.enter()?;
            self.require_recovery(caller)?;
            self.stake_into(caller, account, amount)
        })
    }

    /// Claims all of `account`'s yield and withdraws its stake to `to`.
    /// Recovery role, paused state only.
    pub fn claim_and_exit_for(
        &self,
        caller: Address,
        account: Address,
        to: Address,
        aux: &[u8],
    ) -> LedgerResult<Amount> {
        self.env.atomic(|| {
            let _entered = self.guard.enter()?;
            self.require_recovery(caller)?;
            let claimed = self.claim_to(account, to, aux)?;
            let exited = self.exit_to(account, to)?;
            claimed.checked_add(exited).ok_or(LedgerError::Overflow)
        })
    }

    /// Withdraws assets the ledger holds but does not account for.
    ///
    /// For the staked asset only the balance above the total staked may
    /// leave.
    pub fn rescue(
        &self,
        caller: Address,
        asset: Address,
        to: Address,
        amount: Amount,
    ) -> LedgerResult<()> {
        self.env.atomic(|| {
            let _entered = self.guard.enter()?;
            let staked = {
                let state = self.state.borrow();
                state.access.require_role(Role::Rescuer, &caller)?;
                state.total_staked.latest()
            };
            if asset == self.asset {
                let surplus = self
                    .env
                    .balance_of(&asset, &self.address)
                    .saturating_sub(staked);
                if amount > surplus {
                    return Err(LedgerError::RescueExceedsSurplus {
                        requested: amount,
                        surplus,
                    });
                }
            }
            self.env.transfer(asset, self.address, to, amount)?;
            self.env
                .emit(self.address, LedgerEvent::Rescued { asset, to, amount });
            Ok(())
        })
    }

    /// Engages the emergency stop.
    pub fn pause(&self, caller: Address) -> LedgerResult<()> {
        self.set_paused(caller, true)
    }

    /// Releases the emergency stop.
    pub fn unpause(&self, caller: Address) -> LedgerResult<()> {
        self.set_paused(caller, false)
    }

    /// Grants `role` to `account`. Admin only.
    pub fn grant_role(&self, caller: Address, role: Role, account: Address) -> LedgerResult<()> {
        self.env.atomic(|| {
            let _entered = self.guard.enter()?;
            let granted = {
                let mut state = self.state.borrow_mut();
                state.access.require_role(Role::Admin, &caller)?;
                state.access.grant(role, account)
            };
            if granted {
                self.env.emit(
                    self.address,
                    LedgerEvent::RoleGranted {
                        role,
                        account,
                        by: caller,
                    },
                );
            }
            Ok(())
        })
    }

    /// Revokes `role` from `account`. Admin only.
    pub fn revoke_role(&self, caller: Address, role: Role, account: Address) -> LedgerResult<()> {
        self.env.atomic(|| {
            let _entered = self.guard.enter()?;
            let revoked = {
                let mut state = self.state.borrow_mut();
                state.access.require_role(Role::Admin, &caller)?;
                state.access.revoke(role, &account)
            };
            if revoked {
                self.env.emit(
                    self.address,
                    LedgerEvent::RoleRevoked {
                        role,
                        account,
                        by: caller,
                    },
                );
            }
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    /// Stake of `account`.
    pub fn staked_by(&self, account: &Address) -> Amount {
        self.state
            .borrow()
            .stakes
            .get(account)
            .map(Checkpoints::latest)
            .unwrap_or(0)
    }

    /// Stake of `account` at a past time index.
    pub fn staked_by_at(&self, account: &Address, index: TimeIndex) -> LedgerResult<Amount> {
        let state = self.state.borrow();
        let empty = Checkpoints::new();
        let history = state.stakes.get(account).unwrap_or(&empty);
        Ok(history.get_at(index, self.env.now())?)
    }

    /// Sum of all stakes.
    pub fn total_staked(&self) -> Amount {
        self.state.borrow().total_staked.latest()
    }

    /// Sum of all stakes at a past time index.
    pub fn total_staked_at(&self, index: TimeIndex) -> LedgerResult<Amount> {
        Ok(self
            .state
            .borrow()
            .total_staked
            .get_at(index, self.env.now())?)
    }

    /// Total stake plus all yield owed by registered plugins.
    pub fn total_supply(&self) -> Amount {
        self.registered()
            .iter()
            .fold(self.total_staked(), |acc, p| {
                acc.saturating_add(p.total_claimable())
            })
    }

    /// Yield owed to `account` across registered plugins.
    pub fn claimable(&self, account: &Address, aux: &[u8]) -> LedgerResult<Amount> {
        self.registered().iter().try_fold(0 as Amount, |acc, p| {
            acc.checked_add(p.claimable(account, aux)?)
                .ok_or(LedgerError::Overflow)
        })
    }

    /// Yield owed to `account` at a past time index, across the plugins
    /// registered now.
    pub fn claimable_at(
        &self,
        account: &Address,
        index: TimeIndex,
        aux: &[u8],
    ) -> LedgerResult<Amount> {
        self.registered().iter().try_fold(0 as Amount, |acc, p| {
            acc.checked_add(p.claimable_at(account, index, aux)?)
                .ok_or(LedgerError::Overflow)
        })
    }

    /// Stake plus claimable yield of `account`.
    pub fn balance_of(&self, account: &Address, aux: &[u8]) -> LedgerResult<Amount> {
        self.staked_by(account)
            .checked_add(self.claimable(account, aux)?)
            .ok_or(LedgerError::Overflow)
    }

    /// Stake plus claimable yield of `account` at a past time index.
    pub fn balance_of_at(
        &self,
        account: &Address,
        index: TimeIndex,
        aux: &[u8],
    ) -> LedgerResult<Amount> {
        self.staked_by_at(account, index)?
            .checked_add(self.claimable_at(account, index, aux)?)
            .ok_or(LedgerError::Overflow)
    }

    /// Number of registered plugins.
    pub fn plugin_count(&self) -> usize {
        self.state.borrow().plugins.len()
    }

    /// Plugin at `index`.
    pub fn plugin_at(&self, index: usize) -> LedgerResult<Rc<dyn YieldPlugin>> {
        let state = self.state.borrow();
        state
            .plugins
            .get(index)
            .cloned()
            .ok_or(LedgerError::IndexOutOfBounds {
                index,
                len: state.plugins.len(),
            })
    }

    /// Whether a plugin with `address` is registered.
    pub fn is_plugin(&self, address: &Address) -> bool {
        self.state.borrow().members.contains(address)
    }

    /// Registered plugin addresses in registry order.
    pub fn plugins(&self) -> Vec<Address> {
        self.registered().iter().map(|p| p.address()).collect()
    }

    /// Whether the emergency stop is engaged.
    pub fn is_paused(&self) -> bool {
        self.state.borrow().access.is_paused()
    }

    /// Whether `account` holds `role`.
    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        self.state.borrow().access.has_role(role, account)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn registered(&self) -> Vec<Rc<dyn YieldPlugin>> {
        self.state.borrow().plugins.clone()
    }

    fn require_recovery(&self, caller: Address) -> LedgerResult<()> {
        let state = self.state.borrow();
        state.access.require_role(Role::Recovery, &caller)?;
        state.access.require_paused()
    }

    fn set_paused(&self, caller: Address, paused: bool) -> LedgerResult<()> {
        self.env.atomic(|| {
            let _entered = self.guard.enter()?;
            {
                let mut state = self.state.borrow_mut();
                state.access.require_role(Role::Pauser, &caller)?;
                state.access.set_paused(paused);
            }
            let event = if paused {
                LedgerEvent::Paused { by: caller }
            } else {
                LedgerEvent::Unpaused { by: caller }
            };
            self.env.emit(self.address, event);
            Ok(())
        })
    }

    fn notify_all(&self, account: Address, before: Amount, after: Amount) -> LedgerResult<()> {
        for plugin in self.registered() {
            debug!(plugin = %plugin.address(), %account, before = %before, after = %after, "notify");
            plugin.notify_stake_change(self.address, account, before, after)?;
        }
        Ok(())
    }

    fn write_stake(&self, account: Address, before: Amount, after: Amount) -> LedgerResult<()> {
        let now = self.env.now();
        let mut state = self.state.borrow_mut();
        let total = state
            .total_staked
            .latest()
            .checked_sub(before)
            .and_then(|rest| rest.checked_add(after))
            .ok_or(LedgerError::Overflow)?;
        state.stakes.entry(account).or_default().push(now, after)?;
        state.total_staked.push(now, total)?;
        debug!(%account, index = now, stake = %after, total = %total, "checkpoint");
        Ok(())
    }

    fn stake_into(&self, payer: Address, account: Address, amount: Amount) -> LedgerResult<()> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }
        let before = self.staked_by(&account);
        let after = before.checked_add(amount).ok_or(LedgerError::Overflow)?;
        self.notify_all(account, before, after)?;
        self.write_stake(account, before, after)?;
        self.env
            .transfer_from(self.asset, self.address, payer, self.address, amount)?;
        info!(ledger = %self.address, %account, amount = %amount, "staked");
        self.env.emit(
            self.address,
            LedgerEvent::StakeChanged {
                account,
                amount_before: before,
                amount_after: after,
            },
        );
        Ok(())
    }

    fn exit_to(&self, account: Address, to: Address) -> LedgerResult<Amount> {
        let stake = self.staked_by(&account);
        if stake == 0 {
            return Ok(0);
        }
        self.notify_all(account, stake, 0)?;
        self.write_stake(account, stake, 0)?;
        self.env.transfer(self.asset, self.address, to, stake)?;
        info!(ledger = %self.address, %account, %to, amount = %stake, "exited");
        self.env.emit(
            self.address,
            LedgerEvent::StakeChanged {
                account,
                amount_before: stake,
                amount_after: 0,
            },
        );
        Ok(stake)
    }

    fn claim_to(&self, account: Address, to: Address, aux: &[u8]) -> LedgerResult<Amount> {
        let plugins = self.registered();
        self.settle(&plugins, account, to, aux)
    }

    /// Claims from `plugins` in order and checks `to` received exactly the
    /// reported total.
    fn settle(
        &self,
        plugins: &[Rc<dyn YieldPlugin>],
        account: Address,
        to: Address,
        aux: &[u8],
    ) -> LedgerResult<Amount> {
        let before = self.env.balance_of(&self.asset, &to);
        let mut reported: Amount = 0;
        for plugin in plugins {
            let claimed = plugin.claim(self.address, account, to, aux)?;
            debug!(plugin = %plugin.address(), %account, claimed = %claimed, "plugin claim");
            reported = reported.checked_add(claimed).ok_or(LedgerError::Overflow)?;
        }
        let after = self.env.balance_of(&self.asset, &to);
        let received = after.saturating_sub(before);
        if after < before || received != reported {
            warn!(%account, %to, reported = %reported, received = %received, "settlement mismatch");
            return Err(LedgerError::SettlementMismatch { reported, received });
        }
        if reported > 0 {
            info!(ledger = %self.address, %account, %to, amount = %reported, "claimed");
            self.env.emit(
                self.address,
                LedgerEvent::Claimed {
                    account,
                    to,
                    amount: reported,
                },
            );
        }
        Ok(reported)
    }

    fn claim_and_exit(
        &self,
        account: Address,
        amount: Amount,
        to: Address,
        aux: &[u8],
    ) -> LedgerResult<Amount> {
        let available = self.balance_of(&account, aux)?;
        if amount > available {
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                available,
            });
        }
        let before = self.staked_by(&account);
        let claimed = self.claim_to(account, self.address, aux)?;
        let realized = before.checked_add(claimed).ok_or(LedgerError::Overflow)?;
        let after = realized
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientBalance {
                requested: amount,
                available: realized,
            })?;
        self.notify_all(account, before, after)?;
        self.write_stake(account, before, after)?;
        self.env.transfer(self.asset, self.address, to, amount)?;
        info!(ledger = %self.address, %account, %to, amount = %amount, remaining = %after, "claim and exit");
        self.env.emit(
            self.address,
            LedgerEvent::StakeChanged {
                account,
                amount_before: before,
                amount_after: after,
            },
        );
        Ok(amount)
    }
}

impl Transactional for StakingLedger {
    fn snapshot(&self) -> Box<dyn Any> {
        Box::new(self.state.borrow().clone())
    }

    fn restore(&self, snapshot: Box<dyn Any>) {
        if let Ok(state) = snapshot.downcast::<LedgerState>() {
            *self.state.borrow_mut() = *state;
        }
    }
}
