//! Reference yield plugin: yield is credited explicitly by an increaser.

use crate::buyback::ClaimableCredit;
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
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use tracing::info;

/// Deployment parameters for [`SimplePlugin`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplePluginConfig {
    /// Address the plugin is deployed at.
    pub address: Address,
    /// Asset yield is paid in.
    pub reward_asset: Address,
    /// The only ledger allowed to claim and notify.
    pub ledger: Address,
    /// Administrative owner.
    pub owner: Address,
    /// Account allowed to credit yield.
    pub increaser: Address,
}

#[derive(Debug, Clone, Default)]
struct PluginState {
    owner: Address,
    increaser: Address,
    claimable: HashMap<Address, Checkpoints>,
    total_owed: Amount,
}

/// Yield plugin whose accrual is independent of stake: an increaser deposits
/// reward funds and credits them to accounts, the ledger pays them out.
pub struct SimplePlugin {
    env: Rc<Env>,
    address: Address,
    reward_asset: Address,
    ledger: Address,
    state: RefCell<PluginState>,
    guard: ReentrancyGuard,
}

impl SimplePlugin {
    /// Deploys the plugin into `env`.
    pub fn deploy(env: &Rc<Env>, config: SimplePluginConfig) -> Rc<Self> {
        let plugin = Rc::new(Self {
            env: Rc::clone(env),
            address: config.address,
            reward_asset: config.reward_asset,
            ledger: config.ledger,
            state: RefCell::new(PluginState {
                owner: config.owner,
                increaser: config.increaser,
                ..PluginState::default()
            }),
            guard: ReentrancyGuard::new(),
        });
        let weak: Weak<dyn Transactional> = Rc::downgrade(&plugin) as Weak<dyn Transactional>;
        env.register(weak);
        plugin
    }

    /// Address the plugin is deployed at.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Asset yield is paid in.
    pub fn reward_asset(&self) -> Address {
        self.reward_asset
    }

    /// Ledger allowed to claim.
    pub fn ledger(&self) -> Address {
        self.ledger
    }

    /// Current owner.
    pub fn owner(&self) -> Address {
        self.state.borrow().owner
    }

    /// Current increaser.
    pub fn increaser(&self) -> Address {
        self.state.borrow().increaser
    }

    /// Credits `amount` of yield to `account`, pulling the funds from
    /// `caller`.
    ///
    /// Returns `false` without effect for a zero amount. The caller must be
    /// the increaser and must have approved the plugin for `amount`.
    pub fn increase_claimable_by(
        &self,
        caller: Address,
        account: Address,
        amount: Amount,
    ) -> LedgerResult<bool> {
        self.env.atomic(|| {
            let _entered = self.guard.enter()?;
            if caller != self.state.borrow().increaser {
                return Err(LedgerError::Unauthorized {
                    caller,
                    action: "increase claimable",
                });
            }
            if amount == 0 {
                return Ok(false);
            }
            self.env
                .transfer_from(self.reward_asset, self.address, caller, self.address, amount)?;

            let now = self.env.now();
            {
                let mut state = self.state.borrow_mut();
                let total = state
                    .total_owed
                    .checked_add(amount)
                    .ok_or(LedgerError::Overflow)?;
                let history = state.claimable.entry(account).or_default();
                let credited = history
                    .latest()
                    .checked_add(amount)
                    .ok_or(LedgerError::Overflow)?;
                history.push(now, credited)?;
                state.total_owed = total;
            }
            info!(plugin = %self.address, %account, amount = %amount, "claimable increased");
            self.env
                .emit(self.address, LedgerEvent::ClaimableIncreased { account, amount });
            Ok(true)
        })
    }

    /// Hands the increaser designation to `new`. Owner only.
    pub fn transfer_increaser(&self, caller: Address, new: Address) -> LedgerResult<()> {
        self.env.atomic(|| {
            let previous = {
                let mut state = self.state.borrow_mut();
                self.require_owner(&state, caller)?;
                std::mem::replace(&mut state.increaser, new)
            };
            self.env
                .emit(self.address, LedgerEvent::IncreaserTransferred { previous, new });
            Ok(())
        })
    }

    /// Hands ownership to `new`. Owner only.
    pub fn transfer_ownership(&self, caller: Address, new: Address) -> LedgerResult<()> {
        self.env.atomic(|| {
            let previous = {
                let mut state = self.state.borrow_mut();
                self.require_owner(&state, caller)?;
                std::mem::replace(&mut state.owner, new)
            };
            self.env
                .emit(self.address, LedgerEvent::OwnershipTransferred { previous, new });
            Ok(())
        })
    }

    /// Withdraws assets the plugin holds but does not owe. Owner only.
    ///
    /// For the reward asset only the balance above the total owed may leave.
    pub fn rescue(
        &self,
        caller: Address,
        asset: Address,
        to: Address,
        amount: Amount,
    ) -> LedgerResult<()> {
        self.env.atomic(|| {
            let _entered = self.guard.enter()?;
            let owed = {
                let state = self.state.borrow();
                self.require_owner(&state, caller)?;
                state.total_owed
            };
            if asset == self.reward_asset {
                let surplus = self
                    .env
                    .balance_of(&asset, &self.address)
                    .saturating_sub(owed);
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

    fn require_owner(&self, state: &PluginState, caller: Address) -> LedgerResult<()> {
        if caller == state.owner {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized {
                caller,
                action: "administer plugin",
            })
        }
    }

    fn require_ledger(&self, caller: Address, action: &'static str) -> LedgerResult<()> {
        if caller == self.ledger {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized { caller, action })
        }
    }
}

impl YieldPlugin for SimplePlugin {
    fn address(&self) -> Address {
        self.address
    }

    fn claimable(&self, account: &Address, _aux: &[u8]) -> LedgerResult<Amount> {
        Ok(self
            .state
            .borrow()
            .claimable
            .get(account)
            .map(Checkpoints::latest)
            .unwrap_or(0))
    }

    fn claimable_at(
        &self,
        account: &Address,
        index: TimeIndex,
        _aux: &[u8],
    ) -> LedgerResult<Amount> {
        let state = self.state.borrow();
        let empty = Checkpoints::new();
        let history = state.claimable.get(account).unwrap_or(&empty);
        Ok(history.get_at(index, self.env.now())?)
    }

    fn total_claimable(&self) -> Amount {
        self.state.borrow().total_owed
    }

    fn claim(&self, caller: Address, account: Address, to: Address, _aux: &[u8])
        -> LedgerResult<Amount> {
        self.env.atomic(|| {
            let _entered = self.guard.enter()?;
            self.require_ledger(caller, "claim")?;

            let now = self.env.now();
            let owed = {
                let mut state = self.state.borrow_mut();
                let owed = state
                    .claimable
                    .get(&account)
                    .map(Checkpoints::latest)
                    .unwrap_or(0);
                if owed == 0 {
                    return Ok(0);
                }
                state.claimable.entry(account).or_default().push(now, 0)?;
                state.total_owed = state
                    .total_owed
                    .checked_sub(owed)
                    .ok_or(LedgerError::Overflow)?;
                owed
            };

            self.env.transfer(self.reward_asset, self.address, to, owed)?;
            info!(plugin = %self.address, %account, %to, amount = %owed, "plugin claim");
            self.env.emit(
                self.address,
                LedgerEvent::Claimed {
                    account,
                    to,
                    amount: owed,
                },
            );
            Ok(owed)
        })
    }

    fn notify_stake_change(
        &self,
        caller: Address,
        _account: Address,
        _amount_before: Amount,
        _amount_after: Amount,
    ) -> LedgerResult<()> {
        self.require_ledger(caller, "notify stake change")
    }

    fn requires_notification(&self) -> bool {
        false
    }
}

impl ClaimableCredit for SimplePlugin {
    fn address(&self) -> Address {
        self.address
    }

    fn increase_claimable_by(
        &self,
        caller: Address,
        account: Address,
        amount: Amount,
    ) -> LedgerResult<bool> {
        SimplePlugin::increase_claimable_by(self, caller, account, amount)
    }
}

impl Transactional for SimplePlugin {
    fn snapshot(&self) -> Box<dyn Any> {
        Box::new(self.state.borrow().clone())
    }

    fn restore(&self, snapshot: Box<dyn Any>) {
        if let Ok(state) = snapshot.downcast::<PluginState>() {
            *self.state.borrow_mut() = *state;
        }
    }
}
