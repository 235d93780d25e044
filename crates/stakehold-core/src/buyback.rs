//! Fee-buyback settlement.
//!
//! Converts a fee paid in any asset into the reward asset and credits it to a
//! referral account through a plugin's `increase_claimable_by`.

use crate::env::{Env, Transactional};
use crate::errors::{LedgerError, LedgerResult};
use crate::events::LedgerEvent;
use crate::guard::ReentrancyGuard;
use serde::{Deserialize, Serialize};
use stakehold_types::{Address, Amount};
use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};
use tracing::{debug, info};

/// Sentinel address standing for the chain-native gas asset.
pub const NATIVE_ASSET: Address = Address::new([0xee; 20]);

/// Opaque external call endpoint (wallet module, swap aggregator).
pub trait CallTarget {
    /// Address of the endpoint.
    fn address(&self) -> Address;

    /// Executes `payload` on behalf of `caller`.
    fn call(&self, env: &Env, caller: Address, payload: &[u8]) -> Result<(), String>;
}

/// The credit half of a yield plugin, as the buyback uses it.
pub trait ClaimableCredit {
    /// Address of the plugin.
    fn address(&self) -> Address;

    /// Pulls `amount` of reward asset from `caller` and credits `account`.
    fn increase_claimable_by(
        &self,
        caller: Address,
        account: Address,
        amount: Amount,
    ) -> LedgerResult<bool>;
}

/// Deployment parameters for [`FeeBuyback`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuybackConfig {
    /// Address the component is deployed at.
    pub address: Address,
    /// Asset referral credit is paid in.
    pub reward_asset: Address,
    /// Account fees are pulled from.
    pub safe: Address,
    /// Initial executor.
    pub executor: Address,
    /// Initial owner set.
    #[serde(default)]
    pub owners: Vec<Address>,
}

#[derive(Clone)]
struct Governance {
    executor: Address,
    nominee: Option<Address>,
    owners: BTreeSet<Address>,
}

/// Fee-buyback settlement component.
pub struct FeeBuyback {
    env: Rc<Env>,
    address: Address,
    reward_asset: Address,
    safe: Address,
    swap_aggregator: Rc<dyn CallTarget>,
    plugin: Rc<dyn ClaimableCredit>,
    governance: RefCell<Governance>,
    guard: ReentrancyGuard,
}

impl FeeBuyback {
    /// Deploys the component, wired to its swap aggregator and credit plugin.
    pub fn deploy(
        env: &Rc<Env>,
        config: BuybackConfig,
        swap_aggregator: Rc<dyn CallTarget>,
        plugin: Rc<dyn ClaimableCredit>,
    ) -> Rc<Self> {
        let buyback = Rc::new(Self {
            env: Rc::clone(env),
            address: config.address,
            reward_asset: config.reward_asset,
            safe: config.safe,
            swap_aggregator,
            plugin,
            governance: RefCell::new(Governance {
                executor: config.executor,
                nominee: None,
                owners: config.owners.into_iter().collect(),
            }),
            guard: ReentrancyGuard::new(),
        });
        let weak: Weak<dyn Transactional> = Rc::downgrade(&buyback) as Weak<dyn Transactional>;
        env.register(weak);
        buyback
    }

    /// Address of the component.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Current executor.
    pub fn executor(&self) -> Address {
        self.governance.borrow().executor
    }

    /// Pending executor nomination, if any.
    pub fn nominee(&self) -> Option<Address> {
        self.governance.borrow().nominee
    }

    /// Whether `account` is an owner.
    pub fn is_owner(&self, account: &Address) -> bool {
        self.governance.borrow().owners.contains(account)
    }

    /// Current owners in address order.
    pub fn owners(&self) -> Vec<Address> {
        self.governance.borrow().owners.iter().copied().collect()
    }

    /// Runs the wallet payload, then converts the fee and credits `referral`.
    ///
    /// Returns `false` when there is nothing to credit: zero fee asset, zero
    /// referral or zero amount. The wallet call still has to succeed.
    #[allow(clippy::too_many_arguments)]
    pub fn submit(
        &self,
        caller: Address,
        wallet: &dyn CallTarget,
        wallet_payload: &[u8],
        fee_asset: Address,
        referral: Address,
        fee_amount: Amount,
        swap_payload: &[u8],
    ) -> LedgerResult<bool> {
        self.env.atomic(|| {
            let _entered = self.guard.enter()?;
            self.require_owner(caller, "submit")?;

            debug!(wallet = %wallet.address(), "wallet call");
            wallet
                .call(&self.env, self.address, wallet_payload)
                .map_err(LedgerError::WalletExecutionFailed)?;

            if fee_asset.is_zero() || referral.is_zero() || fee_amount == 0 {
                return Ok(false);
            }

            if fee_asset != self.reward_asset {
                if fee_asset != NATIVE_ASSET {
                    self.pull_from_safe(fee_asset, fee_amount)?;
                    self.env.approve(
                        fee_asset,
                        self.address,
                        self.swap_aggregator.address(),
                        fee_amount,
                    );
                }
                debug!(aggregator = %self.swap_aggregator.address(), %fee_asset, "swap call");
                self.swap_aggregator
                    .call(&self.env, self.address, swap_payload)
                    .map_err(LedgerError::SwapExecutionFailed)?;
            } else {
                self.pull_from_safe(fee_asset, fee_amount)?;
            }

            let credited = self.credit(referral)?;
            info!(%fee_asset, %referral, fee = %fee_amount, credited = %credited, "referral credited");
            self.env.emit(
                self.address,
                LedgerEvent::ReferralCredited {
                    fee_asset,
                    referral,
                    fee_amount,
                    credited,
                },
            );
            Ok(true)
        })
    }

    /// Adds an owner. Executor only.
    pub fn add_owner(&self, caller: Address, owner: Address) -> LedgerResult<()> {
        self.env.atomic(|| {
            let _entered = self.guard.enter()?;
            let added = {
                let mut gov = self.governance.borrow_mut();
                Self::require_executor(&gov, caller, "add owners")?;
                gov.owners.insert(owner)
            };
            if added {
                self.env
                    .emit(self.address, LedgerEvent::OwnerAdded { owner });
            }
            Ok(())
        })
    }

    /// Removes an owner. Executor only.
    pub fn remove_owner(&self, caller: Address, owner: Address) -> LedgerResult<()> {
        self.env.atomic(|| {
            let _entered = self.guard.enter()?;
            let removed = {
                let mut gov = self.governance.borrow_mut();
                Self::require_executor(&gov, caller, "remove owners")?;
                gov.owners.remove(&owner)
            };
            if removed {
                self.env
                    .emit(self.address, LedgerEvent::OwnerRemoved { owner });
            }
            Ok(())
        })
    }

    /// Nominates a successor executor. Takes effect on acceptance.
    pub fn nominate_executor(&self, caller: Address, nominee: Address) -> LedgerResult<()> {
        self.env.atomic(|| {
            let _entered = self.guard.enter()?;
            {
                let mut gov = self.governance.borrow_mut();
                Self::require_executor(&gov, caller, "nominate an executor")?;
                gov.nominee = Some(nominee);
            }
            self.env
                .emit(self.address, LedgerEvent::ExecutorNominated { nominee });
            Ok(())
        })
    }

    /// Completes the handover; callable by the pending nominee only.
    pub fn accept_executor(&self, caller: Address) -> LedgerResult<()> {
        self.env.atomic(|| {
            let _entered = self.guard.enter()?;
            let previous = {
                let mut gov = self.governance.borrow_mut();
                if gov.nominee != Some(caller) {
                    return Err(LedgerError::NotNominated(caller));
                }
                gov.nominee = None;
                std::mem::replace(&mut gov.executor, caller)
            };
            info!(%previous, new = %caller, "executor handed over");
            self.env.emit(
                self.address,
                LedgerEvent::ExecutorAccepted {
                    previous,
                    new: caller,
                },
            );
            Ok(())
        })
    }

    /// Withdraws any asset the component holds. Owner only.
    pub fn rescue(
        &self,
        caller: Address,
        asset: Address,
        to: Address,
        amount: Amount,
    ) -> LedgerResult<()> {
        self.env.atomic(|| {
            let _entered = self.guard.enter()?;
            self.require_owner(caller, "rescue")?;
            self.env.transfer(asset, self.address, to, amount)?;
            self.env
                .emit(self.address, LedgerEvent::Rescued { asset, to, amount });
            Ok(())
        })
    }

    fn pull_from_safe(&self, asset: Address, amount: Amount) -> LedgerResult<()> {
        self.env
            .transfer_from(asset, self.address, self.safe, self.address, amount)?;
        Ok(())
    }

    /// Credits the component's entire reward balance to `referral`.
    fn credit(&self, referral: Address) -> LedgerResult<Amount> {
        let balance = self.env.balance_of(&self.reward_asset, &self.address);
        self.env
            .approve(self.reward_asset, self.address, self.plugin.address(), balance);
        if !self
            .plugin
            .increase_claimable_by(self.address, referral, balance)?
        {
            return Err(LedgerError::InsufficientCredit);
        }
        Ok(balance)
    }

    fn require_owner(&self, caller: Address, action: &'static str) -> LedgerResult<()> {
        if self.governance.borrow().owners.contains(&caller) {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized { caller, action })
        }
    }

    fn require_executor(
        gov: &Governance,
        caller: Address,
        action: &'static str,
    ) -> LedgerResult<()> {
        if gov.executor == caller {
            Ok(())
        } else {
            Err(LedgerError::Unauthorized { caller, action })
        }
    }
}

impl Transactional for FeeBuyback {
    fn snapshot(&self) -> Box<dyn Any> {
        Box::new(self.governance.borrow().clone())
    }

    fn restore(&self, snapshot: Box<dyn Any>) {
        if let Ok(gov) = snapshot.downcast::<Governance>() {
            *self.governance.borrow_mut() = *gov;
        }
    }
}
