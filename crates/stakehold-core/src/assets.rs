//! In-memory fungible asset book.
//!
//! Stands in for the external token contracts: balances and allowances keyed
//! by asset address. Every operation validates fully before touching state,
//! so a failed transfer leaves the book unchanged.

use stakehold_types::{Address, Amount};
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised by asset movements.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetError {
    /// Sender does not hold enough of the asset.
    #[error("insufficient balance of {asset} for {account}: have {have}, need {need}")]
    InsufficientBalance {
        /// Asset being moved.
        asset: Address,
        /// Debited account.
        account: Address,
        /// Current balance.
        have: Amount,
        /// Requested amount.
        need: Amount,
    },
    /// Spender was not approved for enough of the asset.
    #[error("insufficient allowance of {asset} from {owner} to {spender}: have {have}, need {need}")]
    InsufficientAllowance {
        /// Asset being moved.
        asset: Address,
        /// Owner of the funds.
        owner: Address,
        /// Approved spender.
        spender: Address,
        /// Remaining allowance.
        have: Amount,
        /// Requested amount.
        need: Amount,
    },
    /// Credit would overflow the recipient balance.
    #[error("balance overflow")]
    Overflow,
}

/// Balances and allowances for every asset.
#[derive(Debug, Clone, Default)]
pub struct AssetBook {
    balances: HashMap<(Address, Address), Amount>,
    allowances: HashMap<(Address, Address, Address), Amount>,
}

impl AssetBook {
    /// Creates an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of `account` in `asset`.
    pub fn balance_of(&self, asset: &Address, account: &Address) -> Amount {
        self.balances.get(&(*asset, *account)).copied().unwrap_or(0)
    }

    /// Remaining allowance `owner` granted to `spender`.
    pub fn allowance(&self, asset: &Address, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(&(*asset, *owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    /// Creates `amount` of `asset` out of thin air for `to`.
    pub fn mint(&mut self, asset: Address, to: Address, amount: Amount) -> Result<(), AssetError> {
        let balance = self.balance_of(&asset, &to);
        let credited = balance.checked_add(amount).ok_or(AssetError::Overflow)?;
        self.balances.insert((asset, to), credited);
        Ok(())
    }

    /// Sets the allowance `owner` grants `spender`.
    pub fn approve(&mut self, asset: Address, owner: Address, spender: Address, amount: Amount) {
        self.allowances.insert((asset, owner, spender), amount);
    }

    /// Moves `amount` of `asset` from `from` to `to`.
    pub fn transfer(
        &mut self,
        asset: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), AssetError> {
        let have = self.balance_of(&asset, &from);
        if have < amount {
            return Err(AssetError::InsufficientBalance {
                asset,
                account: from,
                have,
                need: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let credited = self
            .balance_of(&asset, &to)
            .checked_add(amount)
            .ok_or(AssetError::Overflow)?;
        self.balances.insert((asset, from), have - amount);
        self.balances.insert((asset, to), credited);
        Ok(())
    }

    /// Moves `amount` of `from`'s funds on behalf of `spender`, consuming
    /// allowance.
    pub fn transfer_from(
        &mut self,
        asset: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), AssetError> {
        let allowed = self.allowance(&asset, &from, &spender);
        if allowed < amount {
            return Err(AssetError::InsufficientAllowance {
                asset,
                owner: from,
                spender,
                have: allowed,
                need: amount,
            });
        }
        self.transfer(asset, from, to, amount)?;
        self.allowances
            .insert((asset, from, spender), allowed - amount);
        Ok(())
    }
}
