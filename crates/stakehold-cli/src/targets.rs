//! Call targets the buyback talks to when driven from a scenario.

use stakehold_core::{Amount, CallTarget, Env, NATIVE_ASSET};
use stakehold_types::Address;

/// Payload that makes [`Wallet`] revert.
pub const REVERT: &[u8] = b"revert";

/// Wallet module that accepts every payload except [`REVERT`].
pub struct Wallet {
    pub address: Address,
}

impl CallTarget for Wallet {
    fn address(&self) -> Address {
        self.address
    }

    fn call(&self, _env: &Env, _caller: Address, payload: &[u8]) -> Result<(), String> {
        if payload == REVERT {
            Err("wallet reverted".to_string())
        } else {
            Ok(())
        }
    }
}

/// Swap venue paying `rate` reward units per fee unit out of its own
/// reward balance. The payload is the 20-byte fee asset address.
pub struct FixedRateAggregator {
    pub address: Address,
    pub reward_asset: Address,
    pub rate: Amount,
}

impl CallTarget for FixedRateAggregator {
    fn address(&self) -> Address {
        self.address
    }

    fn call(&self, env: &Env, caller: Address, payload: &[u8]) -> Result<(), String> {
        let fee_asset = Address::from_slice(payload).map_err(|e| e.to_string())?;
        let amount_in = if fee_asset == NATIVE_ASSET {
            let held = env.balance_of(&fee_asset, &caller);
            env.transfer(fee_asset, caller, self.address, held)
                .map_err(|e| e.to_string())?;
            held
        } else {
            let allowed = env.allowance(&fee_asset, &caller, &self.address);
            env.transfer_from(fee_asset, self.address, caller, self.address, allowed)
                .map_err(|e| e.to_string())?;
            allowed
        };
        let amount_out = amount_in
            .checked_mul(self.rate)
            .ok_or_else(|| "swap output overflows".to_string())?;
        env.transfer(self.reward_asset, self.address, caller, amount_out)
            .map_err(|e| e.to_string())
    }
}
