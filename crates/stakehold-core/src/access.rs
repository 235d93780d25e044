//! Role sets and the emergency-stop flag.

use crate::errors::LedgerError;
use serde::{Deserialize, Serialize};
use stakehold_types::Address;
use std::collections::{HashMap, HashSet};

/// Privileged roles on the staking ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Grants and revokes roles.
    Admin,
    /// Adds and removes yield plugins.
    PluginManager,
    /// Forces withdrawals to a collector.
    Slasher,
    /// Toggles the pause flag.
    Pauser,
    /// Acts on behalf of accounts while paused.
    Recovery,
    /// Withdraws unaccounted assets.
    Rescuer,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::PluginManager,
        Role::Slasher,
        Role::Pauser,
        Role::Recovery,
        Role::Rescuer,
    ];
}

/// Role membership plus the pause flag.
#[derive(Debug, Clone, Default)]
pub struct AccessControl {
    roles: HashMap<Role, HashSet<Address>>,
    paused: bool,
}

impl AccessControl {
    /// Creates an access set where `admin` holds every role.
    pub fn with_admin(admin: Address) -> Self {
        let mut access = Self::default();
        for role in Role::ALL {
            access.grant(role, admin);
        }
        access
    }

    /// Adds `account` to `role`; returns whether it was newly added.
    pub fn grant(&mut self, role: Role, account: Address) -> bool {
        self.roles.entry(role).or_default().insert(account)
    }

    /// Removes `account` from `role`; returns whether it was a member.
    pub fn revoke(&mut self, role: Role, account: &Address) -> bool {
        self.roles
            .get_mut(&role)
            .map(|set| set.remove(account))
            .unwrap_or(false)
    }

    /// Whether `account` holds `role`.
    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        self.roles
            .get(&role)
            .map(|set| set.contains(account))
            .unwrap_or(false)
    }

    /// Fails with [`LedgerError::MissingRole`] unless `account` holds `role`.
    pub fn require_role(&self, role: Role, account: &Address) -> Result<(), LedgerError> {
        if self.has_role(role, account) {
            Ok(())
        } else {
            Err(LedgerError::MissingRole {
                role,
                account: *account,
            })
        }
    }

    /// Whether the emergency stop is engaged.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Sets the emergency stop.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Fails with [`LedgerError::Paused`] while paused.
    pub fn require_not_paused(&self) -> Result<(), LedgerError> {
        if self.paused {
            Err(LedgerError::Paused)
        } else {
            Ok(())
        }
    }

    /// Fails with [`LedgerError::NotPaused`] unless paused.
    pub fn require_paused(&self) -> Result<(), LedgerError> {
        if self.paused {
            Ok(())
        } else {
            Err(LedgerError::NotPaused)
        }
    }
}
