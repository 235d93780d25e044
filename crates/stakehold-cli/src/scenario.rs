//! JSON scenario format for `stakehold run`.
//!
//! Every address field takes either a literal `0x…` address or a label;
//! labels are hashed into addresses with [`Address::from_label`] and kept
//! so output can show them again.

use crate::error::CliError;
use serde::Deserialize;
use stakehold_core::{Amount, Role};
use stakehold_types::Address;
use std::collections::BTreeMap;

/// A label or a literal address.
pub type Name = String;

/// Top-level scenario document.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Staked asset (also the reward asset of every plugin).
    pub asset: Name,
    /// Ledger address.
    #[serde(default = "default_ledger")]
    pub ledger: Name,
    /// Initial holder of every ledger role.
    pub admin: Name,
    /// Plugins deployed and registered before the first step.
    #[serde(default)]
    pub plugins: Vec<PluginSetup>,
    /// Optional fee-buyback component.
    #[serde(default)]
    pub buyback: Option<BuybackSetup>,
    /// Operations, executed in order.
    pub steps: Vec<Step>,
}

fn default_ledger() -> Name {
    "ledger".to_string()
}

/// A Simple Plugin to deploy.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PluginSetup {
    pub name: Name,
    pub owner: Name,
    pub increaser: Name,
    /// Register with the ledger at deploy time.
    #[serde(default = "yes")]
    pub register: bool,
}

fn yes() -> bool {
    true
}

/// The fee-buyback component and its fixed-rate swap venue.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuybackSetup {
    #[serde(default = "default_buyback")]
    pub name: Name,
    pub safe: Name,
    pub executor: Name,
    #[serde(default)]
    pub owners: Vec<Name>,
    /// Plugin credited with referral yield.
    pub plugin: Name,
    #[serde(default = "default_aggregator")]
    pub aggregator: Name,
    /// Reward units paid per fee unit.
    #[serde(default = "default_rate")]
    pub swap_rate: Amount,
}

fn default_buyback() -> Name {
    "buyback".to_string()
}

fn default_aggregator() -> Name {
    "aggregator".to_string()
}

fn default_rate() -> Amount {
    1
}

/// One slice of an auxiliary payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuxPart {
    pub to: Name,
    pub hex: String,
}

/// One scenario operation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Advance(u64),
    Mint {
        asset: Name,
        to: Name,
        amount: Amount,
    },
    Approve {
        asset: Name,
        owner: Name,
        spender: Name,
        amount: Amount,
    },
    Transfer {
        asset: Name,
        from: Name,
        to: Name,
        amount: Amount,
    },
    Stake {
        account: Name,
        amount: Amount,
    },
    Exit {
        account: Name,
    },
    Claim {
        account: Name,
        #[serde(default)]
        aux: Vec<AuxPart>,
    },
    ClaimFrom {
        account: Name,
        index: usize,
        #[serde(default)]
        aux: Vec<AuxPart>,
    },
    PartialExit {
        account: Name,
        amount: Amount,
        #[serde(default)]
        aux: Vec<AuxPart>,
    },
    FullExit {
        account: Name,
        #[serde(default)]
        aux: Vec<AuxPart>,
    },
    Slash {
        caller: Name,
        account: Name,
        amount: Amount,
        to: Name,
        #[serde(default)]
        aux: Vec<AuxPart>,
    },
    Credit {
        plugin: Name,
        account: Name,
        amount: Amount,
        /// Defaults to the plugin's increaser.
        #[serde(default)]
        caller: Option<Name>,
    },
    AddPlugin {
        caller: Name,
        plugin: Name,
    },
    RemovePlugin {
        caller: Name,
        index: usize,
    },
    Pause {
        caller: Name,
    },
    Unpause {
        caller: Name,
    },
    GrantRole {
        caller: Name,
        role: Role,
        account: Name,
    },
    RevokeRole {
        caller: Name,
        role: Role,
        account: Name,
    },
    StakeFor {
        caller: Name,
        account: Name,
        amount: Amount,
    },
    ClaimAndExitFor {
        caller: Name,
        account: Name,
        to: Name,
        #[serde(default)]
        aux: Vec<AuxPart>,
    },
    Rescue {
        caller: Name,
        asset: Name,
        to: Name,
        amount: Amount,
    },
    Submit {
        caller: Name,
        fee_asset: Name,
        referral: Name,
        amount: Amount,
        /// Make the wallet call revert.
        #[serde(default)]
        wallet_reverts: bool,
    },
    /// Asserts ledger views for an account.
    Check {
        account: Name,
        #[serde(default)]
        staked: Option<Amount>,
        #[serde(default)]
        claimable: Option<Amount>,
        #[serde(default)]
        balance: Option<Amount>,
    },
}

impl Step {
    /// Snake-case name of the step.
    pub fn name(&self) -> &'static str {
        match self {
            Step::Advance(_) => "advance",
            Step::Mint { .. } => "mint",
            Step::Approve { .. } => "approve",
            Step::Transfer { .. } => "transfer",
            Step::Stake { .. } => "stake",
            Step::Exit { .. } => "exit",
            Step::Claim { .. } => "claim",
            Step::ClaimFrom { .. } => "claim_from",
            Step::PartialExit { .. } => "partial_exit",
            Step::FullExit { .. } => "full_exit",
            Step::Slash { .. } => "slash",
            Step::Credit { .. } => "credit",
            Step::AddPlugin { .. } => "add_plugin",
            Step::RemovePlugin { .. } => "remove_plugin",
            Step::Pause { .. } => "pause",
            Step::Unpause { .. } => "unpause",
            Step::GrantRole { .. } => "grant_role",
            Step::RevokeRole { .. } => "revoke_role",
            Step::StakeFor { .. } => "stake_for",
            Step::ClaimAndExitFor { .. } => "claim_and_exit_for",
            Step::Rescue { .. } => "rescue",
            Step::Submit { .. } => "submit",
            Step::Check { .. } => "check",
        }
    }
}

/// Resolves names to addresses and remembers labels for display.
#[derive(Debug, Default)]
pub struct Labels {
    known: BTreeMap<Address, String>,
}

impl Labels {
    /// Resolves `name`, recording it if it is a label.
    pub fn resolve(&mut self, name: &str) -> Result<Address, CliError> {
        if name.starts_with("0x") {
            return Ok(Address::parse(name)?);
        }
        if name.is_empty() {
            return Err(CliError::Usage("empty label".to_string()));
        }
        let address = Address::from_label(name);
        self.known.entry(address).or_insert_with(|| name.to_string());
        Ok(address)
    }

    /// Label recorded for `address`, if any.
    pub fn label_of(&self, address: &Address) -> Option<&str> {
        self.known.get(address).map(String::as_str)
    }

    /// Label when known, hex otherwise.
    pub fn display(&self, address: &Address) -> String {
        match self.label_of(address) {
            Some(label) => label.to_string(),
            None => address.to_string(),
        }
    }

    /// All recorded labels.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &String)> {
        self.known.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_scenario() {
        let scenario: Scenario = serde_json::from_str(
            r#"{
                "asset": "STK",
                "admin": "admin",
                "plugins": [{ "name": "rewards", "owner": "admin", "increaser": "ops" }],
                "steps": [
                    { "mint": { "asset": "STK", "to": "alice", "amount": 20 } },
                    { "advance": 2 },
                    { "grant_role": { "caller": "admin", "role": "slasher", "account": "ops" } },
                    { "claim": { "account": "alice", "aux": [{ "to": "rewards", "hex": "0a0b" }] } }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(scenario.ledger, "ledger");
        assert!(scenario.plugins[0].register);
        assert_eq!(scenario.steps.len(), 4);
        assert_eq!(scenario.steps[2].name(), "grant_role");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = serde_json::from_str::<Scenario>(
            r#"{ "asset": "STK", "admin": "a", "steps": [], "colour": "blue" }"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn labels_round_trip_for_display() {
        let mut labels = Labels::default();
        let alice = labels.resolve("alice").unwrap();
        assert_eq!(labels.display(&alice), "alice");
        let literal = labels
            .resolve("0x00000000000000000000000000000000000000ff")
            .unwrap();
        assert_eq!(labels.label_of(&literal), None);
        assert!(labels.resolve("").is_err());
    }
}
