//! `stakehold run`: execute a scenario against a fresh environment.

use crate::error::CliError;
use crate::output;
use crate::scenario::{AuxPart, Labels, Scenario, Step};
use crate::targets::{FixedRateAggregator, Wallet, REVERT};
use serde::Serialize;
use stakehold_core::{
    Amount, AuxDataBuilder, BuybackConfig, Env, FeeBuyback, LedgerConfig, LedgerError,
    SimplePlugin, SimplePluginConfig, StakingLedger, TimeIndex, YieldPlugin,
};
use stakehold_journal::{JournalWriter, WriteOptions};
use stakehold_types::Address;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Result of one step.
#[derive(Debug, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub step: &'static str,
    pub time_index: TimeIndex,
    pub ok: bool,
    pub detail: String,
}

/// Per-account view after the run.
#[derive(Debug, Serialize)]
pub struct AccountSummary {
    pub name: String,
    pub address: Address,
    pub staked: Amount,
    pub claimable: Amount,
    pub wallet: Amount,
}

/// Per-plugin view after the run.
#[derive(Debug, Serialize)]
pub struct PluginSummary {
    pub name: String,
    pub address: Address,
    pub registered: bool,
    pub total_claimable: Amount,
    pub held: Amount,
}

/// Everything `run` prints.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub steps: Vec<StepOutcome>,
    pub time_index: TimeIndex,
    pub total_staked: Amount,
    pub total_supply: Amount,
    pub paused: bool,
    pub plugins: Vec<PluginSummary>,
    pub accounts: Vec<AccountSummary>,
    pub events: usize,
}

impl RunReport {
    /// Number of failed steps.
    pub fn failed(&self) -> usize {
        self.steps.iter().filter(|s| !s.ok).count()
    }
}

struct World {
    env: Rc<Env>,
    labels: Labels,
    asset: Address,
    ledger: Rc<StakingLedger>,
    plugins: BTreeMap<Address, Rc<SimplePlugin>>,
    buyback: Option<Rc<FeeBuyback>>,
    wallet: Wallet,
}

impl World {
    fn build(scenario: &Scenario) -> Result<Self, CliError> {
        let env = Env::new();
        let mut labels = Labels::default();
        let asset = labels.resolve(&scenario.asset)?;
        let admin = labels.resolve(&scenario.admin)?;
        let ledger = StakingLedger::deploy(
            &env,
            LedgerConfig {
                address: labels.resolve(&scenario.ledger)?,
                asset,
                admin,
            },
        );

        let mut plugins = BTreeMap::new();
        for setup in &scenario.plugins {
            let address = labels.resolve(&setup.name)?;
            let plugin = SimplePlugin::deploy(
                &env,
                SimplePluginConfig {
                    address,
                    reward_asset: asset,
                    ledger: ledger.address(),
                    owner: labels.resolve(&setup.owner)?,
                    increaser: labels.resolve(&setup.increaser)?,
                },
            );
            if setup.register {
                ledger.add_plugin(admin, plugin.clone())?;
            }
            plugins.insert(address, plugin);
        }

        let buyback = match &scenario.buyback {
            None => None,
            Some(setup) => {
                let plugin_address = labels.resolve(&setup.plugin)?;
                let plugin = plugins.get(&plugin_address).cloned().ok_or_else(|| {
                    CliError::Usage(format!("buyback plugin '{}' is not deployed", setup.plugin))
                })?;
                let aggregator = Rc::new(FixedRateAggregator {
                    address: labels.resolve(&setup.aggregator)?,
                    reward_asset: asset,
                    rate: setup.swap_rate,
                });
                let owners = setup
                    .owners
                    .iter()
                    .map(|o| labels.resolve(o))
                    .collect::<Result<Vec<_>, _>>()?;
                Some(FeeBuyback::deploy(
                    &env,
                    BuybackConfig {
                        address: labels.resolve(&setup.name)?,
                        reward_asset: asset,
                        safe: labels.resolve(&setup.safe)?,
                        executor: labels.resolve(&setup.executor)?,
                        owners,
                    },
                    aggregator,
                    plugin,
                ))
            }
        };

        let wallet = Wallet {
            address: labels.resolve("wallet")?,
        };
        Ok(Self {
            env,
            labels,
            asset,
            ledger,
            plugins,
            buyback,
            wallet,
        })
    }

    fn aux(&mut self, parts: &[AuxPart]) -> Result<Vec<u8>, CliError> {
        if parts.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder = AuxDataBuilder::new();
        for part in parts {
            let to = self.labels.resolve(&part.to)?;
            builder = builder.part(to, &hex::decode(&part.hex)?)?;
        }
        Ok(builder.encode()?)
    }

    fn plugin(&mut self, name: &str) -> Result<Rc<SimplePlugin>, CliError> {
        let address = self.labels.resolve(name)?;
        self.plugins
            .get(&address)
            .cloned()
            .ok_or_else(|| CliError::Usage(format!("unknown plugin '{name}'")))
    }

    fn buyback(&self) -> Result<Rc<FeeBuyback>, CliError> {
        self.buyback
            .clone()
            .ok_or_else(|| CliError::Usage("scenario has no buyback".to_string()))
    }

    fn apply(&mut self, step: &Step) -> Result<String, CliError> {
        let ledger = Rc::clone(&self.ledger);
        match step {
            Step::Advance(blocks) => {
                self.env.advance(*blocks);
                Ok(format!("now {}", self.env.now()))
            }
            Step::Mint { asset, to, amount } => {
                let (asset, to) = (self.labels.resolve(asset)?, self.labels.resolve(to)?);
                self.env.mint(asset, to, *amount).map_err(LedgerError::from)?;
                Ok(format!("minted {amount}"))
            }
            Step::Approve {
                asset,
                owner,
                spender,
                amount,
            } => {
                let asset = self.labels.resolve(asset)?;
                let owner = self.labels.resolve(owner)?;
                let spender = self.labels.resolve(spender)?;
                self.env.approve(asset, owner, spender, *amount);
                Ok(format!("approved {amount}"))
            }
            Step::Transfer {
                asset,
                from,
                to,
                amount,
            } => {
                let asset = self.labels.resolve(asset)?;
                let from = self.labels.resolve(from)?;
                let to = self.labels.resolve(to)?;
                self.env
                    .transfer(asset, from, to, *amount)
                    .map_err(LedgerError::from)?;
                Ok(format!("transferred {amount}"))
            }
            Step::Stake { account, amount } => {
                ledger.stake(self.labels.resolve(account)?, *amount)?;
                Ok(format!("staked {amount}"))
            }
            Step::Exit { account } => {
                let out = ledger.exit(self.labels.resolve(account)?)?;
                Ok(format!("withdrew {out}"))
            }
            Step::Claim { account, aux } => {
                let aux = self.aux(aux)?;
                let out = ledger.claim(self.labels.resolve(account)?, &aux)?;
                Ok(format!("claimed {out}"))
            }
            Step::ClaimFrom {
                account,
                index,
                aux,
            } => {
                let aux = self.aux(aux)?;
                let account = self.labels.resolve(account)?;
                let out = ledger.claim_from_individual_plugin(account, *index, &aux)?;
                Ok(format!("claimed {out} from plugin #{index}"))
            }
            Step::PartialExit {
                account,
                amount,
                aux,
            } => {
                let aux = self.aux(aux)?;
                let account = self.labels.resolve(account)?;
                let out = ledger.partial_claim_and_exit(account, *amount, &aux)?;
                Ok(format!("withdrew {out}"))
            }
            Step::FullExit { account, aux } => {
                let aux = self.aux(aux)?;
                let out = ledger.full_claim_and_exit(self.labels.resolve(account)?, &aux)?;
                Ok(format!("withdrew {out}"))
            }
            Step::Slash {
                caller,
                account,
                amount,
                to,
                aux,
            } => {
                let aux = self.aux(aux)?;
                let caller = self.labels.resolve(caller)?;
                let account = self.labels.resolve(account)?;
                let to = self.labels.resolve(to)?;
                ledger.slash(caller, account, *amount, to, &aux)?;
                Ok(format!("slashed {amount}"))
            }
            Step::Credit {
                plugin,
                account,
                amount,
                caller,
            } => {
                let plugin = self.plugin(plugin)?;
                let caller = match caller {
                    Some(name) => self.labels.resolve(name)?,
                    None => plugin.increaser(),
                };
                let account = self.labels.resolve(account)?;
                let credited = plugin.increase_claimable_by(caller, account, *amount)?;
                Ok(if credited {
                    format!("credited {amount}")
                } else {
                    "nothing credited".to_string()
                })
            }
            Step::AddPlugin { caller, plugin } => {
                let plugin = self.plugin(plugin)?;
                ledger.add_plugin(self.labels.resolve(caller)?, plugin)?;
                Ok(format!("{} plugins", ledger.plugin_count()))
            }
            Step::RemovePlugin { caller, index } => {
                ledger.remove_plugin(self.labels.resolve(caller)?, *index)?;
                Ok(format!("{} plugins", ledger.plugin_count()))
            }
            Step::Pause { caller } => {
                ledger.pause(self.labels.resolve(caller)?)?;
                Ok("paused".to_string())
            }
            Step::Unpause { caller } => {
                ledger.unpause(self.labels.resolve(caller)?)?;
                Ok("unpaused".to_string())
            }
            Step::GrantRole {
                caller,
                role,
                account,
            } => {
                let caller = self.labels.resolve(caller)?;
                ledger.grant_role(caller, *role, self.labels.resolve(account)?)?;
                Ok(format!("granted {role:?}"))
            }
            Step::RevokeRole {
                caller,
                role,
                account,
            } => {
                let caller = self.labels.resolve(caller)?;
                ledger.revoke_role(caller, *role, self.labels.resolve(account)?)?;
                Ok(format!("revoked {role:?}"))
            }
            Step::StakeFor {
                caller,
                account,
                amount,
            } => {
                let caller = self.labels.resolve(caller)?;
                ledger.stake_for(caller, self.labels.resolve(account)?, *amount)?;
                Ok(format!("staked {amount}"))
            }
            Step::ClaimAndExitFor {
                caller,
                account,
                to,
                aux,
            } => {
                let aux = self.aux(aux)?;
                let caller = self.labels.resolve(caller)?;
                let account = self.labels.resolve(account)?;
                let to = self.labels.resolve(to)?;
                let out = ledger.claim_and_exit_for(caller, account, to, &aux)?;
                Ok(format!("withdrew {out}"))
            }
            Step::Rescue {
                caller,
                asset,
                to,
                amount,
            } => {
                let caller = self.labels.resolve(caller)?;
                let asset = self.labels.resolve(asset)?;
                let to = self.labels.resolve(to)?;
                ledger.rescue(caller, asset, to, *amount)?;
                Ok(format!("rescued {amount}"))
            }
            Step::Submit {
                caller,
                fee_asset,
                referral,
                amount,
                wallet_reverts,
            } => {
                let buyback = self.buyback()?;
                let caller = self.labels.resolve(caller)?;
                let fee_asset = self.labels.resolve(fee_asset)?;
                let referral = self.labels.resolve(referral)?;
                let wallet_payload: &[u8] = if *wallet_reverts { REVERT } else { &[] };
                let credited = buyback.submit(
                    caller,
                    &self.wallet,
                    wallet_payload,
                    fee_asset,
                    referral,
                    *amount,
                    fee_asset.as_bytes(),
                )?;
                Ok(if credited {
                    "referral credited".to_string()
                } else {
                    "nothing to credit".to_string()
                })
            }
            Step::Check {
                account,
                staked,
                claimable,
                balance,
            } => {
                let account = self.labels.resolve(account)?;
                let actual = [
                    ("staked", *staked, ledger.staked_by(&account)),
                    ("claimable", *claimable, ledger.claimable(&account, &[])?),
                    ("balance", *balance, ledger.balance_of(&account, &[])?),
                ];
                for (what, expected, actual) in actual {
                    if let Some(expected) = expected {
                        if expected != actual {
                            return Err(CliError::CheckFailed(format!(
                                "{what} of {} is {actual}, expected {expected}",
                                self.labels.display(&account)
                            )));
                        }
                    }
                }
                Ok("ok".to_string())
            }
        }
    }

    fn report(&self, steps: Vec<StepOutcome>) -> Result<RunReport, CliError> {
        let mut accounts = Vec::new();
        for (address, name) in self.labels.iter() {
            if self.plugins.contains_key(address) || *address == self.ledger.address() {
                continue;
            }
            let staked = self.ledger.staked_by(address);
            let claimable = self.ledger.claimable(address, &[])?;
            let wallet = self.env.balance_of(&self.asset, address);
            if staked == 0 && claimable == 0 && wallet == 0 {
                continue;
            }
            accounts.push(AccountSummary {
                name: name.clone(),
                address: *address,
                staked,
                claimable,
                wallet,
            });
        }
        let plugins = self
            .plugins
            .iter()
            .map(|(address, plugin)| PluginSummary {
                name: self.labels.display(address),
                address: *address,
                registered: self.ledger.is_plugin(address),
                total_claimable: plugin.total_claimable(),
                held: self.env.balance_of(&self.asset, address),
            })
            .collect();
        Ok(RunReport {
            steps,
            time_index: self.env.now(),
            total_staked: self.ledger.total_staked(),
            total_supply: self.ledger.total_supply(),
            paused: self.ledger.is_paused(),
            plugins,
            accounts,
            events: self.env.events().len(),
        })
    }
}

/// Executes the scenario at `path`.
pub fn run(
    path: PathBuf,
    journal: Option<PathBuf>,
    json: bool,
    strict: bool,
) -> Result<(), CliError> {
    let text = std::fs::read_to_string(&path)?;
    let scenario: Scenario = serde_json::from_str(&text)?;
    let mut world = World::build(&scenario)?;
    info!(scenario = %path.display(), steps = scenario.steps.len(), "running scenario");

    let mut steps = Vec::with_capacity(scenario.steps.len());
    for (index, step) in scenario.steps.iter().enumerate() {
        let time_index = world.env.now();
        let (ok, detail) = match world.apply(step) {
            Ok(detail) => (true, detail),
            Err(err) => {
                warn!(index, step = step.name(), error = %err, "step failed");
                (false, err.to_string())
            }
        };
        debug!(index, step = step.name(), ok, "step done");
        steps.push(StepOutcome {
            index,
            step: step.name(),
            time_index,
            ok,
            detail,
        });
    }

    let report = world.report(steps)?;

    if let Some(journal) = journal {
        let mut writer = JournalWriter::open(&journal, WriteOptions::default())?;
        let written = writer.append_all(world.env.events().iter())?;
        writer.finish()?;
        info!(journal = %journal.display(), written, "events journaled");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        output::print_run_report(&report);
    }

    let failed = report.failed();
    if strict && failed > 0 {
        return Err(CliError::StepsFailed {
            failed,
            total: report.steps.len(),
        });
    }
    Ok(())
}
