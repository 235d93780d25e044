use stakehold_core::aux_data::{self, AuxDataBuilder, AuxDataError};
use stakehold_core::{
    Address, Amount, CheckpointError, Env, ErrorKind, LedgerConfig, LedgerError, LedgerEvent,
    LedgerResult, Role, SimplePlugin, SimplePluginConfig, StakingLedger, TimeIndex, YieldPlugin,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn addr(label: &str) -> Address {
    Address::from_label(label)
}

struct Fixture {
    env: Rc<Env>,
    ledger: Rc<StakingLedger>,
    plugin: Rc<SimplePlugin>,
    asset: Address,
    admin: Address,
    increaser: Address,
}

impl Fixture {
    fn new() -> Self {
        let env = Env::new();
        let asset = addr("asset:stake");
        let admin = addr("admin");
        let increaser = addr("increaser");
        let ledger = StakingLedger::deploy(
            &env,
            LedgerConfig {
                address: addr("ledger"),
                asset,
                admin,
            },
        );
        let plugin = SimplePlugin::deploy(
            &env,
            SimplePluginConfig {
                address: addr("plugin:simple"),
                reward_asset: asset,
                ledger: ledger.address(),
                owner: admin,
                increaser,
            },
        );
        ledger.add_plugin(admin, plugin.clone()).unwrap();
        env.mint(asset, increaser, 1_000_000).unwrap();
        env.approve(asset, increaser, plugin.address(), Amount::MAX);
        Fixture {
            env,
            ledger,
            plugin,
            asset,
            admin,
            increaser,
        }
    }

    fn fund_and_stake(&self, account: Address, amount: Amount) {
        self.env.mint(self.asset, account, amount).unwrap();
        self.env
            .approve(self.asset, account, self.ledger.address(), amount);
        self.ledger.stake(account, amount).unwrap();
    }

    fn credit(&self, account: Address, amount: Amount) {
        assert!(self
            .plugin
            .increase_claimable_by(self.increaser, account, amount)
            .unwrap());
    }

    fn balance(&self, account: &Address) -> Amount {
        self.env.balance_of(&self.asset, account)
    }
}

#[test]
fn test_claim_with_nothing_owed_is_a_no_op() {
    let fx = Fixture::new();
    let bob = addr("bob");
    let events_before = fx.env.events().len();

    assert_eq!(fx.ledger.claim(bob, &[]).unwrap(), 0);

    assert_eq!(fx.env.events().len(), events_before);
    assert_eq!(fx.balance(&bob), 0);
    assert_eq!(fx.balance(&fx.plugin.address()), 0);
}

#[test]
fn test_claim_pays_yield_and_keeps_stake() {
    let fx = Fixture::new();
    let alice = addr("alice");
    fx.fund_and_stake(alice, 20);
    fx.credit(alice, 50);

    assert_eq!(fx.ledger.claim(alice, &[]).unwrap(), 50);

    assert_eq!(fx.balance(&alice), 50);
    assert_eq!(fx.ledger.staked_by(&alice), 20);
    assert_eq!(fx.plugin.total_claimable(), 0);
    let last = fx.env.events().pop().unwrap();
    assert_eq!(last.emitter, fx.ledger.address());
    assert_eq!(
        last.event,
        LedgerEvent::Claimed {
            account: alice,
            to: alice,
            amount: 50
        }
    );
}

#[test]
fn test_slash_realizes_yield_before_withdrawing() {
    let fx = Fixture::new();
    let alice = addr("alice");
    let collector = addr("collector");
    fx.fund_and_stake(alice, 100);
    fx.credit(alice, 50);

    fx.ledger.slash(fx.admin, alice, 110, collector, &[]).unwrap();

    assert_eq!(fx.balance(&collector), 110);
    assert_eq!(fx.ledger.balance_of(&alice, &[]).unwrap(), 40);
    assert_eq!(fx.ledger.staked_by(&alice), 40);
    assert_eq!(fx.ledger.total_staked(), 40);
    assert_eq!(fx.plugin.total_claimable(), 0);
    assert!(matches!(
        fx.env.events().last().map(|r| &r.event),
        Some(LedgerEvent::Slashed { amount: 110, .. })
    ));
}

#[test]
fn test_slash_requires_role_and_available_balance() {
    let fx = Fixture::new();
    let alice = addr("alice");
    fx.fund_and_stake(alice, 10);

    let err = fx.ledger.slash(alice, alice, 5, alice, &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let err = fx
        .ledger
        .slash(fx.admin, alice, 11, fx.admin, &[])
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::InsufficientBalance {
            requested: 11,
            available: 10
        }
    );
    assert_eq!(fx.ledger.staked_by(&alice), 10);
}

#[test]
fn test_remove_plugin_swaps_last_into_slot() {
    let fx = Fixture::new();
    let extra: Vec<Rc<SimplePlugin>> = ["plugin:b", "plugin:c"]
        .iter()
        .map(|label| {
            SimplePlugin::deploy(
                &fx.env,
                SimplePluginConfig {
                    address: addr(label),
                    reward_asset: fx.asset,
                    ledger: fx.ledger.address(),
                    owner: fx.admin,
                    increaser: fx.increaser,
                },
            )
        })
        .collect();
    for plugin in &extra {
        fx.ledger.add_plugin(fx.admin, plugin.clone()).unwrap();
    }
    assert_eq!(fx.ledger.plugin_count(), 3);

    fx.ledger.remove_plugin(fx.admin, 0).unwrap();

    assert_eq!(fx.ledger.plugin_count(), 2);
    assert_eq!(fx.ledger.plugin_at(0).unwrap().address(), extra[1].address());
    assert_eq!(fx.ledger.plugin_at(1).unwrap().address(), extra[0].address());
    assert!(!fx.ledger.is_plugin(&fx.plugin.address()));
    assert_eq!(
        fx.ledger.remove_plugin(fx.admin, 2),
        Err(LedgerError::IndexOutOfBounds { index: 2, len: 2 })
    );
}

#[test]
fn test_duplicate_plugin_is_rejected() {
    let fx = Fixture::new();
    let err = fx.ledger.add_plugin(fx.admin, fx.plugin.clone()).unwrap_err();
    assert_eq!(err, LedgerError::AlreadyRegistered(fx.plugin.address()));
    assert_eq!(fx.ledger.plugin_count(), 1);
}

#[test]
fn test_removed_plugin_yield_is_orphaned_not_lost() {
    let fx = Fixture::new();
    let alice = addr("alice");
    fx.credit(alice, 50);
    fx.ledger.remove_plugin(fx.admin, 0).unwrap();

    assert_eq!(fx.ledger.claimable(&alice, &[]).unwrap(), 0);
    assert_eq!(fx.ledger.total_supply(), 0);
    assert_eq!(fx.ledger.claim(alice, &[]).unwrap(), 0);
    assert_eq!(fx.plugin.claimable(&alice, &[]).unwrap(), 50);

    let paid = fx
        .plugin
        .claim(fx.ledger.address(), alice, alice, &[])
        .unwrap();
    assert_eq!(paid, 50);
    assert_eq!(fx.balance(&alice), 50);
}

#[test]
fn test_zero_stake_is_rejected() {
    let fx = Fixture::new();
    assert_eq!(
        fx.ledger.stake(addr("alice"), 0),
        Err(LedgerError::ZeroAmount)
    );
}

#[test]
fn test_exit_returns_stake() {
    let fx = Fixture::new();
    let alice = addr("alice");
    fx.fund_and_stake(alice, 30);

    assert_eq!(fx.ledger.exit(alice).unwrap(), 30);
    assert_eq!(fx.balance(&alice), 30);
    assert_eq!(fx.ledger.total_staked(), 0);

    let events_before = fx.env.events().len();
    assert_eq!(fx.ledger.exit(alice).unwrap(), 0);
    assert_eq!(fx.env.events().len(), events_before);
}

#[test]
fn test_partial_claim_and_exit_rebases_stake() {
    let fx = Fixture::new();
    let alice = addr("alice");
    fx.fund_and_stake(alice, 20);
    fx.credit(alice, 50);

    assert_eq!(fx.ledger.partial_claim_and_exit(alice, 30, &[]).unwrap(), 30);

    assert_eq!(fx.balance(&alice), 30);
    assert_eq!(fx.ledger.staked_by(&alice), 40);
    assert_eq!(fx.ledger.total_staked(), 40);
    assert_eq!(fx.balance(&fx.ledger.address()), 40);
    assert_eq!(fx.plugin.total_claimable(), 0);
}

#[test]
fn test_full_claim_and_exit_empties_account() {
    let fx = Fixture::new();
    let alice = addr("alice");
    fx.fund_and_stake(alice, 20);
    fx.credit(alice, 50);

    assert_eq!(fx.ledger.full_claim_and_exit(alice, &[]).unwrap(), 70);

    assert_eq!(fx.balance(&alice), 70);
    assert_eq!(fx.ledger.balance_of(&alice, &[]).unwrap(), 0);
    assert_eq!(fx.ledger.total_supply(), 0);
}

#[test]
fn test_claim_from_individual_plugin() {
    let fx = Fixture::new();
    let alice = addr("alice");
    fx.credit(alice, 5);

    assert_eq!(
        fx.ledger.claim_from_individual_plugin(alice, 1, &[]),
        Err(LedgerError::IndexOutOfBounds { index: 1, len: 1 })
    );
    assert_eq!(
        fx.ledger.claim_from_individual_plugin(alice, 0, &[]).unwrap(),
        5
    );
    assert_eq!(fx.balance(&alice), 5);
}

#[test]
fn test_history_lookups() {
    let fx = Fixture::new();
    let alice = addr("alice");
    fx.fund_and_stake(alice, 20);
    fx.env.advance(1);
    fx.fund_and_stake(alice, 10);
    fx.credit(alice, 7);
    fx.env.advance(1);

    assert_eq!(fx.ledger.staked_by_at(&alice, 0).unwrap(), 0);
    assert_eq!(fx.ledger.staked_by_at(&alice, 1).unwrap(), 20);
    assert_eq!(fx.ledger.staked_by_at(&alice, 2).unwrap(), 30);
    assert_eq!(fx.ledger.total_staked_at(1).unwrap(), 20);
    assert_eq!(fx.ledger.claimable_at(&alice, 1, &[]).unwrap(), 0);
    assert_eq!(fx.ledger.balance_of_at(&alice, 2, &[]).unwrap(), 37);

    let now: TimeIndex = fx.env.now();
    assert_eq!(
        fx.ledger.staked_by_at(&alice, now),
        Err(LedgerError::Checkpoint(CheckpointError::OutOfRange {
            index: now,
            now
        }))
    );
}

#[test]
fn test_pause_gates_happy_path_and_enables_recovery() {
    let fx = Fixture::new();
    let alice = addr("alice");
    let safe = addr("safe");
    fx.fund_and_stake(alice, 20);
    fx.credit(alice, 5);

    fx.ledger.pause(fx.admin).unwrap();
    assert!(fx.ledger.is_paused());
    assert_eq!(fx.ledger.exit(alice), Err(LedgerError::Paused));
    assert_eq!(fx.ledger.claim(alice, &[]), Err(LedgerError::Paused));

    assert_eq!(
        fx.ledger.claim_and_exit_for(fx.admin, alice, safe, &[]).unwrap(),
        25
    );
    assert_eq!(fx.balance(&safe), 25);

    fx.env.mint(fx.asset, fx.admin, 8).unwrap();
    fx.env.approve(fx.asset, fx.admin, fx.ledger.address(), 8);
    fx.ledger.stake_for(fx.admin, alice, 8).unwrap();
    assert_eq!(fx.ledger.staked_by(&alice), 8);

    fx.ledger.unpause(fx.admin).unwrap();
    assert_eq!(
        fx.ledger.stake_for(fx.admin, alice, 1),
        Err(LedgerError::NotPaused)
    );
}

#[test]
fn test_roles_are_admin_managed() {
    let fx = Fixture::new();
    let ops = addr("ops");
    assert!(fx.ledger.pause(ops).is_err());

    fx.ledger.grant_role(fx.admin, Role::Pauser, ops).unwrap();
    assert!(fx.ledger.has_role(Role::Pauser, &ops));
    fx.ledger.pause(ops).unwrap();

    fx.ledger.revoke_role(fx.admin, Role::Pauser, ops).unwrap();
    assert_eq!(
        fx.ledger.unpause(ops),
        Err(LedgerError::MissingRole {
            role: Role::Pauser,
            account: ops
        })
    );
    assert!(fx.ledger.grant_role(ops, Role::Admin, ops).is_err());
}

#[test]
fn test_rescue_is_limited_to_surplus() {
    let fx = Fixture::new();
    let alice = addr("alice");
    let to = addr("treasury");
    fx.fund_and_stake(alice, 20);
    fx.env
        .transfer(fx.asset, fx.increaser, fx.ledger.address(), 5)
        .unwrap();

    assert_eq!(
        fx.ledger.rescue(fx.admin, fx.asset, to, 6),
        Err(LedgerError::RescueExceedsSurplus {
            requested: 6,
            surplus: 5
        })
    );
    fx.ledger.rescue(fx.admin, fx.asset, to, 5).unwrap();
    assert_eq!(fx.balance(&to), 5);
    assert_eq!(fx.balance(&fx.ledger.address()), 20);
}

/// Reports a payout without moving any funds.
struct LyingPlugin {
    address: Address,
}

impl YieldPlugin for LyingPlugin {
    fn address(&self) -> Address {
        self.address
    }

    fn claimable(&self, _account: &Address, _aux: &[u8]) -> LedgerResult<Amount> {
        Ok(10)
    }

    fn claimable_at(&self, _: &Address, _: TimeIndex, _: &[u8]) -> LedgerResult<Amount> {
        Ok(10)
    }

    fn total_claimable(&self) -> Amount {
        10
    }

    fn claim(&self, _: Address, _: Address, _: Address, _: &[u8]) -> LedgerResult<Amount> {
        Ok(10)
    }

    fn notify_stake_change(&self, _: Address, _: Address, _: Amount, _: Amount) -> LedgerResult<()> {
        Ok(())
    }

    fn requires_notification(&self) -> bool {
        false
    }
}

#[test]
fn test_settlement_mismatch_rolls_back_the_claim() {
    let fx = Fixture::new();
    let alice = addr("alice");
    fx.credit(alice, 50);
    fx.ledger
        .add_plugin(
            fx.admin,
            Rc::new(LyingPlugin {
                address: addr("plugin:liar"),
            }),
        )
        .unwrap();
    let events_before = fx.env.events().len();

    let err = fx.ledger.claim(alice, &[]).unwrap_err();

    assert_eq!(
        err,
        LedgerError::SettlementMismatch {
            reported: 60,
            received: 50
        }
    );
    assert_eq!(err.kind(), ErrorKind::Settlement);
    assert_eq!(fx.balance(&alice), 0);
    assert_eq!(fx.plugin.claimable(&alice, &[]).unwrap(), 50);
    assert_eq!(fx.env.events().len(), events_before);
}

/// Tries to stake into the ledger from inside the notification hook and
/// records what the ledger looked like at that moment.
struct ReentrantPlugin {
    address: Address,
    ledger: RefCell<Option<Rc<StakingLedger>>>,
    seen_stake: Cell<Option<Amount>>,
    attempt: Cell<bool>,
}

impl YieldPlugin for ReentrantPlugin {
    fn address(&self) -> Address {
        self.address
    }

    fn claimable(&self, _: &Address, _: &[u8]) -> LedgerResult<Amount> {
        Ok(0)
    }

    fn claimable_at(&self, _: &Address, _: TimeIndex, _: &[u8]) -> LedgerResult<Amount> {
        Ok(0)
    }

    fn total_claimable(&self) -> Amount {
        0
    }

    fn claim(&self, _: Address, _: Address, _: Address, _: &[u8]) -> LedgerResult<Amount> {
        Ok(0)
    }

    fn notify_stake_change(
        &self,
        _caller: Address,
        account: Address,
        _before: Amount,
        _after: Amount,
    ) -> LedgerResult<()> {
        let ledger = self.ledger.borrow().clone();
        if let Some(ledger) = ledger {
            self.seen_stake.set(Some(ledger.staked_by(&account)));
            if self.attempt.get() {
                ledger.stake(account, 1)?;
            }
        }
        Ok(())
    }

    fn requires_notification(&self) -> bool {
        true
    }
}

#[test]
fn test_reentrant_stake_fails_and_views_see_pre_state() {
    let fx = Fixture::new();
    let alice = addr("alice");
    let plugin = Rc::new(ReentrantPlugin {
        address: addr("plugin:reentrant"),
        ledger: RefCell::new(Some(fx.ledger.clone())),
        seen_stake: Cell::new(None),
        attempt: Cell::new(false),
    });
    fx.ledger.add_plugin(fx.admin, plugin.clone()).unwrap();

    fx.fund_and_stake(alice, 10);
    assert_eq!(plugin.seen_stake.get(), Some(0));

    plugin.attempt.set(true);
    fx.env.mint(fx.asset, alice, 5).unwrap();
    fx.env.approve(fx.asset, alice, fx.ledger.address(), 5);
    assert_eq!(fx.ledger.stake(alice, 5), Err(LedgerError::Reentrancy));
    assert_eq!(fx.ledger.staked_by(&alice), 10);
    assert_eq!(fx.ledger.total_staked(), 10);

    plugin.attempt.set(false);
    fx.ledger.stake(alice, 5).unwrap();
    assert_eq!(fx.ledger.staked_by(&alice), 15);
    plugin.ledger.borrow_mut().take();
}

#[test]
fn test_failed_stake_leaves_no_trace() {
    let fx = Fixture::new();
    let alice = addr("alice");
    fx.env.mint(fx.asset, alice, 5).unwrap();
    fx.env.approve(fx.asset, alice, fx.ledger.address(), 10);
    let events_before = fx.env.events().len();

    let err = fx.ledger.stake(alice, 10).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Asset);
    assert_eq!(fx.ledger.staked_by(&alice), 0);
    assert_eq!(fx.ledger.total_staked(), 0);
    assert_eq!(fx.balance(&alice), 5);
    assert_eq!(fx.env.events().len(), events_before);
}

/// Records the slice of the auxiliary payload addressed to it on every
/// `claim` and `claimable` call.
struct SlicingPlugin {
    address: Address,
    claimed_with: RefCell<Vec<Vec<u8>>>,
    viewed_with: RefCell<Vec<Vec<u8>>>,
}

impl SlicingPlugin {
    fn new(label: &str) -> Rc<Self> {
        Rc::new(SlicingPlugin {
            address: addr(label),
            claimed_with: RefCell::new(Vec::new()),
            viewed_with: RefCell::new(Vec::new()),
        })
    }
}

impl YieldPlugin for SlicingPlugin {
    fn address(&self) -> Address {
        self.address
    }

    fn claimable(&self, _: &Address, aux: &[u8]) -> LedgerResult<Amount> {
        let slice = aux_data::select_relevant_bytes(aux, &self.address)?;
        self.viewed_with.borrow_mut().push(slice);
        Ok(0)
    }

    fn claimable_at(&self, account: &Address, _: TimeIndex, aux: &[u8]) -> LedgerResult<Amount> {
        self.claimable(account, aux)
    }

    fn total_claimable(&self) -> Amount {
        0
    }

    fn claim(&self, _: Address, _: Address, _: Address, aux: &[u8]) -> LedgerResult<Amount> {
        let slice = aux_data::select_relevant_bytes(aux, &self.address)?;
        self.claimed_with.borrow_mut().push(slice);
        Ok(0)
    }

    fn notify_stake_change(&self, _: Address, _: Address, _: Amount, _: Amount) -> LedgerResult<()> {
        Ok(())
    }

    fn requires_notification(&self) -> bool {
        false
    }
}

fn two_slicers(fx: &Fixture) -> (Rc<SlicingPlugin>, Rc<SlicingPlugin>, Vec<u8>) {
    let first = SlicingPlugin::new("plugin:slice-one");
    let second = SlicingPlugin::new("plugin:slice-two");
    fx.ledger.add_plugin(fx.admin, first.clone()).unwrap();
    fx.ledger.add_plugin(fx.admin, second.clone()).unwrap();
    let aux = AuxDataBuilder::new()
        .part(first.address, b"one")
        .and_then(|b| b.part(second.address, b"two"))
        .and_then(AuxDataBuilder::encode)
        .unwrap();
    (first, second, aux)
}

#[test]
fn test_aux_payload_reaches_each_plugin_as_its_own_slice() {
    let fx = Fixture::new();
    let alice = addr("alice");
    let (first, second, aux) = two_slicers(&fx);

    assert_eq!(fx.ledger.claim(alice, &aux).unwrap(), 0);
    assert_eq!(fx.ledger.claim_from_individual_plugin(alice, 2, &aux).unwrap(), 0);

    assert_eq!(*first.claimed_with.borrow(), vec![b"one".to_vec()]);
    assert_eq!(
        *second.claimed_with.borrow(),
        vec![b"two".to_vec(), b"two".to_vec()]
    );
}

#[test]
fn test_aux_payload_reaches_plugins_through_views() {
    let fx = Fixture::new();
    let alice = addr("alice");
    let (first, second, aux) = two_slicers(&fx);
    fx.env.advance(1);

    fx.ledger.claimable(&alice, &aux).unwrap();
    fx.ledger.claimable_at(&alice, 0, &aux).unwrap();
    fx.ledger.balance_of(&alice, &aux).unwrap();

    assert_eq!(*first.viewed_with.borrow(), vec![b"one".to_vec(); 3]);
    assert_eq!(*second.viewed_with.borrow(), vec![b"two".to_vec(); 3]);
}

#[test]
fn test_slash_forwards_aux_payload() {
    let fx = Fixture::new();
    let alice = addr("alice");
    let collector = addr("collector");
    fx.fund_and_stake(alice, 30);
    let (first, second, aux) = two_slicers(&fx);

    fx.ledger.slash(fx.admin, alice, 10, collector, &aux).unwrap();

    assert_eq!(*first.claimed_with.borrow(), vec![b"one".to_vec()]);
    assert_eq!(*second.claimed_with.borrow(), vec![b"two".to_vec()]);
    assert!(first.viewed_with.borrow().iter().all(|s| s == b"one"));
    assert_eq!(fx.balance(&collector), 10);
}

#[test]
fn test_malformed_aux_payload_fails_claim_without_effects() {
    let fx = Fixture::new();
    let alice = addr("alice");
    fx.credit(alice, 50);
    let (first, _second, _) = two_slicers(&fx);
    let events_before = fx.env.events().len();

    let err = fx.ledger.claim(alice, &[1, 0]).unwrap_err();

    assert!(matches!(
        err,
        LedgerError::AuxData(AuxDataError::MalformedData(_))
    ));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(first.claimed_with.borrow().is_empty());
    assert_eq!(fx.balance(&alice), 0);
    assert_eq!(fx.plugin.claimable(&alice, &[]).unwrap(), 50);
    assert_eq!(fx.plugin.total_claimable(), 50);
    assert_eq!(fx.env.events().len(), events_before);
}
