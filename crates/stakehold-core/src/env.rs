//! Single-writer execution environment.
//!
//! `Env` plays the part of the chain the ledger is deployed on: it owns the
//! clock, the asset book and the event log, and gives every top-level
//! operation all-or-nothing semantics. Components register themselves on
//! deployment so their state can be snapshotted before the outermost
//! operation and restored if it fails.

use crate::assets::{AssetBook, AssetError};
use crate::events::{EventRecord, LedgerEvent};
use stakehold_types::{Address, Amount, TimeIndex};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use tracing::{debug, warn};

/// State a component can hand to the environment for rollback.
pub trait Transactional {
    /// Captures the component's mutable state.
    fn snapshot(&self) -> Box<dyn Any>;
    /// Reinstates a state previously returned by [`snapshot`](Self::snapshot).
    fn restore(&self, snapshot: Box<dyn Any>);
}

struct EnvSnapshot {
    assets: AssetBook,
    events_len: usize,
    components: Vec<(Rc<dyn Transactional>, Box<dyn Any>)>,
}

/// Clock, assets, events and transaction boundary shared by all components.
pub struct Env {
    now: Cell<TimeIndex>,
    assets: RefCell<AssetBook>,
    events: RefCell<Vec<EventRecord>>,
    components: RefCell<Vec<Weak<dyn Transactional>>>,
    depth: Cell<usize>,
}

struct Depth<'a>(&'a Cell<usize>);

impl<'a> Depth<'a> {
    fn enter(cell: &'a Cell<usize>) -> Self {
        cell.set(cell.get() + 1);
        Depth(cell)
    }
}

impl Drop for Depth<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

impl Env {
    /// Creates an environment whose clock starts at time index 1.
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            now: Cell::new(1),
            assets: RefCell::new(AssetBook::new()),
            events: RefCell::new(Vec::new()),
            components: RefCell::new(Vec::new()),
            depth: Cell::new(0),
        })
    }

    /// Current time index.
    pub fn now(&self) -> TimeIndex {
        self.now.get()
    }

    /// Moves the clock forward by `blocks`.
    pub fn advance(&self, blocks: TimeIndex) {
        self.now.set(self.now.get().saturating_add(blocks));
    }

    /// Registers a component for snapshot/rollback.
    pub fn register(&self, component: Weak<dyn Transactional>) {
        self.components.borrow_mut().push(component);
    }

    /// Runs `op` atomically.
    ///
    /// Only the outermost call snapshots; nested calls run inside it and
    /// their failure propagates to the outer rollback.
    ///
    /// The snapshot is a full clone of the asset book and of every registered
    /// component's state, checkpoint histories included, so its cost grows
    /// with the history recorded so far. That is accepted for this in-memory
    /// environment.
    pub fn atomic<T, E>(&self, op: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: std::fmt::Display,
    {
        if self.depth.get() > 0 {
            let _depth = Depth::enter(&self.depth);
            return op();
        }
        let snapshot = self.snapshot();
        let result = {
            let _depth = Depth::enter(&self.depth);
            op()
        };
        if let Err(err) = &result {
            warn!(error = %err, "operation failed, rolling back");
            self.restore(snapshot);
        }
        result
    }

    fn snapshot(&self) -> EnvSnapshot {
        let components = self
            .components
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .map(|c| {
                let state = c.snapshot();
                (c, state)
            })
            .collect();
        EnvSnapshot {
            assets: self.assets.borrow().clone(),
            events_len: self.events.borrow().len(),
            components,
        }
    }

    fn restore(&self, snapshot: EnvSnapshot) {
        *self.assets.borrow_mut() = snapshot.assets;
        self.events.borrow_mut().truncate(snapshot.events_len);
        for (component, state) in snapshot.components {
            component.restore(state);
        }
    }

    /// Appends an event emitted by `emitter`.
    pub fn emit(&self, emitter: Address, event: LedgerEvent) {
        debug!(%emitter, event = event.name(), "event");
        self.events.borrow_mut().push(EventRecord {
            time_index: self.now(),
            emitter,
            event,
        });
    }

    /// All events emitted so far.
    pub fn events(&self) -> Vec<EventRecord> {
        self.events.borrow().clone()
    }

    /// Removes and returns all events emitted so far.
    pub fn drain_events(&self) -> Vec<EventRecord> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    /// Balance of `account` in `asset`.
    pub fn balance_of(&self, asset: &Address, account: &Address) -> Amount {
        self.assets.borrow().balance_of(asset, account)
    }

    /// Remaining allowance.
    pub fn allowance(&self, asset: &Address, owner: &Address, spender: &Address) -> Amount {
        self.assets.borrow().allowance(asset, owner, spender)
    }

    /// Creates funds for `to`.
    pub fn mint(&self, asset: Address, to: Address, amount: Amount) -> Result<(), AssetError> {
        self.assets.borrow_mut().mint(asset, to, amount)
    }

    /// Sets the allowance `owner` grants `spender`.
    pub fn approve(&self, asset: Address, owner: Address, spender: Address, amount: Amount) {
        self.assets.borrow_mut().approve(asset, owner, spender, amount)
    }

    /// Moves funds from `from` to `to`.
    pub fn transfer(
        &self,
        asset: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), AssetError> {
        self.assets.borrow_mut().transfer(asset, from, to, amount)
    }

    /// Moves `from`'s funds on behalf of `spender`.
    pub fn transfer_from(
        &self,
        asset: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), AssetError> {
        self.assets
            .borrow_mut()
            .transfer_from(asset, spender, from, to, amount)
    }
}
