//! Predicates over journaled event records.

use stakehold_core::EventRecord;
use stakehold_types::Address;

/// Decides whether a record is selected.
pub trait EventFilter {
    /// Returns `true` if `record` passes.
    fn matches(&self, record: &EventRecord) -> bool;
}

/// Passes every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllEvents;

impl EventFilter for AllEvents {
    fn matches(&self, _record: &EventRecord) -> bool {
        true
    }
}

/// Passes records whose event name is one of `kinds` (e.g. `stake_changed`).
#[derive(Debug, Clone)]
pub struct KindFilter {
    kinds: Vec<String>,
}

impl KindFilter {
    /// Selects the given event names.
    pub fn new<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kinds: kinds.into_iter().map(Into::into).collect(),
        }
    }
}

impl EventFilter for KindFilter {
    fn matches(&self, record: &EventRecord) -> bool {
        let name = record.event.name();
        self.kinds.iter().any(|k| k == name)
    }
}

/// Passes records that involve `account`.
#[derive(Debug, Clone, Copy)]
pub struct AccountFilter(pub Address);

impl EventFilter for AccountFilter {
    fn matches(&self, record: &EventRecord) -> bool {
        record.event.accounts().contains(&self.0)
    }
}

/// Passes records emitted by `component`.
#[derive(Debug, Clone, Copy)]
pub struct EmitterFilter(pub Address);

impl EventFilter for EmitterFilter {
    fn matches(&self, record: &EventRecord) -> bool {
        record.emitter == self.0
    }
}

/// Passes records that every inner filter passes.
#[derive(Default)]
pub struct AllOf(Vec<Box<dyn EventFilter>>);

impl AllOf {
    /// Empty conjunction (passes everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter.
    pub fn and(mut self, filter: impl EventFilter + 'static) -> Self {
        self.0.push(Box::new(filter));
        self
    }
}

impl EventFilter for AllOf {
    fn matches(&self, record: &EventRecord) -> bool {
        self.0.iter().all(|f| f.matches(record))
    }
}

/// Passes records that at least one inner filter passes.
#[derive(Default)]
pub struct AnyOf(Vec<Box<dyn EventFilter>>);

impl AnyOf {
    /// Empty disjunction (passes nothing).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a filter.
    pub fn or(mut self, filter: impl EventFilter + 'static) -> Self {
        self.0.push(Box::new(filter));
        self
    }
}

impl EventFilter for AnyOf {
    fn matches(&self, record: &EventRecord) -> bool {
        self.0.iter().any(|f| f.matches(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stakehold_core::LedgerEvent;

    fn record(emitter: u8, event: LedgerEvent) -> EventRecord {
        EventRecord {
            time_index: 1,
            emitter: Address::new([emitter; 20]),
            event,
        }
    }

    #[test]
    fn kind_and_account_combine() {
        let alice = Address::new([1; 20]);
        let staked = record(
            9,
            LedgerEvent::StakeChanged {
                account: alice,
                amount_before: 0,
                amount_after: 5,
            },
        );
        let paused = record(9, LedgerEvent::Paused { by: alice });

        let filter = AllOf::new()
            .and(KindFilter::new(["stake_changed"]))
            .and(AccountFilter(alice));
        assert!(filter.matches(&staked));
        assert!(!filter.matches(&paused));

        let either = AnyOf::new()
            .or(KindFilter::new(["paused"]))
            .or(EmitterFilter(Address::new([3; 20])));
        assert!(either.matches(&paused));
        assert!(!either.matches(&staked));
        assert!(AllEvents.matches(&staked));
    }
}
