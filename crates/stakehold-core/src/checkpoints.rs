//! Append-only value history keyed by time index.

use serde::{Deserialize, Serialize};
use stakehold_types::{Amount, TimeIndex};
use thiserror::Error;

/// Errors raised by checkpoint histories.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckpointError {
    /// The queried index has not been reached yet.
    #[error("time index {index} is not before the current index {now}")]
    OutOfRange {
        /// Queried index.
        index: TimeIndex,
        /// Current time index.
        now: TimeIndex,
    },
    /// A push went backwards in time.
    #[error("checkpoint index {index} precedes last recorded index {last}")]
    NonMonotonic {
        /// Index of the rejected push.
        index: TimeIndex,
        /// Latest recorded index.
        last: TimeIndex,
    },
}

/// One recorded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Time index at which `value` took effect.
    pub index: TimeIndex,
    /// Value from `index` onwards.
    pub value: Amount,
}

/// Ordered history of `(index, value)` entries with strictly increasing
/// indices.
///
/// Entries are never removed; growth is bounded only by the number of
/// distinct time indices at which the value changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoints {
    entries: Vec<Checkpoint>,
}

impl Checkpoints {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `value` at `index`.
    ///
    /// Pushing at the latest recorded index overwrites that entry.
    pub fn push(&mut self, index: TimeIndex, value: Amount) -> Result<(), CheckpointError> {
        match self.entries.last_mut() {
            Some(last) if index < last.index => Err(CheckpointError::NonMonotonic {
                index,
                last: last.index,
            }),
            Some(last) if index == last.index => {
                last.value = value;
                Ok(())
            }
            _ => {
                self.entries.push(Checkpoint { index, value });
                Ok(())
            }
        }
    }

    /// Most recent value, or zero when nothing was recorded.
    pub fn latest(&self) -> Amount {
        self.entries.last().map(|c| c.value).unwrap_or(0)
    }

    /// Value in effect at `index`, given the current time index `now`.
    ///
    /// Only strictly historical indices (`index < now`) may be queried.
    pub fn get_at(&self, index: TimeIndex, now: TimeIndex) -> Result<Amount, CheckpointError> {
        if index >= now {
            return Err(CheckpointError::OutOfRange { index, now });
        }
        // number of entries with entry.index <= index
        let upper = self.entries.partition_point(|c| c.index <= index);
        Ok(match upper {
            0 => 0,
            n => self.entries[n - 1].value,
        })
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Checkpoint> {
        self.entries.iter()
    }
}
