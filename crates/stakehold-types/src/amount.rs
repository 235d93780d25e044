/// Quantity of a fungible asset in its smallest unit.
pub type Amount = u128;

/// Logical time index (a block height in the deployed system).
///
/// Checkpoints are keyed by this value; lookups are only valid for indices
/// strictly below the current one.
pub type TimeIndex = u64;
