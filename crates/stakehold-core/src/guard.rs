//! Mutation-in-progress flag.

use crate::errors::LedgerError;
use std::cell::Cell;

/// Rejects a mutating call while another one on the same component is still
/// running.
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    entered: Cell<bool>,
}

/// Held for the duration of a mutating call; clears the flag on drop.
#[must_use = "the guard is released as soon as the entry token is dropped"]
pub struct Entered<'a> {
    guard: &'a ReentrancyGuard,
}

impl ReentrancyGuard {
    /// Creates an idle guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the component busy, or fails if it already is.
    pub fn enter(&self) -> Result<Entered<'_>, LedgerError> {
        if self.entered.replace(true) {
            return Err(LedgerError::Reentrancy);
        }
        Ok(Entered { guard: self })
    }

    /// Whether a mutating call is in progress.
    pub fn is_entered(&self) -> bool {
        self.entered.get()
    }
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        self.guard.entered.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_entry_is_rejected() {
        let guard = ReentrancyGuard::new();
        let outer = guard.enter().unwrap();
        assert_eq!(guard.enter().err(), Some(LedgerError::Reentrancy));
        drop(outer);
        assert!(!guard.is_entered());
        assert!(guard.enter().is_ok());
    }

    #[test]
    fn released_on_error_path() {
        fn failing(guard: &ReentrancyGuard) -> Result<(), LedgerError> {
            let _entered = guard.enter()?;
            Err(LedgerError::ZeroAmount)
        }
        let guard = ReentrancyGuard::new();
        assert!(failing(&guard).is_err());
        assert!(!guard.is_entered());
    }
}
