//! In-process store, used by tests and embedders that do not need durability.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::traits::{Ledger, StateStore};
use crate::error::{Result, TurnkeeperError};

/// Mutex-guarded ledger with a switch to simulate an unreachable store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    ledger: Mutex<Ledger>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following transaction fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl StateStore for MemoryStore {
    fn transact<R>(&self, f: impl FnOnce(&mut Ledger) -> Result<R>) -> Result<R> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TurnkeeperError::StoreUnavailable("memory store offline".to_string()));
        }

        let mut guard = self
            .ledger
            .lock()
            .map_err(|e| TurnkeeperError::StoreUnavailable(e.to_string()))?;

        let mut working = guard.clone();
        let demoted = working.repair_exclusion();
        if !demoted.is_empty() {
            log::warn!("Deactivated extra active agents on load: {:?}", demoted);
        }
        let result = f(&mut working)?;
        *guard = working;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Agent, PhaseCounts};

    #[test]
    fn test_transact_persists_on_ok() {
        let store = MemoryStore::new();
        store
            .transact(|ledger| {
                ledger.modes.chaos_enabled = true;
                Ok(())
            })
            .unwrap();
        assert!(store.snapshot().unwrap().modes.chaos_enabled);
    }

    #[test]
    fn test_transact_rolls_back_on_err() {
        let store = MemoryStore::new();
        let result: Result<()> = store.transact(|ledger| {
            ledger.record_mut(Agent::Imperium, PhaseCounts::new(1, 1, 1), 0);
            Err(TurnkeeperError::InvalidState("abort".to_string()))
        });
        assert!(result.is_err());
        assert!(store.snapshot().unwrap().records.is_empty());
    }

    #[test]
    fn test_unavailable_fails_every_call() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        let err = store.snapshot().unwrap_err();
        assert!(err.is_unavailable());

        store.set_unavailable(false);
        assert!(store.snapshot().is_ok());
    }
}
