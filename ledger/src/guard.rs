//! Reentrancy exclusion for operations that call out to collaborators after
//! mutating internal state.
//!
//! A redeem zeroes the caller's banked reward and then calls the external
//! mint capability. If that collaborator could re-enter the ledger before
//! the redeem returns, it would observe (and could exploit) the window
//! between the zeroing and the return. The guard closes that window: a
//! second entry while the flag is set is rejected outright.
//!
//! Kept as its own small capability so it can be tested in isolation and
//! composed onto whichever operations need it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Re-entry was attempted while the guarded region was active.
#[derive(Debug, Error)]
pub enum GuardError {
    /// The exclusive region is already occupied.
    #[error("reentrant call rejected: an exclusive operation is in progress")]
    Reentered,
}

/// One-flag mutual exclusion for the duration of a guarded operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReentrancyGuard {
    entered: bool,
}

impl ReentrancyGuard {
    /// Creates a guard with the region unoccupied.
    pub fn new() -> Self {
        Self { entered: false }
    }

    /// Enters the exclusive region.
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Reentered`] if the region is already occupied.
    pub fn enter(&mut self) -> Result<(), GuardError> {
        if self.entered {
            return Err(GuardError::Reentered);
        }
        self.entered = true;
        Ok(())
    }

    /// Leaves the exclusive region. Must be called on every exit path of
    /// the guarded operation, success or failure.
    pub fn exit(&mut self) {
        self.entered = false;
    }

    /// Returns whether the region is currently occupied.
    pub fn is_entered(&self) -> bool {
        self.entered
    }
}
