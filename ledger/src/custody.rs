//! # Custody Ledger
//!
//! The authoritative record of which principal currently has which item
//! staked. One entry per deposited item, keyed by collection and item
//! identifier; absence of an entry means the item is not in the pool.
//!
//! The ledger records custody only. Collection eligibility and the external
//! transfer of the underlying asset are the concern of
//! [`crate::pool::StakingPool`], which keeps this record and actual custody
//! from diverging by writing the record only after the external transfer
//! has succeeded.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::account::Principal;
use crate::registry::CollectionId;

/// Identifier of an item within a collection.
pub type ItemId = u64;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during custody bookkeeping.
#[derive(Debug, Error)]
pub enum CustodyError {
    /// The item already has a holder — double deposits are rejected.
    #[error("item {collection}/{item} is already held by {holder}")]
    AlreadyHeld {
        /// Collection of the contested item.
        collection: CollectionId,
        /// The contested item.
        item: ItemId,
        /// The principal currently holding it.
        holder: Principal,
    },

    /// The caller is not the current holder of the item.
    #[error("item {collection}/{item} is not held by {principal}")]
    NotHolder {
        /// Collection of the item.
        collection: CollectionId,
        /// The item being withdrawn.
        item: ItemId,
        /// The principal that attempted the withdrawal.
        principal: Principal,
    },
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Per-item custody records for everything staked in the pool, keyed by
/// collection and then item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustodyLedger {
    records: HashMap<CollectionId, HashMap<ItemId, Principal>>,
}

impl CustodyLedger {
    /// Creates an empty custody ledger.
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    /// Records that `principal` has deposited the item.
    ///
    /// # Errors
    ///
    /// Returns [`CustodyError::AlreadyHeld`] if the item already has a
    /// holder, including `principal` itself.
    pub fn record_deposit(
        &mut self,
        collection: &str,
        item: ItemId,
        principal: &Principal,
    ) -> Result<(), CustodyError> {
        let items = self.records.entry(collection.to_string()).or_default();
        if let Some(holder) = items.get(&item) {
            return Err(CustodyError::AlreadyHeld {
                collection: collection.to_string(),
                item,
                holder: holder.clone(),
            });
        }
        items.insert(item, principal.clone());
        Ok(())
    }

    /// Clears the custody record for an item held by `principal`.
    ///
    /// # Errors
    ///
    /// Returns [`CustodyError::NotHolder`] if the item is unheld or held by
    /// someone else.
    pub fn record_withdrawal(
        &mut self,
        collection: &str,
        item: ItemId,
        principal: &Principal,
    ) -> Result<(), CustodyError> {
        match self.records.get_mut(collection) {
            Some(items) if items.get(&item) == Some(principal) => {
                items.remove(&item);
                Ok(())
            }
            _ => Err(CustodyError::NotHolder {
                collection: collection.to_string(),
                item,
                principal: principal.clone(),
            }),
        }
    }

    /// Returns the current holder of an item, or `None` if it is unheld.
    pub fn holder_of(&self, collection: &str, item: ItemId) -> Option<&Principal> {
        self.records.get(collection)?.get(&item)
    }

    /// Returns the number of items currently held in the pool.
    pub fn held_count(&self) -> u64 {
        self.records.values().map(|items| items.len() as u64).sum()
    }
}
