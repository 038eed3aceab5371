//! # Collection Registry
//!
//! Administrator-controlled table of asset collections eligible for
//! deposit. Each collection carries an immutable base weight assigned at
//! creation, a mutable informational price, an acceptance flag gating new
//! deposits, and a one-way liquidation latch that trips when the price
//! falls to half of the initial weight or below.
//!
//! The registry is a pure table: it does not know who the administrator is.
//! Caller gating happens in [`crate::pool::StakingPool`], which rejects
//! non-admin callers before any registry state is read or written.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::Liquidation;

/// Identifier of a registered asset collection.
pub type CollectionId = String;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A collection with this identifier is already registered.
    #[error("collection already exists: {0}")]
    CollectionExists(CollectionId),

    /// The referenced collection is not registered.
    #[error("collection not found: {0}")]
    CollectionNotFound(CollectionId),

    /// Collections must carry a positive base weight.
    #[error("collection weight must be positive")]
    ZeroWeight,

    /// Prices are informational but still must be positive.
    #[error("collection price must be positive")]
    ZeroPrice,
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A registered asset collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Base weight assigned at creation. Immutable thereafter; every item
    /// of this collection stakes at exactly this weight, regardless of
    /// later price movement.
    pub init_weight: u128,
    /// Informational price, admin-mutable.
    pub current_price: u128,
    /// Whether new deposits from this collection are accepted. Toggling
    /// this never affects weight that is already staked.
    pub accepted: bool,
    /// One-way latch: set when the price crosses to half of `init_weight`
    /// or below, never cleared.
    pub liquidated: bool,
    /// Timestamp when the collection was registered.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the most recent registry change to this collection.
    pub updated_at: DateTime<Utc>,
}

/// The collection registry — creation, acceptance, and pricing of asset
/// collections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionRegistry {
    collections: HashMap<CollectionId, Collection>,
}

impl CollectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            collections: HashMap::new(),
        }
    }

    /// Registers a new collection with the given base weight.
    ///
    /// The current price starts equal to the base weight and the
    /// liquidation latch starts cleared.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ZeroWeight`] if `weight` is zero.
    /// Returns [`RegistryError::CollectionExists`] if the identifier is
    /// already registered — the base weight of an existing collection can
    /// never be overwritten.
    pub fn create(
        &mut self,
        id: &str,
        weight: u128,
        accepted: bool,
    ) -> Result<(), RegistryError> {
        if weight == 0 {
            return Err(RegistryError::ZeroWeight);
        }
        if self.collections.contains_key(id) {
            return Err(RegistryError::CollectionExists(id.to_string()));
        }

        let now = Utc::now();
        self.collections.insert(
            id.to_string(),
            Collection {
                init_weight: weight,
                current_price: weight,
                accepted,
                liquidated: false,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(())
    }

    /// Toggles whether the collection accepts new deposits.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::CollectionNotFound`] if the collection is
    /// not registered.
    pub fn set_acceptance(&mut self, id: &str, accepted: bool) -> Result<(), RegistryError> {
        let collection = self
            .collections
            .get_mut(id)
            .ok_or_else(|| RegistryError::CollectionNotFound(id.to_string()))?;
        collection.accepted = accepted;
        collection.updated_at = Utc::now();
        Ok(())
    }

    /// Updates the informational price of a collection.
    ///
    /// If the collection has not yet been liquidated and the new price is
    /// at or below half of the initial weight, the liquidation latch is set
    /// and a [`Liquidation`] event is returned. The latch is one-way: once
    /// set, later price updates never fire the event again, and a price
    /// above the threshold never clears it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::CollectionNotFound`] if the collection is
    /// not registered.
    /// Returns [`RegistryError::ZeroPrice`] if `new_price` is zero.
    pub fn set_current_price(
        &mut self,
        id: &str,
        new_price: u128,
    ) -> Result<Option<Liquidation>, RegistryError> {
        if new_price == 0 {
            return Err(RegistryError::ZeroPrice);
        }
        let collection = self
            .collections
            .get_mut(id)
            .ok_or_else(|| RegistryError::CollectionNotFound(id.to_string()))?;

        let old_price = collection.current_price;
        collection.current_price = new_price;
        collection.updated_at = Utc::now();

        if !collection.liquidated && new_price <= collection.init_weight / 2 {
            collection.liquidated = true;
            return Ok(Some(Liquidation {
                collection: id.to_string(),
                old_price,
                new_price,
            }));
        }

        Ok(None)
    }

    /// Returns the collection for `id`, or `None` if it is not registered.
    pub fn get(&self, id: &str) -> Option<&Collection> {
        self.collections.get(id)
    }

    /// Returns whether the collection exists and accepts new deposits.
    pub fn is_accepted(&self, id: &str) -> bool {
        self.collections.get(id).map(|c| c.accepted).unwrap_or(false)
    }

    /// Returns the number of registered collections.
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    /// Returns `true` if no collections are registered.
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}
