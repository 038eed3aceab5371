//! Typed events returned by successful pool operations.
//!
//! Every state-changing operation that outside observers care about returns
//! a value describing exactly what happened, so the surrounding execution
//! environment can log, index, or relay it.

use serde::{Deserialize, Serialize};

use crate::account::Principal;
use crate::custody::ItemId;
use crate::registry::CollectionId;

/// Items were deposited into the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staked {
    /// The depositing principal.
    pub caller: Principal,
    /// Collections of the deposited items, paired with `items`.
    pub collections: Vec<CollectionId>,
    /// The deposited items.
    pub items: Vec<ItemId>,
}

/// Items were withdrawn from the pool by their holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawn {
    /// The withdrawing principal.
    pub caller: Principal,
    /// Collections of the withdrawn items, paired with `items`.
    pub collections: Vec<CollectionId>,
    /// The withdrawn items.
    pub items: Vec<ItemId>,
}

/// Banked reward was paid out through the reward-issuance collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redeemed {
    /// The redeeming principal.
    pub caller: Principal,
    /// Amount of reward units minted to the caller.
    pub amount: u128,
}

/// A collection's price crossed to half of its initial weight or below,
/// tripping the one-way liquidation latch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liquidation {
    /// The liquidated collection.
    pub collection: CollectionId,
    /// The price before the triggering update.
    pub old_price: u128,
    /// The price that crossed the threshold.
    pub new_price: u128,
}
