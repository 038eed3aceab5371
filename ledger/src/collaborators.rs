//! # Collaborator Capabilities
//!
//! The ledger does not issue reward units and does not move the underlying
//! assets itself — both are external components reached through the narrow
//! traits below. The pool invokes them mid-operation and treats any refusal
//! as fatal to the enclosing operation: either the external effect and the
//! ledger record both happen, or neither does.
//!
//! Enforcement that *only this ledger* may mint is the issuance component's
//! job, not modeled here.

use thiserror::Error;

use crate::account::Principal;
use crate::custody::ItemId;
use crate::registry::CollectionId;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A collaborator refused or failed an external call.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The reward-issuance component refused to mint.
    #[error("reward issuance refused: {0}")]
    MintRefused(String),

    /// The asset contract refused to transfer custody of an item.
    #[error("custody transfer refused for {collection}/{item}: {reason}")]
    TransferRefused {
        /// Collection of the item being transferred.
        collection: CollectionId,
        /// The item being transferred.
        item: ItemId,
        /// The collaborator's stated reason.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Reward-issuance capability: mints reward units to a principal.
pub trait RewardMinter {
    /// Mints `amount` reward units to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::MintRefused`] if the issuance component
    /// rejects the mint; the enclosing ledger operation aborts.
    fn mint(&mut self, to: &Principal, amount: u128) -> Result<(), CollaboratorError>;
}

/// Asset-custody capability: moves a deposited item between principals.
pub trait AssetCustody {
    /// Transfers custody of `item` in `collection` from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::TransferRefused`] if the asset contract
    /// rejects the transfer; the enclosing ledger operation aborts.
    fn transfer_item(
        &mut self,
        collection: &CollectionId,
        item: ItemId,
        from: &Principal,
        to: &Principal,
    ) -> Result<(), CollaboratorError>;
}
