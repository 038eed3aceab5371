//! # Staking Pool Orchestration
//!
//! The public face of the ledger. Each operation composes the collection
//! registry, the custody ledger, the account book, and the reward
//! accumulator into one atomic unit: it either completes in full or leaves
//! every ledger total exactly as it found it.
//!
//! ## Commit discipline
//!
//! Every mutating operation runs in three phases:
//!
//! 1. **Stage** — project the accumulator at `now`, compute the caller's
//!    settled account and the weight deltas into locals, and validate every
//!    precondition against current state. Nothing is written.
//! 2. **External calls** — invoke the custody-transfer or mint capability.
//!    A refusal aborts the operation; since nothing was written in phase 1,
//!    there is nothing to roll back (redeem, which must zero the banked
//!    reward *before* minting, is the one exception and restores its
//!    pre-call state on a refused mint).
//! 3. **Commit** — write the staged values in one batch.
//!
//! Settling the caller in phase 1 before any weight delta is applied is
//! what prices all weight added or removed by the call from `now` forward
//! only: the projection uses the weight that was actually in effect, and
//! the checkpoint moves before the totals do.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::account::{AccountBook, AccountError, Principal, UserAccount};
use crate::accumulator::{AccumulatorError, RewardAccumulator};
use crate::collaborators::{AssetCustody, CollaboratorError, RewardMinter};
use crate::custody::{CustodyError, CustodyLedger, ItemId};
use crate::events::{Liquidation, Redeemed, Staked, Withdrawn};
use crate::guard::{GuardError, ReentrancyGuard};
use crate::registry::{Collection, CollectionId, CollectionRegistry, RegistryError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The caller is not the pool administrator. Rejected before any state
    /// is read or written.
    #[error("unauthorized: only the pool administrator may call this")]
    NotAdmin,

    /// Stake and withdraw require at least one item.
    #[error("item list is empty")]
    EmptyItemList,

    /// The collection and item lists must pair up one to one.
    #[error("list length mismatch: {collections} collections, {items} items")]
    LengthMismatch {
        /// Number of collection identifiers supplied.
        collections: usize,
        /// Number of item identifiers supplied.
        items: usize,
    },

    /// The collection is registered but closed to new deposits.
    #[error("collection {0} is not accepting deposits")]
    CollectionNotAccepted(CollectionId),

    /// The same item was listed more than once in a single call.
    #[error("item {collection}/{item} listed more than once in this call")]
    DuplicateItem {
        /// Collection of the repeated item.
        collection: CollectionId,
        /// The repeated item.
        item: ItemId,
    },

    /// Redeem requires a positive banked reward.
    #[error("nothing to redeem for {0}")]
    NothingToRedeem(Principal),

    /// The pool-wide or per-account weighted stake would overflow.
    #[error("weighted stake overflow")]
    WeightOverflow,

    /// The weight being removed exceeds what is recorded. Indicates
    /// corrupted state; withdrawals of held items can never trip this.
    #[error("weighted stake underflow")]
    WeightUnderflow,

    /// A registry precondition was violated.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A custody precondition was violated.
    #[error(transparent)]
    Custody(#[from] CustodyError),

    /// Account settlement failed.
    #[error(transparent)]
    Account(#[from] AccountError),

    /// Accumulator projection failed.
    #[error(transparent)]
    Accumulator(#[from] AccumulatorError),

    /// A guarded region rejected re-entry.
    #[error(transparent)]
    Guard(#[from] GuardError),

    /// An external collaborator refused its call.
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Static configuration of a staking pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// The only principal allowed to run registry operations.
    pub admin: Principal,
    /// The principal that holds deposited items on the pool's behalf; used
    /// as counterparty in custody transfers.
    pub custodian: Principal,
    /// Reward units accrued per second, spread across the total weighted
    /// stake.
    pub reward_rate: u128,
}

/// A caller's settlement staged at a given timestamp, not yet committed.
struct Settlement {
    now: u64,
    accumulator: u128,
    account: UserAccount,
}

/// The custodial staking pool.
///
/// Generic over its two collaborators so that the reward-issuance and
/// asset-custody components stay swappable and the ledger logic stays
/// testable with in-memory doubles.
pub struct StakingPool<M: RewardMinter, C: AssetCustody> {
    config: PoolConfig,
    registry: CollectionRegistry,
    custody: CustodyLedger,
    accounts: AccountBook,
    accumulator: RewardAccumulator,
    total_weighted_stake: u128,
    total_items_staked: u64,
    guard: ReentrancyGuard,
    minter: M,
    assets: C,
}

impl<M: RewardMinter, C: AssetCustody> StakingPool<M, C> {
    /// Creates an empty pool anchored at `start_time` (unix seconds).
    pub fn new(config: PoolConfig, start_time: u64, minter: M, assets: C) -> Self {
        Self {
            config,
            registry: CollectionRegistry::new(),
            custody: CustodyLedger::new(),
            accounts: AccountBook::new(),
            accumulator: RewardAccumulator::new(start_time),
            total_weighted_stake: 0,
            total_items_staked: 0,
            guard: ReentrancyGuard::new(),
            minter,
            assets,
        }
    }

    // -----------------------------------------------------------------------
    // Staking operations
    // -----------------------------------------------------------------------

    /// Deposits the listed items into the pool for `caller`.
    ///
    /// Lists pair up positionally: `items[i]` belongs to `collections[i]`.
    /// Every collection must accept deposits, every item must be unheld,
    /// and no item may appear twice in the call. The caller is settled
    /// before the new weight takes effect, so the added weight earns from
    /// `now` forward only.
    ///
    /// # Errors
    ///
    /// Any violated precondition or refused custody transfer aborts the
    /// whole call with no state change.
    pub fn stake(
        &mut self,
        caller: &Principal,
        collections: &[CollectionId],
        items: &[ItemId],
        now: u64,
    ) -> Result<Staked, PoolError> {
        validate_pairing(collections, items)?;

        // Stage.
        let settlement = self.prepare_settlement(caller, now)?;
        let mut weight_delta: u128 = 0;
        let mut seen = HashSet::new();
        for (collection, &item) in collections.iter().zip(items) {
            let entry = self
                .registry
                .get(collection)
                .ok_or_else(|| RegistryError::CollectionNotFound(collection.clone()))?;
            if !entry.accepted {
                return Err(PoolError::CollectionNotAccepted(collection.clone()));
            }
            if !seen.insert((collection.clone(), item)) {
                return Err(PoolError::DuplicateItem {
                    collection: collection.clone(),
                    item,
                });
            }
            if let Some(holder) = self.custody.holder_of(collection, item) {
                return Err(CustodyError::AlreadyHeld {
                    collection: collection.clone(),
                    item,
                    holder: holder.clone(),
                }
                .into());
            }
            weight_delta = weight_delta
                .checked_add(entry.init_weight)
                .ok_or(PoolError::WeightOverflow)?;
        }
        let new_account_weight = settlement
            .account
            .weighted_stake
            .checked_add(weight_delta)
            .ok_or(PoolError::WeightOverflow)?;
        let new_total = self
            .total_weighted_stake
            .checked_add(weight_delta)
            .ok_or(PoolError::WeightOverflow)?;

        // External custody transfers, caller to custodian. No ledger state
        // has been written yet, so a refusal aborts cleanly.
        for (collection, &item) in collections.iter().zip(items) {
            self.assets
                .transfer_item(collection, item, caller, &self.config.custodian)?;
        }

        // Commit.
        self.commit_settlement(caller, &settlement);
        for (collection, &item) in collections.iter().zip(items) {
            self.custody.record_deposit(collection, item, caller)?;
        }
        self.accounts.account_mut(caller).weighted_stake = new_account_weight;
        self.total_weighted_stake = new_total;
        self.total_items_staked += items.len() as u64;

        info!(
            caller = %caller,
            items = items.len(),
            weight = %weight_delta,
            total_weight = %self.total_weighted_stake,
            "items staked"
        );
        Ok(Staked {
            caller: caller.clone(),
            collections: collections.to_vec(),
            items: items.to_vec(),
        })
    }

    /// Withdraws the listed items, returning custody to `caller`.
    ///
    /// The caller must be the recorded holder of every listed item. The
    /// caller is settled before the weight is removed, so the departing
    /// weight is paid for everything it earned up to `now`.
    ///
    /// # Errors
    ///
    /// Any violated precondition or refused custody transfer aborts the
    /// whole call with no state change.
    pub fn withdraw(
        &mut self,
        caller: &Principal,
        collections: &[CollectionId],
        items: &[ItemId],
        now: u64,
    ) -> Result<Withdrawn, PoolError> {
        validate_pairing(collections, items)?;

        // Stage.
        let settlement = self.prepare_settlement(caller, now)?;
        let mut weight_delta: u128 = 0;
        let mut seen = HashSet::new();
        for (collection, &item) in collections.iter().zip(items) {
            if !seen.insert((collection.clone(), item)) {
                return Err(PoolError::DuplicateItem {
                    collection: collection.clone(),
                    item,
                });
            }
            match self.custody.holder_of(collection, item) {
                Some(holder) if holder == caller => {}
                _ => {
                    return Err(CustodyError::NotHolder {
                        collection: collection.clone(),
                        item,
                        principal: caller.clone(),
                    }
                    .into());
                }
            }
            let entry = self
                .registry
                .get(collection)
                .ok_or_else(|| RegistryError::CollectionNotFound(collection.clone()))?;
            weight_delta = weight_delta
                .checked_add(entry.init_weight)
                .ok_or(PoolError::WeightOverflow)?;
        }
        let new_account_weight = settlement
            .account
            .weighted_stake
            .checked_sub(weight_delta)
            .ok_or(PoolError::WeightUnderflow)?;
        let new_total = self
            .total_weighted_stake
            .checked_sub(weight_delta)
            .ok_or(PoolError::WeightUnderflow)?;

        // External custody transfers, custodian back to caller.
        for (collection, &item) in collections.iter().zip(items) {
            self.assets
                .transfer_item(collection, item, &self.config.custodian, caller)?;
        }

        // Commit.
        self.commit_settlement(caller, &settlement);
        for (collection, &item) in collections.iter().zip(items) {
            self.custody.record_withdrawal(collection, item, caller)?;
        }
        self.accounts.account_mut(caller).weighted_stake = new_account_weight;
        self.total_weighted_stake = new_total;
        self.total_items_staked -= items.len() as u64;

        info!(
            caller = %caller,
            items = items.len(),
            weight = %weight_delta,
            total_weight = %self.total_weighted_stake,
            "items withdrawn"
        );
        Ok(Withdrawn {
            caller: caller.clone(),
            collections: collections.to_vec(),
            items: items.to_vec(),
        })
    }

    /// Pays out the caller's banked reward through the mint capability.
    ///
    /// Runs under reentrancy exclusion: the banked reward is zeroed before
    /// the external mint call, and no mutating re-entry can complete while
    /// the mint is in flight. A refused mint restores the caller's
    /// pre-call account and accumulator state.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NothingToRedeem`] if settlement yields a zero
    /// banked reward; the mint capability is not called in that case.
    pub fn redeem(&mut self, caller: &Principal, now: u64) -> Result<Redeemed, PoolError> {
        self.guard.enter()?;
        let result = self.redeem_locked(caller, now);
        self.guard.exit();
        result
    }

    fn redeem_locked(&mut self, caller: &Principal, now: u64) -> Result<Redeemed, PoolError> {
        let settlement = self.prepare_settlement(caller, now)?;
        let amount = settlement.account.banked_reward;
        if amount == 0 {
            return Err(PoolError::NothingToRedeem(caller.clone()));
        }

        let prior_account = self.accounts.get(caller);
        let prior_accumulator = self.accumulator.clone();

        // Zero the banked reward before the external call.
        let mut paid = settlement;
        paid.account.banked_reward = 0;
        self.commit_settlement(caller, &paid);

        if let Err(refusal) = self.minter.mint(caller, amount) {
            *self.accounts.account_mut(caller) = prior_account;
            self.accumulator = prior_accumulator;
            return Err(refusal.into());
        }

        info!(caller = %caller, amount = %amount, "reward redeemed");
        Ok(Redeemed {
            caller: caller.clone(),
            amount,
        })
    }

    // -----------------------------------------------------------------------
    // Registry administration
    // -----------------------------------------------------------------------

    /// Registers a new collection. Admin only.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotAdmin`] for any other caller, before any
    /// state is touched. Registry preconditions (positive weight, unused
    /// identifier) surface as [`PoolError::Registry`].
    pub fn create_collection(
        &mut self,
        caller: &Principal,
        id: &str,
        weight: u128,
        accepted: bool,
    ) -> Result<(), PoolError> {
        self.require_admin(caller)?;
        self.registry.create(id, weight, accepted)?;
        info!(collection = id, weight = %weight, accepted, "collection registered");
        Ok(())
    }

    /// Opens or closes a collection for new deposits. Admin only.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotAdmin`] for any other caller.
    pub fn set_acceptance(
        &mut self,
        caller: &Principal,
        id: &str,
        accepted: bool,
    ) -> Result<(), PoolError> {
        self.require_admin(caller)?;
        self.registry.set_acceptance(id, accepted)?;
        info!(collection = id, accepted, "collection acceptance updated");
        Ok(())
    }

    /// Updates a collection's informational price. Admin only.
    ///
    /// Returns the [`Liquidation`] event when the update trips the one-way
    /// latch (price at or below half the initial weight, latch not yet
    /// set). Already-staked weight is unaffected either way.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NotAdmin`] for any other caller.
    pub fn set_current_price(
        &mut self,
        caller: &Principal,
        id: &str,
        new_price: u128,
    ) -> Result<Option<Liquidation>, PoolError> {
        self.require_admin(caller)?;
        let event = self.registry.set_current_price(id, new_price)?;
        if let Some(liquidation) = &event {
            warn!(
                collection = id,
                old_price = %liquidation.old_price,
                new_price = %liquidation.new_price,
                "collection liquidated"
            );
        }
        Ok(event)
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    /// The reward-per-weighted-unit accumulator projected at `now`.
    pub fn reward_per_weighted_unit(&self, now: u64) -> Result<u128, PoolError> {
        Ok(self.accumulator.projected(
            now,
            self.config.reward_rate,
            self.total_weighted_stake,
        )?)
    }

    /// Total reward `principal` could redeem at `now`: banked plus accrued
    /// since the last settlement.
    pub fn earned(&self, principal: &Principal, now: u64) -> Result<u128, PoolError> {
        let accumulator = self.reward_per_weighted_unit(now)?;
        Ok(self.accounts.settled(principal, accumulator)?.banked_reward)
    }

    /// Current holder of an item, or `None` if it is not in the pool.
    pub fn holder_of(&self, collection: &str, item: ItemId) -> Option<&Principal> {
        self.custody.holder_of(collection, item)
    }

    /// The registered collection for `id`.
    pub fn collection(&self, id: &str) -> Option<&Collection> {
        self.registry.get(id)
    }

    /// Sum of all weighted stake currently in the pool.
    pub fn total_weighted_stake(&self) -> u128 {
        self.total_weighted_stake
    }

    /// Number of items currently held in the pool.
    pub fn total_items_staked(&self) -> u64 {
        self.total_items_staked
    }

    /// The weighted stake currently recorded for `principal`.
    pub fn weighted_stake(&self, principal: &Principal) -> u128 {
        self.accounts.get(principal).weighted_stake
    }

    /// The pool administrator.
    pub fn admin(&self) -> &Principal {
        &self.config.admin
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn require_admin(&self, caller: &Principal) -> Result<(), PoolError> {
        if caller != &self.config.admin {
            return Err(PoolError::NotAdmin);
        }
        Ok(())
    }

    /// Stages the global checkpoint and the caller's settlement at `now`.
    /// Pure with respect to pool state; pair with
    /// [`commit_settlement`](Self::commit_settlement).
    fn prepare_settlement(
        &self,
        principal: &Principal,
        now: u64,
    ) -> Result<Settlement, PoolError> {
        // The projection skips the clock check when the pool is empty;
        // a committed checkpoint must never move the clock backwards.
        if now < self.accumulator.last_update_time {
            return Err(AccumulatorError::ClockRegression {
                now,
                last_update: self.accumulator.last_update_time,
            }
            .into());
        }
        let accumulator = self.accumulator.projected(
            now,
            self.config.reward_rate,
            self.total_weighted_stake,
        )?;
        let account = self.accounts.settled(principal, accumulator)?;
        debug!(
            principal = %principal,
            accumulator = %accumulator,
            banked = %account.banked_reward,
            "settlement staged"
        );
        Ok(Settlement {
            now,
            accumulator,
            account,
        })
    }

    /// Writes a staged settlement: global checkpoint first, then the
    /// settled account. Runs before any weight delta is applied.
    fn commit_settlement(&mut self, principal: &Principal, settlement: &Settlement) {
        self.accumulator
            .commit(settlement.now, settlement.accumulator);
        *self.accounts.account_mut(principal) = settlement.account;
    }
}

fn validate_pairing(collections: &[CollectionId], items: &[ItemId]) -> Result<(), PoolError> {
    if collections.is_empty() && items.is_empty() {
        return Err(PoolError::EmptyItemList);
    }
    if collections.len() != items.len() {
        return Err(PoolError::LengthMismatch {
            collections: collections.len(),
            items: items.len(),
        });
    }
    Ok(())
}
