//! # User Accounts
//!
//! Per-principal staking bookkeeping: the weighted stake a principal
//! currently has deposited, the accumulator value it was last settled
//! against, and the reward it has earned but not yet redeemed.
//!
//! Settlement is the bridge between the global accumulator and a single
//! account: it banks everything the account's weight earned since the last
//! checkpoint and moves the checkpoint forward, so that no interval is ever
//! counted twice or skipped. The math here is pure — [`AccountBook::settled`]
//! computes the post-settlement account without touching storage, and the
//! pool commits it only once the whole enclosing operation has succeeded.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::accumulator::SCALE;

/// Hex-encoded public key identifying an account.
pub type Principal = String;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during account settlement.
#[derive(Debug, Error)]
pub enum AccountError {
    /// The global accumulator is behind this account's checkpoint. The
    /// accumulator is non-decreasing, so this indicates corrupted state.
    #[error(
        "accumulator {accumulator} is behind checkpoint {checkpoint} for {principal}"
    )]
    CheckpointRegression {
        /// The account being settled.
        principal: Principal,
        /// The account's recorded checkpoint.
        checkpoint: u128,
        /// The (smaller) accumulator value that was supplied.
        accumulator: u128,
    },

    /// The banked reward does not fit in `u128`.
    #[error("reward overflow while settling {principal}")]
    RewardOverflow {
        /// The account being settled.
        principal: Principal,
    },
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A principal's staking position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    /// Sum of the deposit-time base weights of every item this principal
    /// currently has staked. Later price or liquidation changes to a
    /// collection do not touch it.
    pub weighted_stake: u128,
    /// The accumulator value this account was last settled against.
    pub reward_checkpoint: u128,
    /// Earned reward that has not been redeemed yet.
    pub banked_reward: u128,
}

/// The store of all user accounts. Accounts come into existence the first
/// time a principal is touched and are never deleted — a fully withdrawn
/// account simply returns to zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountBook {
    accounts: HashMap<Principal, UserAccount>,
}

impl AccountBook {
    /// Creates an empty account book.
    pub fn new() -> Self {
        Self {
            accounts: HashMap::new(),
        }
    }

    /// Returns the account for `principal`, zero-valued if never touched.
    pub fn get(&self, principal: &Principal) -> UserAccount {
        self.accounts.get(principal).copied().unwrap_or_default()
    }

    /// Returns a mutable reference to the account, creating it if needed.
    pub fn account_mut(&mut self, principal: &Principal) -> &mut UserAccount {
        self.accounts.entry(principal.clone()).or_default()
    }

    /// Computes the account as it would look after settling against
    /// `accumulator`: earned reward banked, checkpoint advanced. Pure —
    /// nothing is written.
    ///
    /// # Errors
    ///
    /// Returns [`AccountError::CheckpointRegression`] if `accumulator` is
    /// behind the account's checkpoint.
    /// Returns [`AccountError::RewardOverflow`] if the banked reward would
    /// exceed `u128`.
    pub fn settled(
        &self,
        principal: &Principal,
        accumulator: u128,
    ) -> Result<UserAccount, AccountError> {
        let account = self.get(principal);

        let delta = accumulator.checked_sub(account.reward_checkpoint).ok_or(
            AccountError::CheckpointRegression {
                principal: principal.clone(),
                checkpoint: account.reward_checkpoint,
                accumulator,
            },
        )?;

        let newly_earned = account
            .weighted_stake
            .checked_mul(delta)
            .ok_or_else(|| AccountError::RewardOverflow {
                principal: principal.clone(),
            })?
            / SCALE;

        let banked = account.banked_reward.checked_add(newly_earned).ok_or_else(|| {
            AccountError::RewardOverflow {
                principal: principal.clone(),
            }
        })?;

        Ok(UserAccount {
            weighted_stake: account.weighted_stake,
            reward_checkpoint: accumulator,
            banked_reward: banked,
        })
    }

    /// Sum of `weighted_stake` over all accounts.
    pub fn total_weighted(&self) -> u128 {
        self.accounts.values().map(|a| a.weighted_stake).sum()
    }

    /// Returns the number of accounts ever touched.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Returns `true` if no account was ever touched.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
