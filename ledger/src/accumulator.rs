//! # Reward Accumulator
//!
//! The global reward clock of the pool. Tracks a monotonically
//! non-decreasing "reward per weighted unit" value and the time it was last
//! brought up to date. Every weighted unit staked in the pool earns the
//! difference between the current accumulator and the accumulator value at
//! which the owning account was last settled.
//!
//! The projection is pure: given a timestamp, the configured rate, and the
//! pool-wide weighted stake, it prices the elapsed interval at the weight
//! that was actually in effect. Committing the projection *before* any
//! mutation of the pool's total weight is what keeps past intervals priced
//! correctly — see [`crate::pool::StakingPool`] for the call ordering.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed-point scale factor applied to the accumulator so that integer
/// division by the total weighted stake does not destroy precision.
pub const SCALE: u128 = 1_000_000_000_000_000_000;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while projecting the accumulator.
#[derive(Debug, Error)]
pub enum AccumulatorError {
    /// The supplied timestamp is earlier than the last committed update.
    /// The execution substrate owns the clock and guarantees monotonicity;
    /// the ledger still refuses to price a negative interval.
    #[error("clock regression: now {now} is before last update {last_update}")]
    ClockRegression {
        /// The timestamp passed by the caller.
        now: u64,
        /// The timestamp of the last committed checkpoint.
        last_update: u64,
    },

    /// The accrued amount does not fit in `u128`.
    #[error("accumulator overflow: {elapsed}s elapsed at rate {rate}")]
    Overflow {
        /// Seconds since the last checkpoint.
        elapsed: u64,
        /// The configured reward rate.
        rate: u128,
    },
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Global reward-per-weighted-unit accumulator.
///
/// Both fields are committed together, and only after every fallible step of
/// the enclosing operation has succeeded, so a failed operation never moves
/// the clock.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardAccumulator {
    /// Reward per weighted unit accrued so far, scaled by [`SCALE`].
    pub accumulator: u128,
    /// Unix seconds at which `accumulator` was last committed.
    pub last_update_time: u64,
}

impl RewardAccumulator {
    /// Creates an accumulator starting at zero, anchored at `start_time`.
    pub fn new(start_time: u64) -> Self {
        Self {
            accumulator: 0,
            last_update_time: start_time,
        }
    }

    /// Projects the accumulator value at `now` without committing it.
    ///
    /// When the pool holds no weight the accumulator is returned unchanged:
    /// there is nobody to attribute the elapsed interval to, and dividing by
    /// zero weight is the degenerate unbounded-rate case. Otherwise the
    /// elapsed seconds are priced at `rate`, scaled, and spread across the
    /// total weighted stake.
    ///
    /// # Errors
    ///
    /// Returns [`AccumulatorError::ClockRegression`] if `now` precedes the
    /// last committed update while weight is staked.
    /// Returns [`AccumulatorError::Overflow`] if the accrued amount exceeds
    /// `u128`.
    pub fn projected(
        &self,
        now: u64,
        rate: u128,
        total_weighted: u128,
    ) -> Result<u128, AccumulatorError> {
        if total_weighted == 0 {
            return Ok(self.accumulator);
        }

        let elapsed = now
            .checked_sub(self.last_update_time)
            .ok_or(AccumulatorError::ClockRegression {
                now,
                last_update: self.last_update_time,
            })?;

        let accrued = (elapsed as u128)
            .checked_mul(rate)
            .and_then(|v| v.checked_mul(SCALE))
            .ok_or(AccumulatorError::Overflow { elapsed, rate })?
            / total_weighted;

        self.accumulator
            .checked_add(accrued)
            .ok_or(AccumulatorError::Overflow { elapsed, rate })
    }

    /// Commits a previously projected value, advancing the clock to `now`.
    ///
    /// The caller is responsible for having obtained `value` from
    /// [`projected`](Self::projected) at the same `now` — the split between
    /// projection and commit exists so that the enclosing operation can run
    /// all of its fallible steps before any state is written.
    pub fn commit(&mut self, now: u64, value: u128) {
        self.accumulator = value;
        self.last_update_time = now;
    }
}
