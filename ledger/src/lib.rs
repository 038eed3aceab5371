//! # Stakeledger — Custodial Pooling & Reward-Accrual Ledger
//!
//! Principals deposit items from registered asset collections into a shared
//! pool and accrue reward proportional to the weighted value they have
//! deposited and the time elapsed, at a globally configured rate. This
//! crate is the ledger only: who holds what, who has earned what, and which
//! collections count for how much. Issuing the reward units and moving the
//! underlying assets are external collaborators reached through the traits
//! in [`collaborators`].
//!
//! ## Architecture
//!
//! ```text
//! accumulator.rs   — global reward-per-weighted-unit clock
//! registry.rs      — collection weights, acceptance, liquidation latch
//! custody.rs       — authoritative per-item holder records
//! account.rs       — per-principal stake, checkpoint, banked reward
//! guard.rs         — reentrancy exclusion for externally-calling operations
//! collaborators.rs — mint and custody-transfer capability traits
//! events.rs        — typed results of successful operations
//! pool.rs          — the public operations, composed atomically
//! ```
//!
//! ## Design Principles
//!
//! 1. All weight and reward arithmetic is `u128` with `checked_add` /
//!    `checked_mul` / `checked_sub` — wrapping arithmetic and money do not
//!    mix.
//! 2. Operations are atomic: every mutating call stages its writes, runs
//!    its external calls, and commits last. A failure at any point leaves
//!    the ledger bit-identical to before the call.
//! 3. Settlement happens-before weight mutation. The accumulator is
//!    checkpointed and the caller settled before any weight delta is
//!    applied, so every interval is priced at the weight actually in
//!    effect.
//! 4. Every public type is serializable (serde) for wire transport and
//!    persistent storage.

pub mod account;
pub mod accumulator;
pub mod collaborators;
pub mod custody;
pub mod events;
pub mod guard;
pub mod pool;
pub mod registry;

pub use account::{AccountBook, AccountError, Principal, UserAccount};
pub use accumulator::{AccumulatorError, RewardAccumulator, SCALE};
pub use collaborators::{AssetCustody, CollaboratorError, RewardMinter};
pub use custody::{CustodyError, CustodyLedger, ItemId};
pub use events::{Liquidation, Redeemed, Staked, Withdrawn};
pub use guard::{GuardError, ReentrancyGuard};
pub use pool::{PoolConfig, PoolError, StakingPool};
pub use registry::{Collection, CollectionId, CollectionRegistry, RegistryError};
