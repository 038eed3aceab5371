//! Integration tests for the staking pool.
//!
//! These tests exercise full operations across module boundaries with
//! in-memory collaborator doubles: staking lifecycles, reward accrual at a
//! known rate, liquidation, redemption, and the failure paths that must
//! leave the ledger untouched.

use std::cell::RefCell;
use std::rc::Rc;

use stakeledger::{
    AssetCustody, CollaboratorError, CollectionId, ItemId, PoolConfig, PoolError, Principal,
    RewardMinter, StakingPool,
};

// ---------------------------------------------------------------------------
// Collaborator doubles
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MintLog {
    minted: Vec<(Principal, u128)>,
    refuse: bool,
}

/// Reward-issuance double shared between the pool and the test.
#[derive(Clone, Default)]
struct SharedMinter(Rc<RefCell<MintLog>>);

impl RewardMinter for SharedMinter {
    fn mint(&mut self, to: &Principal, amount: u128) -> Result<(), CollaboratorError> {
        let mut log = self.0.borrow_mut();
        if log.refuse {
            return Err(CollaboratorError::MintRefused("issuance halted".into()));
        }
        log.minted.push((to.clone(), amount));
        Ok(())
    }
}

#[derive(Default)]
struct TransferLog {
    transfers: Vec<(CollectionId, ItemId, Principal, Principal)>,
    refuse: bool,
}

/// Asset-custody double shared between the pool and the test.
#[derive(Clone, Default)]
struct SharedAssets(Rc<RefCell<TransferLog>>);

impl AssetCustody for SharedAssets {
    fn transfer_item(
        &mut self,
        collection: &CollectionId,
        item: ItemId,
        from: &Principal,
        to: &Principal,
    ) -> Result<(), CollaboratorError> {
        let mut log = self.0.borrow_mut();
        if log.refuse {
            return Err(CollaboratorError::TransferRefused {
                collection: collection.clone(),
                item,
                reason: "asset contract paused".into(),
            });
        }
        log.transfers
            .push((collection.clone(), item, from.clone(), to.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const DAY: u64 = 86_400;

fn admin() -> Principal {
    "admin".to_string()
}

fn alice() -> Principal {
    "alice".to_string()
}

fn bob() -> Principal {
    "bob".to_string()
}

/// Pool at rate 1 reward-unit per weighted-unit-second, anchored at t=0,
/// returned together with handles to its collaborator doubles.
fn new_pool() -> (
    StakingPool<SharedMinter, SharedAssets>,
    SharedMinter,
    SharedAssets,
) {
    let minter = SharedMinter::default();
    let assets = SharedAssets::default();
    let pool = StakingPool::new(
        PoolConfig {
            admin: admin(),
            custodian: "pool-custodian".to_string(),
            reward_rate: 1,
        },
        0,
        minter.clone(),
        assets.clone(),
    );
    (pool, minter, assets)
}

fn ids(collection: &str, items: &[ItemId]) -> (Vec<CollectionId>, Vec<ItemId>) {
    (
        vec![collection.to_string(); items.len()],
        items.to_vec(),
    )
}

// ---------------------------------------------------------------------------
// Reward accrual
// ---------------------------------------------------------------------------

#[test]
fn single_staker_earns_full_rate_for_a_day() {
    let (mut pool, _, _) = new_pool();
    pool.create_collection(&admin(), "gen", 1, true).unwrap();

    let (c, i) = ids("gen", &[1]);
    pool.stake(&alice(), &c, &i, 0).unwrap();

    assert_eq!(pool.earned(&alice(), DAY).unwrap(), 86_400);
}

#[test]
fn second_staker_splits_the_rate_from_its_own_stake_time() {
    let (mut pool, _, _) = new_pool();
    pool.create_collection(&admin(), "gen", 1, true).unwrap();

    let (c, i) = ids("gen", &[1]);
    pool.stake(&alice(), &c, &i, 0).unwrap();
    assert_eq!(pool.earned(&alice(), DAY).unwrap(), 86_400);

    // Bob joins one second after the day-one measurement with equal weight.
    let (c, i) = ids("gen", &[2]);
    pool.stake(&bob(), &c, &i, DAY + 1).unwrap();

    // One more day: Alice keeps the lone second plus half of the rest;
    // Bob's half-share is one second short of a full half-day.
    let t = 2 * DAY;
    assert_eq!(pool.earned(&alice(), t).unwrap(), 129_600);
    assert_eq!(pool.earned(&bob(), t).unwrap(), 43_199);
}

#[test]
fn weight_is_frozen_at_deposit_time() {
    let (mut pool, _, _) = new_pool();
    pool.create_collection(&admin(), "gen", 4, true).unwrap();

    let (c, i) = ids("gen", &[1]);
    pool.stake(&alice(), &c, &i, 0).unwrap();

    // Price collapse liquidates the collection but touches no staked weight.
    pool.set_current_price(&admin(), "gen", 1).unwrap();
    pool.set_acceptance(&admin(), "gen", false).unwrap();

    assert_eq!(pool.weighted_stake(&alice()), 4);
    assert_eq!(pool.total_weighted_stake(), 4);
    assert_eq!(pool.earned(&alice(), 100).unwrap(), 100);
}

#[test]
fn empty_pool_accrues_nothing_before_first_stake() {
    let (mut pool, _, _) = new_pool();
    pool.create_collection(&admin(), "gen", 1, true).unwrap();

    // Pool sits empty for a year, then Alice stakes.
    let start = 365 * DAY;
    let (c, i) = ids("gen", &[1]);
    pool.stake(&alice(), &c, &i, start).unwrap();

    assert_eq!(pool.earned(&alice(), start).unwrap(), 0);
    assert_eq!(pool.earned(&alice(), start + 10).unwrap(), 10);
}

#[test]
fn accumulator_is_non_decreasing_across_operations() {
    let (mut pool, _, _) = new_pool();
    pool.create_collection(&admin(), "gen", 2, true).unwrap();

    let mut previous = 0;
    let mut check = |pool: &StakingPool<SharedMinter, SharedAssets>, now: u64| {
        let value = pool.reward_per_weighted_unit(now).unwrap();
        assert!(value >= previous);
        previous = value;
    };

    let (c, i) = ids("gen", &[1]);
    pool.stake(&alice(), &c, &i, 10).unwrap();
    check(&pool, 10);

    let (c, i) = ids("gen", &[2, 3]);
    pool.stake(&bob(), &c, &i, 500).unwrap();
    check(&pool, 500);

    let (c, i) = ids("gen", &[1]);
    pool.withdraw(&alice(), &c, &i, 900).unwrap();
    check(&pool, 900);
    check(&pool, 2_000);
}

// ---------------------------------------------------------------------------
// Staking and custody
// ---------------------------------------------------------------------------

#[test]
fn stake_records_custody_and_transfers_to_custodian() {
    let (mut pool, _, assets) = new_pool();
    pool.create_collection(&admin(), "gen", 3, true).unwrap();

    let (c, i) = ids("gen", &[7, 8]);
    let event = pool.stake(&alice(), &c, &i, 0).unwrap();
    assert_eq!(event.caller, alice());
    assert_eq!(event.items, vec![7, 8]);

    assert_eq!(pool.holder_of("gen", 7), Some(&alice()));
    assert_eq!(pool.holder_of("gen", 8), Some(&alice()));
    assert_eq!(pool.total_items_staked(), 2);
    assert_eq!(pool.total_weighted_stake(), 6);

    let log = assets.0.borrow();
    assert_eq!(log.transfers.len(), 2);
    assert_eq!(
        log.transfers[0],
        ("gen".to_string(), 7, alice(), "pool-custodian".to_string())
    );
}

#[test]
fn stake_across_collections_sums_their_weights() {
    let (mut pool, _, _) = new_pool();
    pool.create_collection(&admin(), "gen", 2, true).unwrap();
    pool.create_collection(&admin(), "rare", 10, true).unwrap();

    pool.stake(
        &alice(),
        &["gen".to_string(), "rare".to_string()],
        &[1, 1],
        0,
    )
    .unwrap();

    assert_eq!(pool.weighted_stake(&alice()), 12);
    assert_eq!(pool.total_weighted_stake(), 12);
}

#[test]
fn round_trip_restores_pre_stake_totals() {
    let (mut pool, _, assets) = new_pool();
    pool.create_collection(&admin(), "gen", 5, true).unwrap();

    let (c, i) = ids("gen", &[1, 2, 3]);
    pool.stake(&alice(), &c, &i, 0).unwrap();
    pool.withdraw(&alice(), &c, &i, 100).unwrap();

    assert_eq!(pool.total_weighted_stake(), 0);
    assert_eq!(pool.total_items_staked(), 0);
    assert_eq!(pool.weighted_stake(&alice()), 0);
    assert_eq!(pool.holder_of("gen", 1), None);

    // Custody went out to the custodian and came back to the caller.
    let log = assets.0.borrow();
    let last = log.transfers.last().unwrap();
    assert_eq!(last.2, "pool-custodian".to_string());
    assert_eq!(last.3, alice());
}

#[test]
fn withdrawal_banks_the_final_interval() {
    let (mut pool, _, _) = new_pool();
    pool.create_collection(&admin(), "gen", 1, true).unwrap();

    let (c, i) = ids("gen", &[1]);
    pool.stake(&alice(), &c, &i, 0).unwrap();
    pool.withdraw(&alice(), &c, &i, 600).unwrap();

    // Weight is gone but the earned interval stays banked.
    assert_eq!(pool.weighted_stake(&alice()), 0);
    assert_eq!(pool.earned(&alice(), 600).unwrap(), 600);
    assert_eq!(pool.earned(&alice(), 10_000).unwrap(), 600);
}

#[test]
fn withdraw_by_non_holder_rejected_without_state_change() {
    let (mut pool, _, _) = new_pool();
    pool.create_collection(&admin(), "gen", 1, true).unwrap();

    let (c, i) = ids("gen", &[1]);
    pool.stake(&alice(), &c, &i, 0).unwrap();

    let result = pool.withdraw(&bob(), &c, &i, 10);
    assert!(matches!(result, Err(PoolError::Custody(_))));

    assert_eq!(pool.holder_of("gen", 1), Some(&alice()));
    assert_eq!(pool.total_weighted_stake(), 1);
    assert_eq!(pool.total_items_staked(), 1);
}

#[test]
fn withdraw_of_never_staked_item_rejected() {
    let (mut pool, _, _) = new_pool();
    pool.create_collection(&admin(), "gen", 1, true).unwrap();

    let (c, i) = ids("gen", &[99]);
    let result = pool.withdraw(&alice(), &c, &i, 10);
    assert!(matches!(result, Err(PoolError::Custody(_))));
}

#[test]
fn double_stake_of_same_item_rejected() {
    let (mut pool, _, _) = new_pool();
    pool.create_collection(&admin(), "gen", 1, true).unwrap();

    let (c, i) = ids("gen", &[1]);
    pool.stake(&alice(), &c, &i, 0).unwrap();

    let result = pool.stake(&bob(), &c, &i, 10);
    assert!(matches!(result, Err(PoolError::Custody(_))));
    assert_eq!(pool.holder_of("gen", 1), Some(&alice()));
    assert_eq!(pool.total_weighted_stake(), 1);
}

#[test]
fn partial_failure_aborts_the_whole_stake() {
    let (mut pool, _, _) = new_pool();
    pool.create_collection(&admin(), "gen", 1, true).unwrap();

    let (c, i) = ids("gen", &[5]);
    pool.stake(&bob(), &c, &i, 0).unwrap();

    // Second item of Alice's batch is already held: nothing may land.
    let (c, i) = ids("gen", &[4, 5]);
    let result = pool.stake(&alice(), &c, &i, 10);
    assert!(matches!(result, Err(PoolError::Custody(_))));

    assert_eq!(pool.holder_of("gen", 4), None);
    assert_eq!(pool.weighted_stake(&alice()), 0);
    assert_eq!(pool.total_weighted_stake(), 1);
    assert_eq!(pool.total_items_staked(), 1);
}

#[test]
fn refused_custody_transfer_aborts_stake() {
    let (mut pool, _, assets) = new_pool();
    pool.create_collection(&admin(), "gen", 1, true).unwrap();
    assets.0.borrow_mut().refuse = true;

    let (c, i) = ids("gen", &[1]);
    let result = pool.stake(&alice(), &c, &i, 0);
    assert!(matches!(result, Err(PoolError::Collaborator(_))));

    assert_eq!(pool.holder_of("gen", 1), None);
    assert_eq!(pool.total_weighted_stake(), 0);
    assert_eq!(pool.total_items_staked(), 0);
}

#[test]
fn closing_a_collection_blocks_new_deposits_but_not_withdrawals() {
    let (mut pool, _, _) = new_pool();
    pool.create_collection(&admin(), "gen", 1, true).unwrap();

    let (c, i) = ids("gen", &[1]);
    pool.stake(&alice(), &c, &i, 0).unwrap();
    pool.set_acceptance(&admin(), "gen", false).unwrap();

    let (c2, i2) = ids("gen", &[2]);
    let result = pool.stake(&bob(), &c2, &i2, 10);
    assert!(matches!(result, Err(PoolError::CollectionNotAccepted(_))));

    pool.withdraw(&alice(), &c, &i, 20).unwrap();
    assert_eq!(pool.total_items_staked(), 0);
}

// ---------------------------------------------------------------------------
// Redemption
// ---------------------------------------------------------------------------

#[test]
fn redeem_mints_banked_reward_and_zeroes_it() {
    let (mut pool, minter, _) = new_pool();
    pool.create_collection(&admin(), "gen", 1, true).unwrap();

    let (c, i) = ids("gen", &[1]);
    pool.stake(&alice(), &c, &i, 0).unwrap();

    let event = pool.redeem(&alice(), DAY).unwrap();
    assert_eq!(event.amount, 86_400);
    assert_eq!(minter.0.borrow().minted, vec![(alice(), 86_400)]);
    assert_eq!(pool.earned(&alice(), DAY).unwrap(), 0);
}

#[test]
fn accrual_continues_after_redemption() {
    let (mut pool, _, _) = new_pool();
    pool.create_collection(&admin(), "gen", 1, true).unwrap();

    let (c, i) = ids("gen", &[1]);
    pool.stake(&alice(), &c, &i, 0).unwrap();
    pool.redeem(&alice(), DAY).unwrap();

    assert_eq!(pool.earned(&alice(), DAY + 500).unwrap(), 500);
}

#[test]
fn redeem_with_nothing_banked_rejected_and_no_mint_attempted() {
    let (mut pool, minter, _) = new_pool();

    let result = pool.redeem(&alice(), 100);
    assert!(matches!(result, Err(PoolError::NothingToRedeem(_))));
    assert!(minter.0.borrow().minted.is_empty());
}

#[test]
fn refused_mint_restores_banked_reward() {
    let (mut pool, minter, _) = new_pool();
    pool.create_collection(&admin(), "gen", 1, true).unwrap();

    let (c, i) = ids("gen", &[1]);
    pool.stake(&alice(), &c, &i, 0).unwrap();

    minter.0.borrow_mut().refuse = true;
    let result = pool.redeem(&alice(), DAY);
    assert!(matches!(result, Err(PoolError::Collaborator(_))));

    // The reward survives the refusal and redeems once issuance resumes.
    minter.0.borrow_mut().refuse = false;
    let event = pool.redeem(&alice(), DAY).unwrap();
    assert_eq!(event.amount, 86_400);
}

// ---------------------------------------------------------------------------
// Registry administration
// ---------------------------------------------------------------------------

#[test]
fn price_collapse_fires_liquidation_event() {
    let (mut pool, _, _) = new_pool();
    let weight: u128 = 1_000_000_000_000_000_000;
    pool.create_collection(&admin(), "gen", weight, true).unwrap();

    let event = pool
        .set_current_price(&admin(), "gen", 400_000_000_000_000_000)
        .unwrap()
        .expect("40% of initial weight is below the 50% threshold");
    assert_eq!(event.collection, "gen");
    assert_eq!(event.old_price, weight);
    assert_eq!(event.new_price, 400_000_000_000_000_000);
    assert!(pool.collection("gen").unwrap().liquidated);
}

#[test]
fn duplicate_collection_creation_rejected() {
    let (mut pool, _, _) = new_pool();
    pool.create_collection(&admin(), "gen", 100, true).unwrap();

    let result = pool.create_collection(&admin(), "gen", 7, true);
    assert!(matches!(result, Err(PoolError::Registry(_))));
    assert_eq!(pool.collection("gen").unwrap().init_weight, 100);
}

#[test]
fn non_admin_cannot_touch_the_registry() {
    let (mut pool, _, _) = new_pool();
    pool.create_collection(&admin(), "gen", 1, true).unwrap();

    assert!(matches!(
        pool.create_collection(&alice(), "other", 1, true),
        Err(PoolError::NotAdmin)
    ));
    assert!(matches!(
        pool.set_acceptance(&alice(), "gen", false),
        Err(PoolError::NotAdmin)
    ));
    assert!(matches!(
        pool.set_current_price(&alice(), "gen", 1),
        Err(PoolError::NotAdmin)
    ));
    assert!(pool.collection("gen").unwrap().accepted);
}

// ---------------------------------------------------------------------------
// Invariants
// ---------------------------------------------------------------------------

#[test]
fn totals_match_per_account_sums_through_a_mixed_history() {
    let (mut pool, _, _) = new_pool();
    pool.create_collection(&admin(), "gen", 2, true).unwrap();
    pool.create_collection(&admin(), "rare", 9, true).unwrap();

    let check = |pool: &StakingPool<SharedMinter, SharedAssets>| {
        let sum = pool.weighted_stake(&alice()) + pool.weighted_stake(&bob());
        assert_eq!(pool.total_weighted_stake(), sum);
    };

    let (c, i) = ids("gen", &[1, 2]);
    pool.stake(&alice(), &c, &i, 0).unwrap();
    check(&pool);

    pool.stake(&bob(), &["rare".to_string()], &[1], 50).unwrap();
    check(&pool);
    assert_eq!(pool.total_items_staked(), 3);

    let (c, i) = ids("gen", &[2]);
    pool.withdraw(&alice(), &c, &i, 120).unwrap();
    check(&pool);
    assert_eq!(pool.total_items_staked(), 2);

    pool.redeem(&bob(), 200).unwrap();
    check(&pool);
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

#[test]
fn ledger_component_serialization_roundtrip() {
    use stakeledger::{AccountBook, CollectionRegistry, CustodyLedger, RewardAccumulator};

    let mut registry = CollectionRegistry::new();
    registry.create("gen", 42, true).unwrap();

    let mut custody = CustodyLedger::new();
    custody.record_deposit("gen", 7, &alice()).unwrap();

    let mut accounts = AccountBook::new();
    accounts.account_mut(&alice()).weighted_stake = 42;

    let accumulator = RewardAccumulator::new(1_000);

    let registry: CollectionRegistry =
        serde_json::from_str(&serde_json::to_string(&registry).unwrap()).unwrap();
    let custody: CustodyLedger =
        serde_json::from_str(&serde_json::to_string(&custody).unwrap()).unwrap();
    let accounts: AccountBook =
        serde_json::from_str(&serde_json::to_string(&accounts).unwrap()).unwrap();
    let restored: RewardAccumulator =
        serde_json::from_str(&serde_json::to_string(&accumulator).unwrap()).unwrap();

    assert_eq!(registry.get("gen").unwrap().init_weight, 42);
    assert_eq!(custody.holder_of("gen", 7), Some(&alice()));
    assert_eq!(accounts.get(&alice()).weighted_stake, 42);
    assert_eq!(restored, accumulator);
}
