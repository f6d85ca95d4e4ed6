use super::{AccountTable, MAX_CAPACITY, MAX_SHARDS, ShardedAccountTable, TableConfig};
use crate::core::{Clock, ManualClock, RateBankError, RateParameters};
use std::time::Duration;

fn params() -> RateParameters {
    RateParameters::symmetric(1000.0, 5000.0)
}

fn manual_table(clock: &ManualClock) -> AccountTable<String, ManualClock> {
    AccountTable::builder()
        .capacity(64)
        .idle_timeout(Duration::from_secs(10))
        .cleanup_interval(Duration::from_secs(5))
        .clock(clock.clone())
        .build()
}

#[test]
fn test_first_update_creates_account_with_preload() {
    let clock = ManualClock::new(0.0);
    let mut table: AccountTable<&str, ManualClock> = AccountTable::builder()
        .preload(2000.0)
        .clock(clock.clone())
        .build();

    assert!(table.is_empty());
    assert_eq!(table.update("group:1", &params(), 500.0), 1500.0);
    assert_eq!(table.len(), 1);
    assert_eq!(table.balance("group:1"), Some(1500.0));
    assert_eq!(table.get("group:1").map(|a| a.last_update()), Some(0.0));
}

#[test]
fn test_entities_are_independent() {
    let clock = ManualClock::new(0.0);
    let mut table = manual_table(&clock);

    table.update("a".to_string(), &params(), 4000.0);
    table.update("b".to_string(), &params(), 100.0);

    clock.advance(1.0);
    assert_eq!(table.update("a".to_string(), &params(), 0.0), -3000.0);
    assert_eq!(table.update("b".to_string(), &params(), 0.0), 900.0);
    assert_eq!(table.balance("missing"), None);
}

#[test]
fn test_balance_does_not_accrue() {
    let clock = ManualClock::new(0.0);
    let mut table = manual_table(&clock);

    table.update("peer".to_string(), &params(), 1000.0);
    clock.advance(3.0);
    assert_eq!(table.balance("peer"), Some(-1000.0));
}

#[test]
fn test_admit_through_table() {
    let clock = ManualClock::new(0.0);
    let mut table = manual_table(&clock);
    let params = RateParameters::new(100.0, 300.0, 0.0);

    // New accounts start empty, so the first packet waits for credit
    let result = table.admit("peer".to_string(), &params, 150.0, 0.0);
    assert!(!result.admitted);
    assert_eq!(result.shortfall, 150.0);

    clock.advance(2.0);
    let result = table.admit("peer".to_string(), &params, 150.0, 0.0);
    assert!(result.admitted);
    assert_eq!(result.balance, 50.0);
}

#[test]
fn test_idle_accounts_evicted_on_sweep() {
    let clock = ManualClock::new(0.0);
    let mut table = manual_table(&clock);

    for i in 0..100 {
        table.update(format!("key_{i}"), &params(), 10.0);
    }
    assert_eq!(table.len(), 100);

    // Keep one entity active
    clock.advance(8.0);
    table.update("key_7".to_string(), &params(), 0.0);

    // Past the idle timeout for everyone else, and past the next sweep
    clock.advance(6.0);
    table.update("trigger".to_string(), &params(), 0.0);

    assert_eq!(table.len(), 2);
    assert!(table.get("key_7").is_some());
    assert!(table.get("trigger").is_some());
    assert!(table.get("key_0").is_none());
}

#[test]
fn test_no_sweep_before_interval() {
    let clock = ManualClock::new(0.0);
    let mut table: AccountTable<u32, ManualClock> = AccountTable::builder()
        .idle_timeout(Duration::from_secs(1))
        .cleanup_interval(Duration::from_secs(60))
        .clock(clock.clone())
        .build();

    table.update(1, &params(), 0.0);
    clock.advance(30.0);
    table.update(2, &params(), 0.0);

    // Idle, but not swept yet
    assert_eq!(table.len(), 2);

    clock.advance(31.0);
    table.update(3, &params(), 0.0);
    assert_eq!(table.len(), 1);
}

#[test]
fn test_evict_idle_runs_immediately() {
    let clock = ManualClock::new(0.0);
    let mut table = manual_table(&clock);

    table.update("old".to_string(), &params(), 0.0);
    clock.advance(4.0);
    table.update("new".to_string(), &params(), 0.0);

    // Before the next scheduled sweep
    clock.advance(7.0);

    assert_eq!(table.evict_idle(), 1);
    assert_eq!(table.len(), 1);
    assert_eq!(table.evict_idle(), 0);
}

#[test]
fn test_evicted_entity_restarts_from_preload() {
    let clock = ManualClock::new(0.0);
    let mut table: AccountTable<u64, ManualClock> = AccountTable::builder()
        .preload(100.0)
        .idle_timeout(Duration::from_secs(10))
        .clock(clock.clone())
        .build();

    table.update(42, &params(), 5000.0);
    clock.advance(11.0);
    assert_eq!(table.evict_idle(), 1);

    assert_eq!(table.update(42, &params(), 0.0), 100.0);
}

#[test]
fn test_remove_and_clear() {
    let clock = ManualClock::new(0.0);
    let mut table = manual_table(&clock);

    table.update("a".to_string(), &params(), 10.0);
    table.update("b".to_string(), &params(), 20.0);

    let removed = table.remove("a").unwrap();
    assert_eq!(removed.balance(), -10.0);
    assert!(table.remove("a").is_none());
    assert_eq!(table.len(), 1);

    table.clear();
    assert!(table.is_empty());
}

#[test]
fn test_iter_visits_every_account() {
    let clock = ManualClock::new(0.0);
    let mut table = manual_table(&clock);

    for i in 0..5 {
        table.update(format!("k{i}"), &params(), i as f64);
    }

    let total: f64 = table.iter().map(|(_, account)| account.balance()).sum();
    assert_eq!(total, -10.0);
}

#[test]
fn test_default_table_uses_monotonic_clock() {
    let mut table: AccountTable<u8> = AccountTable::new();
    let balance = table.update(1, &params(), 100.0);
    assert!((-100.0..-99.0).contains(&balance));
    assert!(table.clock().now() >= 0.0);
}

#[test]
fn test_from_config() {
    let clock = ManualClock::new(0.0);
    let config = TableConfig {
        preload: 750.0,
        idle_timeout_secs: 2.0,
        cleanup_interval_secs: 1.0,
        ..TableConfig::default()
    };
    let mut table: AccountTable<u16, ManualClock> =
        AccountTable::from_config(&config, clock.clone()).unwrap();

    assert_eq!(table.update(7, &params(), 0.0), 750.0);
    clock.advance(2.5);
    table.update(8, &params(), 0.0);
    assert!(table.get(&7).is_none());
}

#[test]
fn test_config_validation() {
    let ok = TableConfig::default();
    assert!(ok.validate().is_ok());

    let never_evict = TableConfig {
        idle_timeout_secs: f64::INFINITY,
        ..TableConfig::default()
    };
    assert!(never_evict.validate().is_ok());

    for bad in [
        TableConfig {
            preload: f64::NAN,
            ..TableConfig::default()
        },
        TableConfig {
            idle_timeout_secs: 0.0,
            ..TableConfig::default()
        },
        TableConfig {
            cleanup_interval_secs: -1.0,
            ..TableConfig::default()
        },
        TableConfig {
            shards: Some(0),
            ..TableConfig::default()
        },
        TableConfig {
            capacity: usize::MAX,
            ..TableConfig::default()
        },
        TableConfig {
            capacity: MAX_CAPACITY + 1,
            ..TableConfig::default()
        },
        TableConfig {
            shards: Some(usize::MAX),
            ..TableConfig::default()
        },
    ] {
        assert!(matches!(
            bad.validate(),
            Err(RateBankError::InvalidConfig(_))
        ));
        assert!(AccountTable::<u8, ManualClock>::from_config(&bad, ManualClock::new(0.0)).is_err());
        assert!(
            ShardedAccountTable::<u8, ManualClock>::from_config(&bad, ManualClock::new(0.0))
                .is_err()
        );
    }

    let largest = TableConfig {
        capacity: MAX_CAPACITY,
        shards: Some(MAX_SHARDS),
        ..TableConfig::default()
    };
    assert!(largest.validate().is_ok());
}

#[test]
fn test_builder_caps_oversized_capacity() {
    let clock = ManualClock::new(0.0);
    let mut table: AccountTable<u32, ManualClock> = AccountTable::builder()
        .capacity(usize::MAX)
        .clock(clock.clone())
        .build();

    assert_eq!(table.update(7, &params(), 100.0), -100.0);
    clock.advance(1.0);
    assert_eq!(table.update(7, &params(), 0.0), 900.0);
    assert_eq!(table.len(), 1);
}

#[test]
fn test_infinite_idle_timeout_never_evicts() {
    let clock = ManualClock::new(0.0);
    let config = TableConfig {
        idle_timeout_secs: f64::INFINITY,
        cleanup_interval_secs: 1.0,
        ..TableConfig::default()
    };
    let mut table: AccountTable<u8, ManualClock> =
        AccountTable::from_config(&config, clock.clone()).unwrap();

    table.update(1, &params(), 0.0);
    clock.advance(1e9);
    table.update(2, &params(), 0.0);
    assert_eq!(table.len(), 2);
}

#[cfg(feature = "serde")]
#[test]
fn test_partial_config_from_json() {
    let config: TableConfig =
        serde_json::from_str(r#"{"capacity": 4096, "idle_timeout_secs": 30.0}"#).unwrap();
    assert_eq!(config.capacity, 4096);
    assert_eq!(config.idle_timeout_secs, 30.0);
    assert_eq!(config.cleanup_interval_secs, 60.0);
    assert_eq!(config.shards, None);
}

#[test]
fn test_sharded_table_basic_operations() {
    let clock = ManualClock::new(0.0);
    let table: ShardedAccountTable<String, ManualClock> = AccountTable::builder()
        .capacity(1000)
        .idle_timeout(Duration::from_secs(10))
        .clock(clock.clone())
        .build_sharded(8)
        .unwrap();

    assert_eq!(table.shard_count(), 8);
    assert!(table.is_empty());

    for i in 0..50 {
        table.update(format!("peer:{i}"), &params(), 100.0);
    }
    assert_eq!(table.len(), 50);
    assert_eq!(table.balance("peer:3"), Some(-100.0));

    clock.advance(1.0);
    assert_eq!(table.update("peer:3".to_string(), &params(), 0.0), 900.0);
    assert_eq!(table.get("peer:3").map(|a| a.last_update()), Some(1.0));

    assert_eq!(table.remove("peer:3").map(|a| a.balance()), Some(900.0));
    assert_eq!(table.len(), 49);

    clock.advance(10.0);
    assert_eq!(table.evict_idle(), 49);
    assert!(table.is_empty());
}

#[test]
fn test_sharded_admit_and_clear() {
    let clock = ManualClock::new(0.0);
    let table: ShardedAccountTable<u32, ManualClock> = AccountTable::builder()
        .preload(1000.0)
        .clock(clock.clone())
        .build_sharded(2)
        .unwrap();
    let params = RateParameters::new(10.0, 1000.0, 0.0);

    assert!(table.admit(1, &params, 600.0, 0.0).admitted);
    let second = table.admit(1, &params, 600.0, 0.0);
    assert!(!second.admitted);
    assert_eq!(second.balance, 400.0);

    table.clear();
    assert!(table.is_empty());
    assert_eq!(table.clock().now(), 0.0);
}

#[test]
fn test_sharded_rejects_zero_shards() {
    let result: Result<ShardedAccountTable<u32>, _> = AccountTable::builder().build_sharded(0);
    assert!(matches!(result, Err(RateBankError::InvalidConfig(_))));
}

#[test]
fn test_sharded_rejects_too_many_shards() {
    let result: Result<ShardedAccountTable<u32>, _> =
        AccountTable::builder().build_sharded(usize::MAX);
    assert!(matches!(result, Err(RateBankError::InvalidConfig(_))));

    let result: Result<ShardedAccountTable<u32>, _> =
        AccountTable::builder().build_sharded(MAX_SHARDS + 1);
    assert!(matches!(result, Err(RateBankError::InvalidConfig(_))));
}

#[test]
fn test_sharded_from_config() {
    let config = TableConfig {
        shards: Some(3),
        ..TableConfig::default()
    };
    let table: ShardedAccountTable<u32, ManualClock> =
        ShardedAccountTable::from_config(&config, ManualClock::new(0.0)).unwrap();
    assert_eq!(table.shard_count(), 3);

    let auto: ShardedAccountTable<u32, ManualClock> =
        ShardedAccountTable::from_config(&TableConfig::default(), ManualClock::new(0.0)).unwrap();
    assert!(auto.shard_count() >= 4);
}
