use super::{AccountTable, MAX_SHARDS, Settings, TableConfig};
use crate::core::{
    Admission, Clock, MonotonicClock, RateAccount, RateBankError, RateParameters, Result,
};
use parking_lot::Mutex;
use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};
use std::num::NonZeroUsize;
use std::sync::Arc;

#[cfg(feature = "ahash")]
use ahash::RandomState;
#[cfg(not(feature = "ahash"))]
use std::collections::hash_map::RandomState;

/// Sharded account table for concurrent access
///
/// Entities are partitioned across several [`AccountTable`]s, each behind its
/// own lock, so updates for different entities rarely contend. Updates for
/// the same entity always land on the same shard and are serialized by its
/// lock. All shards share one clock.
///
/// # Example
///
/// ```
/// use ratebank::{RateParameters, ShardedAccountTable};
/// use std::sync::Arc;
/// use std::thread;
///
/// let params = RateParameters::symmetric(10_000.0, 50_000.0);
/// let table: Arc<ShardedAccountTable<u32>> = Arc::new(ShardedAccountTable::new());
///
/// let handles: Vec<_> = (0..4u32)
///     .map(|peer| {
///         let table = Arc::clone(&table);
///         thread::spawn(move || table.update(peer, &params, 1500.0))
///     })
///     .collect();
///
/// for handle in handles {
///     handle.join().unwrap();
/// }
/// assert_eq!(table.len(), 4);
/// ```
pub struct ShardedAccountTable<K, C = MonotonicClock> {
    shards: Box<[Mutex<AccountTable<K, Arc<C>>>]>,
    hasher: RandomState,
    clock: Arc<C>,
}

impl<K: Hash + Eq> ShardedAccountTable<K, MonotonicClock> {
    /// Create a sharded table with default settings
    ///
    /// Uses four shards per available CPU core, up to [`MAX_SHARDS`].
    pub fn new() -> Self {
        Self::from_parts(Settings::default(), MonotonicClock::new(), default_shard_count())
    }
}

impl<K: Hash + Eq> Default for ShardedAccountTable<K, MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq, C: Clock> ShardedAccountTable<K, C> {
    /// Build a sharded table from a [`TableConfig`]
    ///
    /// # Errors
    ///
    /// Returns the error from [`TableConfig::validate`].
    pub fn from_config(config: &TableConfig, clock: C) -> Result<Self> {
        config.validate()?;
        match config.shards {
            Some(shards) => Self::with_settings(config.settings(), clock, shards),
            None => Ok(Self::from_parts(config.settings(), clock, default_shard_count())),
        }
    }

    pub(super) fn with_settings(settings: Settings, clock: C, shard_count: usize) -> Result<Self> {
        if shard_count > MAX_SHARDS {
            return Err(RateBankError::InvalidConfig(format!(
                "shard count must be at most {MAX_SHARDS}, got {shard_count}"
            )));
        }
        let shard_count = NonZeroUsize::new(shard_count).ok_or_else(|| {
            RateBankError::InvalidConfig("shard count must be greater than 0".into())
        })?;
        Ok(Self::from_parts(settings, clock, shard_count))
    }

    fn from_parts(settings: Settings, clock: C, shard_count: NonZeroUsize) -> Self {
        let shard_count = shard_count.get().min(MAX_SHARDS);
        let clock = Arc::new(clock);
        let per_shard = Settings {
            capacity: settings.capacity.div_ceil(shard_count),
            ..settings
        };
        let shards = (0..shard_count)
            .map(|_| Mutex::new(AccountTable::with_settings(per_shard, Arc::clone(&clock))))
            .collect();

        tracing::debug!(shard_count, "created sharded account table");

        ShardedAccountTable {
            shards,
            hasher: RandomState::new(),
            clock,
        }
    }

    fn shard<Q>(&self, key: &Q) -> &Mutex<AccountTable<K, Arc<C>>>
    where
        Q: Hash + ?Sized,
    {
        let index = (BuildHasher::hash_one(&self.hasher, key) as usize) % self.shards.len();
        &self.shards[index]
    }

    /// Accrue and debit the account for `key`
    ///
    /// See [`AccountTable::update`].
    pub fn update(&self, key: K, params: &RateParameters, debit: f64) -> f64 {
        self.shard(&key).lock().update(key, params, debit)
    }

    /// Debit `cost` from the account for `key` if it stays at or above `threshold`
    ///
    /// The check and the debit happen under one lock acquisition.
    pub fn admit(&self, key: K, params: &RateParameters, cost: f64, threshold: f64) -> Admission {
        self.shard(&key)
            .lock()
            .admit(key, params, cost, threshold)
    }

    /// Balance stored for `key` as of its last update, without accruing
    pub fn balance<Q>(&self, key: &Q) -> Option<f64>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard(key).lock().balance(key)
    }

    /// A copy of the account for `key`, if tracked
    pub fn get<Q>(&self, key: &Q) -> Option<RateAccount>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard(key).lock().get(key).copied()
    }

    /// Stop tracking `key`, returning its account
    pub fn remove<Q>(&self, key: &Q) -> Option<RateAccount>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shard(key).lock().remove(key)
    }

    /// Sweep idle accounts in every shard, returning how many were evicted
    pub fn evict_idle(&self) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().evict_idle())
            .sum()
    }

    /// Drop every account
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.lock().clear();
        }
    }

    /// Number of tracked entities across all shards
    ///
    /// Shards are locked one at a time, so the count is not a snapshot while
    /// other threads are updating.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.lock().is_empty())
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// The shared time source
    pub fn clock(&self) -> &C {
        &self.clock
    }
}

const SHARDS_PER_CORE: NonZeroUsize = NonZeroUsize::MIN.saturating_add(3);

fn default_shard_count() -> NonZeroUsize {
    // 4x CPU cores for better distribution
    std::thread::available_parallelism()
        .unwrap_or(NonZeroUsize::MIN)
        .saturating_mul(SHARDS_PER_CORE)
}
