//! Per-entity account tables
//!
//! An [`AccountTable`] owns one [`RateAccount`] per rate-limited entity (a
//! multicast group, a peer address, ...). Accounts are created on first use
//! and evicted once they have been idle for longer than the configured
//! timeout, so the table tracks the live set of entities without a separate
//! expiry mechanism.
//!
//! [`ShardedAccountTable`] spreads entities over several locked tables for
//! use from multiple threads.

use super::{Admission, Clock, MonotonicClock, RateAccount, RateBankError, RateParameters, Result};
use std::borrow::Borrow;
use std::hash::Hash;
use std::marker::PhantomData;
use std::time::Duration;

#[cfg(feature = "ahash")]
use ahash::AHashMap as HashMap;
#[cfg(not(feature = "ahash"))]
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

mod sharded;
#[cfg(test)]
mod tests;

pub use sharded::ShardedAccountTable;

// Configuration constants
const DEFAULT_CAPACITY: usize = 1000;
const CAPACITY_OVERHEAD_FACTOR: f64 = 1.3;
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;
/// Largest capacity a table will pre-allocate for
pub const MAX_CAPACITY: usize = 100_000_000;
/// Largest shard count a [`ShardedAccountTable`] accepts
pub const MAX_SHARDS: usize = 65_536;

/// Table of accounts keyed by entity
///
/// The table owns its [`Clock`], so every account in it is measured against
/// the same time base. Idle accounts are swept at fixed intervals during
/// updates: once the clock passes the next scheduled sweep, every account not
/// updated within the idle timeout is dropped. An evicted entity that comes
/// back starts over from the preload balance.
///
/// The table does no locking. Use [`ShardedAccountTable`] to share accounts
/// between threads.
///
/// # Example
///
/// ```
/// use ratebank::{AccountTable, RateParameters};
/// use std::time::Duration;
///
/// let params = RateParameters::symmetric(1000.0, 5000.0);
/// let mut table: AccountTable<&str> = AccountTable::builder()
///     .capacity(10_000)
///     .idle_timeout(Duration::from_secs(300))
///     .build();
///
/// let balance = table.update("group:ff02::1", &params, 1500.0);
/// if balance < 0.0 {
///     println!("group is over its budget");
/// }
/// ```
pub struct AccountTable<K, C = MonotonicClock> {
    accounts: HashMap<K, RateAccount>,
    clock: C,
    preload: f64,
    // Seconds on `clock`
    idle_timeout: f64,
    cleanup_interval: f64,
    next_cleanup: f64,
}

/// Builder for configuring an AccountTable
///
/// # Example
///
/// ```
/// use ratebank::{AccountTable, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new(0.0);
/// let table: AccountTable<u64, ManualClock> = AccountTable::builder()
///     .capacity(100_000)
///     .preload(2048.0)
///     .idle_timeout(Duration::from_secs(120))
///     .cleanup_interval(Duration::from_secs(30))
///     .clock(clock)
///     .build();
/// assert!(table.is_empty());
/// ```
pub struct AccountTableBuilder<K, C = MonotonicClock> {
    settings: Settings,
    clock: C,
    _key: PhantomData<fn() -> K>,
}

#[derive(Debug, Clone, Copy)]
struct Settings {
    capacity: usize,
    preload: f64,
    idle_timeout: Duration,
    cleanup_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            capacity: DEFAULT_CAPACITY,
            preload: 0.0,
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
        }
    }
}

/// Serializable table configuration
///
/// All fields have defaults, so a partial document is enough. With the
/// `serde` feature this can be loaded from any serde format.
///
/// # Example
///
/// ```
/// use ratebank::{AccountTable, ManualClock, TableConfig};
///
/// let config = TableConfig {
///     capacity: 50_000,
///     preload: 1024.0,
///     ..TableConfig::default()
/// };
/// let table: AccountTable<String, ManualClock> =
///     AccountTable::from_config(&config, ManualClock::new(0.0)).unwrap();
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct TableConfig {
    /// Expected number of tracked entities, at most [`MAX_CAPACITY`]
    pub capacity: usize,
    /// Starting balance of newly seen entities
    pub preload: f64,
    /// Seconds without an update before an entity is evicted
    pub idle_timeout_secs: f64,
    /// Seconds between idle sweeps
    pub cleanup_interval_secs: f64,
    /// Shard count for [`ShardedAccountTable`] (None picks one from the CPU count)
    pub shards: Option<usize>,
}

impl Default for TableConfig {
    fn default() -> Self {
        TableConfig {
            capacity: DEFAULT_CAPACITY,
            preload: 0.0,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS as f64,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS as f64,
            shards: None,
        }
    }
}

impl TableConfig {
    /// Check the configuration
    ///
    /// # Errors
    ///
    /// Returns [`RateBankError::InvalidConfig`] if the capacity is above
    /// [`MAX_CAPACITY`], the preload is not finite, the idle timeout is not
    /// positive, the cleanup interval is negative or not finite, or the shard
    /// count is zero or above [`MAX_SHARDS`].
    pub fn validate(&self) -> Result<()> {
        if self.capacity > MAX_CAPACITY {
            return Err(RateBankError::InvalidConfig(format!(
                "capacity must be at most {MAX_CAPACITY}, got {}",
                self.capacity
            )));
        }

        if !self.preload.is_finite() {
            return Err(RateBankError::InvalidConfig(format!(
                "preload must be finite, got {}",
                self.preload
            )));
        }

        // Infinity is allowed and disables eviction
        if self.idle_timeout_secs.is_nan() || self.idle_timeout_secs <= 0.0 {
            return Err(RateBankError::InvalidConfig(format!(
                "idle_timeout_secs must be positive, got {}",
                self.idle_timeout_secs
            )));
        }

        if !self.cleanup_interval_secs.is_finite() || self.cleanup_interval_secs < 0.0 {
            return Err(RateBankError::InvalidConfig(format!(
                "cleanup_interval_secs must be a non-negative number, got {}",
                self.cleanup_interval_secs
            )));
        }

        match self.shards {
            Some(0) => {
                return Err(RateBankError::InvalidConfig(
                    "shards must be greater than 0".into(),
                ));
            }
            Some(shards) if shards > MAX_SHARDS => {
                return Err(RateBankError::InvalidConfig(format!(
                    "shards must be at most {MAX_SHARDS}, got {shards}"
                )));
            }
            _ => {}
        }

        Ok(())
    }

    fn settings(&self) -> Settings {
        Settings {
            capacity: self.capacity,
            preload: self.preload,
            // Out-of-range values saturate, infinity included
            idle_timeout: Duration::try_from_secs_f64(self.idle_timeout_secs)
                .unwrap_or(Duration::MAX),
            cleanup_interval: Duration::try_from_secs_f64(self.cleanup_interval_secs)
                .unwrap_or(Duration::MAX),
        }
    }
}

impl<K: Hash + Eq> AccountTable<K, MonotonicClock> {
    /// Create a table with default configuration and a monotonic clock
    ///
    /// Uses a capacity of 1000 entities, a 600 second idle timeout and a
    /// cleanup interval of 60 seconds.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a new builder for configuring an AccountTable
    pub fn builder() -> AccountTableBuilder<K, MonotonicClock> {
        AccountTableBuilder::new()
    }
}

impl<K: Hash + Eq> Default for AccountTable<K, MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq, C: Clock> AccountTable<K, C> {
    /// Build a table from a [`TableConfig`]
    ///
    /// # Errors
    ///
    /// Returns the error from [`TableConfig::validate`].
    pub fn from_config(config: &TableConfig, clock: C) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_settings(config.settings(), clock))
    }

    fn with_settings(settings: Settings, clock: C) -> Self {
        let cleanup_interval = settings.cleanup_interval.as_secs_f64();
        let next_cleanup = clock.now() + cleanup_interval;
        AccountTable {
            // Pre-allocate with overhead to avoid rehashing
            accounts: HashMap::with_capacity(
                (settings.capacity.min(MAX_CAPACITY) as f64 * CAPACITY_OVERHEAD_FACTOR) as usize,
            ),
            clock,
            preload: settings.preload,
            idle_timeout: settings.idle_timeout.as_secs_f64(),
            cleanup_interval,
            next_cleanup,
        }
    }

    /// Accrue and debit the account for `key`
    ///
    /// An entity seen for the first time gets an account holding the
    /// configured preload as of now, and the debit applies to it right away.
    /// Returns the new balance.
    pub fn update(&mut self, key: K, params: &RateParameters, debit: f64) -> f64 {
        let now = self.clock.now();
        self.maybe_evict_idle(now);
        self.account_at(key, now).update_at(params, debit, now)
    }

    /// Debit `cost` from the account for `key` if it stays at or above `threshold`
    ///
    /// See [`RateAccount::admit`].
    pub fn admit(
        &mut self,
        key: K,
        params: &RateParameters,
        cost: f64,
        threshold: f64,
    ) -> Admission {
        let now = self.clock.now();
        self.maybe_evict_idle(now);
        self.account_at(key, now)
            .admit_at(params, cost, threshold, now)
    }

    fn account_at(&mut self, key: K, now: f64) -> &mut RateAccount {
        let preload = self.preload;
        self.accounts.entry(key).or_insert_with(|| {
            tracing::trace!(preload, "opening account");
            RateAccount::with_preload_at(preload, now)
        })
    }

    /// Balance stored for `key` as of its last update, without accruing
    pub fn balance<Q>(&self, key: &Q) -> Option<f64>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.accounts.get(key).map(RateAccount::balance)
    }

    /// The account for `key`, if tracked
    pub fn get<Q>(&self, key: &Q) -> Option<&RateAccount>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.accounts.get(key)
    }

    /// Stop tracking `key`, returning its account
    pub fn remove<Q>(&mut self, key: &Q) -> Option<RateAccount>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = self.accounts.remove(key);
        if removed.is_some() {
            tracing::trace!("closed account");
        }
        removed
    }

    /// Sweep idle accounts now, returning how many were evicted
    pub fn evict_idle(&mut self) -> usize {
        let now = self.clock.now();
        self.evict_idle_at(now)
    }

    /// Drop every account
    pub fn clear(&mut self) {
        self.accounts.clear();
    }

    /// Number of tracked entities
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Iterate over tracked entities and their accounts
    pub fn iter(&self) -> impl Iterator<Item = (&K, &RateAccount)> {
        self.accounts.iter()
    }

    /// The table's time source
    pub fn clock(&self) -> &C {
        &self.clock
    }

    fn maybe_evict_idle(&mut self, now: f64) {
        // Clean periodically based on time
        if now >= self.next_cleanup {
            self.evict_idle_at(now);
        }
    }

    fn evict_idle_at(&mut self, now: f64) -> usize {
        let before = self.accounts.len();
        let idle_timeout = self.idle_timeout;
        self.accounts
            .retain(|_, account| now - account.last_update() < idle_timeout);
        let evicted = before - self.accounts.len();
        self.next_cleanup = now + self.cleanup_interval;

        tracing::debug!(
            evicted,
            remaining = self.accounts.len(),
            "swept idle accounts"
        );
        evicted
    }
}

impl<K> AccountTableBuilder<K, MonotonicClock> {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        AccountTableBuilder {
            settings: Settings::default(),
            clock: MonotonicClock::new(),
            _key: PhantomData,
        }
    }
}

impl<K> Default for AccountTableBuilder<K, MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, C> AccountTableBuilder<K, C> {
    /// Set the expected capacity (number of tracked entities)
    ///
    /// The table will allocate 30% more space to reduce hash collisions.
    /// Capacities above [`MAX_CAPACITY`] pre-allocate for [`MAX_CAPACITY`].
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.settings.capacity = capacity;
        self
    }

    /// Set the starting balance of newly seen entities
    pub fn preload(mut self, preload: f64) -> Self {
        self.settings.preload = preload;
        self
    }

    /// Set how long an entity may go without updates before eviction
    ///
    /// `Duration::MAX` effectively disables eviction.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.settings.idle_timeout = timeout;
        self
    }

    /// Set the interval between idle sweeps
    ///
    /// Shorter intervals keep memory tighter but scan the table more often.
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.settings.cleanup_interval = interval;
        self
    }

    /// Use a different time source
    pub fn clock<D: Clock>(self, clock: D) -> AccountTableBuilder<K, D> {
        AccountTableBuilder {
            settings: self.settings,
            clock,
            _key: PhantomData,
        }
    }
}

impl<K: Hash + Eq, C: Clock> AccountTableBuilder<K, C> {
    /// Build the AccountTable with the configured settings
    pub fn build(self) -> AccountTable<K, C> {
        AccountTable::with_settings(self.settings, self.clock)
    }

    /// Build a [`ShardedAccountTable`] with `shards` tables sharing this clock
    ///
    /// The capacity is split evenly across shards.
    ///
    /// # Errors
    ///
    /// Returns [`RateBankError::InvalidConfig`] if `shards` is zero or above
    /// [`MAX_SHARDS`].
    pub fn build_sharded(self, shards: usize) -> Result<ShardedAccountTable<K, C>> {
        ShardedAccountTable::with_settings(self.settings, self.clock, shards)
    }
}
