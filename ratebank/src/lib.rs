//! # ratebank
//!
//! Bank-account traffic accounting for Rust.
//!
//! ## Overview
//!
//! Each rate-limited entity (a multicast group, a peer, a tenant) owns a
//! balance. The balance accrues credit at a fixed rate per second and every
//! admitted unit of traffic is debited from it. The balance is clamped
//! between a credit ceiling and a debt floor:
//!
//! - **Bursts**: a sender that has been quiet can spend saved credit at once
//! - **Long-run average**: the accrual rate bounds sustained throughput
//! - **Bounded memory of the past**: credit can't be hoarded beyond the
//!   ceiling, and debt can't grow beyond the floor, so a sender that goes
//!   quiet and comes back is neither blacklisted forever nor owed a backlog
//!
//! The library never decides for you. [`RateAccount::update`] returns the new
//! balance and the caller chooses what to do with it.
//!
//! ## Quick Start
//!
//! ```
//! use ratebank::{MonotonicClock, RateAccount, RateParameters};
//!
//! let clock = MonotonicClock::new();
//!
//! // 1000 bytes per second, up to 5000 bytes of burst, up to 5000 bytes of debt
//! let params = RateParameters::new(1000.0, 5000.0, -5000.0);
//! let mut account = RateAccount::with_preload(0.0, &clock);
//!
//! let packet_len = 1200.0;
//! if account.update(&params, packet_len, &clock) >= 0.0 {
//!     println!("forward packet");
//! } else {
//!     println!("drop packet");
//! }
//! ```
//!
//! ## Time Sources
//!
//! Elapsed time comes from a [`Clock`]:
//!
//! - [`MonotonicClock`]: seconds since creation, never goes backwards (default)
//! - [`SystemClock`]: seconds since the Unix epoch
//! - [`ManualClock`]: driven by hand, for tests and simulations
//! - [`FnClock`]: any `Fn() -> f64`
//!
//! Every operation also has an `_at` variant taking the current time
//! directly.
//!
//! ```
//! use ratebank::{ManualClock, RateAccount, RateParameters};
//!
//! let clock = ManualClock::new(0.0);
//! let params = RateParameters::symmetric(1000.0, 5000.0);
//! let mut account = RateAccount::with_preload(0.0, &clock);
//!
//! account.update(&params, 1000.0, &clock);
//! clock.advance(2.0);
//! assert_eq!(account.update(&params, 0.0, &clock), 1000.0);
//! ```
//!
//! ## Tracking Many Entities
//!
//! ### [`AccountTable`]
//! Maps entity keys to accounts, creating them on first sight and evicting
//! them after a period of inactivity.
//!
//! ```
//! use ratebank::{AccountTable, RateParameters};
//! use std::time::Duration;
//!
//! let params = RateParameters::symmetric(1000.0, 5000.0);
//! let mut table: AccountTable<u64> = AccountTable::builder()
//!     .capacity(100_000)
//!     .idle_timeout(Duration::from_secs(300))
//!     .build();
//!
//! let decision = table.admit(0xff02_0001, &params, 1400.0, -5000.0);
//! assert!(decision.admitted);
//! ```
//!
//! ### [`ShardedAccountTable`]
//! The same, split across independently locked shards for use from many
//! threads.
//!
//! ```
//! use ratebank::{AccountTable, ShardedAccountTable};
//!
//! let table: ShardedAccountTable<String> = AccountTable::builder()
//!     .capacity(1_000_000)
//!     .build_sharded(64)?;
//! # Ok::<(), ratebank::RateBankError>(())
//! ```
//!
//! ## Thread Safety
//!
//! [`RateAccount`] and [`AccountTable`] do no locking; their mutating methods
//! take `&mut self`. Wrap them in a mutex or use [`ShardedAccountTable`] for
//! concurrent access.
//!
//! ## Features
//!
//! - `ahash` (default): Use AHash for faster hashing in account tables
//! - `serde`: Derive `Serialize`/`Deserialize` for [`RateParameters`] and
//!   [`TableConfig`]

pub mod core;

pub use crate::core::{
    AccountTable, AccountTableBuilder, Admission, Clock, FnClock, MAX_CAPACITY, MAX_SHARDS,
    ManualClock, MonotonicClock, RateAccount, RateBankError, RateParameters, Result,
    ShardedAccountTable, SystemClock, TableConfig,
};
