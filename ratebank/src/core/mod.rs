//! Core components of the ratebank accounting library
//!
//! This module contains the fundamental building blocks:
//! - [`clock`]: Time sources used to measure elapsed time between updates
//! - [`rate`]: Accrual rate and balance bounds
//! - [`account`]: The bank-account balance and its update function
//! - [`table`]: Per-entity account tables with idle eviction

pub mod account;
pub mod clock;
pub mod rate;
pub mod table;

pub use account::{Admission, RateAccount};
pub use clock::{Clock, FnClock, ManualClock, MonotonicClock, SystemClock};
pub use rate::RateParameters;
pub use table::{
    AccountTable, AccountTableBuilder, MAX_CAPACITY, MAX_SHARDS, ShardedAccountTable, TableConfig,
};

use thiserror::Error;

/// Errors reported when validating parameters or configuration
///
/// The accounting operations themselves never fail. These errors only come
/// out of the opt-in validation paths such as [`RateParameters::checked`] and
/// [`TableConfig::validate`].
///
/// # Example
///
/// ```
/// use ratebank::{RateBankError, RateParameters};
///
/// match RateParameters::checked(1000.0, -10.0, 10.0) {
///     Err(RateBankError::InvertedBounds { min_balance, max_balance }) => {
///         println!("floor {min_balance} is above ceiling {max_balance}");
///     }
///     _ => {}
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RateBankError {
    /// A parameter was NaN or infinite
    #[error("parameter {name} is not finite: {value}")]
    NonFiniteParameter { name: &'static str, value: f64 },

    /// The accrual rate was below zero
    #[error("negative accrual rate: {0}")]
    NegativeAccrualRate(f64),

    /// The debt floor was above the credit ceiling
    #[error("min balance {min_balance} is greater than max balance {max_balance}")]
    InvertedBounds { min_balance: f64, max_balance: f64 },

    /// A table configuration value was out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, RateBankError>;
