//! Accrual rate and balance bounds
//!
//! This module provides [`RateParameters`], the policy applied on every
//! account update: how fast credit accrues and the ceiling and floor the
//! balance is clamped into.

use super::{RateBankError, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};


/// Rate and balance bounds applied on an account update
///
/// Parameters are a plain value owned by the caller. They can be a constant
/// shared by every account or looked up per call, which allows the policy to
/// change between updates of the same account.
///
/// Construction through [`RateParameters::new`] is unchecked. Bounds where
/// `min_balance > max_balance` are accepted and pin every updated balance to
/// `min_balance`. Use [`RateParameters::checked`] when the values come from
/// configuration.
///
/// # Examples
///
/// ```
/// use ratebank::RateParameters;
///
/// // 1000 bytes per second, bursts of up to 5000 bytes, up to 5000 bytes of debt
/// let params = RateParameters::new(1000.0, 5000.0, -5000.0);
/// assert_eq!(params.clamp(9000.0), 5000.0);
///
/// // Same thing, spelled symmetrically
/// assert_eq!(params, RateParameters::symmetric(1000.0, 5000.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RateParameters {
    /// Credit accrued per second of elapsed time
    pub accrual_rate: f64,
    /// Maximum balance that can ever be accrued (should be >= 0.0)
    pub max_balance: f64,
    /// Minimum balance, or maximum allowable debt (should be <= 0.0)
    pub min_balance: f64,
}

impl RateParameters {
    /// Creates parameters without validating them
    ///
    /// # Parameters
    ///
    /// - `accrual_rate`: Credit accrued per second
    /// - `max_balance`: Credit ceiling
    /// - `min_balance`: Debt floor
    pub const fn new(accrual_rate: f64, max_balance: f64, min_balance: f64) -> Self {
        RateParameters {
            accrual_rate,
            max_balance,
            min_balance,
        }
    }

    /// Creates parameters and validates them
    ///
    /// # Errors
    ///
    /// See [`RateParameters::validate`].
    ///
    /// # Example
    ///
    /// ```
    /// use ratebank::RateParameters;
    ///
    /// assert!(RateParameters::checked(1000.0, 5000.0, -5000.0).is_ok());
    /// assert!(RateParameters::checked(-1.0, 5000.0, -5000.0).is_err());
    /// ```
    pub fn checked(accrual_rate: f64, max_balance: f64, min_balance: f64) -> Result<Self> {
        let params = Self::new(accrual_rate, max_balance, min_balance);
        params.validate()?;
        Ok(params)
    }

    /// Creates parameters with a balance range of `[-limit, limit]`
    pub const fn symmetric(accrual_rate: f64, limit: f64) -> Self {
        Self::new(accrual_rate, limit, -limit)
    }

    /// Creates parameters that allow one second of burst and no debt
    ///
    /// The ceiling equals `accrual_rate`, so an idle account can spend at most
    /// one second worth of credit at once.
    ///
    /// # Example
    ///
    /// ```
    /// use ratebank::RateParameters;
    ///
    /// let params = RateParameters::per_second(250.0);
    /// assert_eq!(params.max_balance, 250.0);
    /// assert_eq!(params.min_balance, 0.0);
    /// ```
    pub const fn per_second(accrual_rate: f64) -> Self {
        Self::new(accrual_rate, accrual_rate, 0.0)
    }

    /// Checks that the parameters describe a usable policy
    ///
    /// # Errors
    ///
    /// - [`RateBankError::NonFiniteParameter`]: A value is NaN or infinite
    /// - [`RateBankError::NegativeAccrualRate`]: `accrual_rate < 0`
    /// - [`RateBankError::InvertedBounds`]: `min_balance > max_balance`
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("accrual_rate", self.accrual_rate),
            ("max_balance", self.max_balance),
            ("min_balance", self.min_balance),
        ] {
            if !value.is_finite() {
                return Err(RateBankError::NonFiniteParameter { name, value });
            }
        }

        if self.accrual_rate < 0.0 {
            return Err(RateBankError::NegativeAccrualRate(self.accrual_rate));
        }

        if self.min_balance > self.max_balance {
            return Err(RateBankError::InvertedBounds {
                min_balance: self.min_balance,
                max_balance: self.max_balance,
            });
        }

        Ok(())
    }

    /// Clamps a raw balance into `[min_balance, max_balance]`
    ///
    /// The ceiling is applied before the floor, so inverted bounds always
    /// yield `min_balance`. Unlike [`f64::clamp`] this never panics.
    #[inline]
    pub fn clamp(&self, raw: f64) -> f64 {
        self.min_balance.max(self.max_balance.min(raw))
    }

    /// Credit accrued over `elapsed` seconds, before clamping
    #[inline]
    pub fn accrued(&self, elapsed: f64) -> f64 {
        self.accrual_rate * elapsed
    }
}
