//! Bank-account balance with time-based accrual
//!
//! This module provides [`RateAccount`], the per-entity accounting primitive.
//! Each unit of admitted traffic is debited from a balance that accrues
//! credit at a configurable rate. Debt is possible down to a floor.
//!
//! The bank account model permits bursts: a sender that has been quiet can
//! spend accumulated credit at once, while the accrual rate still bounds the
//! long-run average throughput.

use super::{Clock, RateParameters};

/// Outcome of an admission check
///
/// Returned by [`RateAccount::admit`] and the table equivalents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Admission {
    /// Whether the unit of work was admitted and its cost debited
    pub admitted: bool,
    /// Balance after the check (post-debit if admitted)
    pub balance: f64,
    /// Credit missing to admit the unit (0.0 if admitted)
    pub shortfall: f64,
}

/// Data transfer account with a clamped balance
///
/// Holds a balance and the clock reading of the last update. Every
/// [`update`](RateAccount::update) adds `accrual_rate * elapsed`, subtracts
/// the debit and clamps the result into the parameter bounds.
///
/// The account does no locking. Updates on one account must happen in
/// sequence, which `&mut self` enforces; wrap it in a mutex or use a
/// [`ShardedAccountTable`](crate::ShardedAccountTable) to share it across
/// threads.
///
/// # Example
///
/// ```
/// use ratebank::{ManualClock, RateAccount, RateParameters};
///
/// let clock = ManualClock::new(0.0);
/// let params = RateParameters::symmetric(1000.0, 5000.0);
/// let mut account = RateAccount::with_preload(0.0, &clock);
///
/// assert_eq!(account.update(&params, 1000.0, &clock), -1000.0);
///
/// clock.advance(2.0);
/// assert_eq!(account.update(&params, 0.0, &clock), 1000.0);
///
/// // Debt is capped at the floor
/// assert_eq!(account.update(&params, 10_000.0, &clock), -5000.0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateAccount {
    balance: f64,
    last_update: f64,
}

impl RateAccount {
    /// Create an unseeded account
    ///
    /// [`init`](RateAccount::init) must be called before the first update,
    /// otherwise the first update accrues credit for the whole time since the
    /// clock's origin.
    pub const fn new() -> Self {
        RateAccount {
            balance: 0.0,
            last_update: 0.0,
        }
    }

    /// Create an account holding `preload` as of the clock's current time
    pub fn with_preload(preload: f64, clock: &impl Clock) -> Self {
        Self::with_preload_at(preload, clock.now())
    }

    /// Create an account holding `preload` as of `now`
    pub const fn with_preload_at(preload: f64, now: f64) -> Self {
        RateAccount {
            balance: preload,
            last_update: now,
        }
    }

    /// Initialize or re-initialize the account
    ///
    /// The preload is stored as-is, even outside the bounds used by later
    /// updates.
    pub fn init(&mut self, preload: f64, clock: &impl Clock) {
        self.init_at(preload, clock.now());
    }

    /// Initialize or re-initialize the account as of `now`
    pub fn init_at(&mut self, preload: f64, now: f64) {
        self.last_update = now;
        self.balance = preload;
    }

    /// Update the balance from the clock and deduct `debit`
    ///
    /// Pass `0.0` to accrue without charging anything. Returns the new
    /// balance, which lies in `[min_balance, max_balance]` when the bounds
    /// are ordered.
    #[inline]
    pub fn update(&mut self, params: &RateParameters, debit: f64, clock: &impl Clock) -> f64 {
        self.update_at(params, debit, clock.now())
    }

    /// Update the balance as of `now` and deduct `debit`
    ///
    /// Elapsed time is `now` minus the previous update time. It is not
    /// checked for sign, so a clock that steps backwards drains credit.
    #[inline]
    pub fn update_at(&mut self, params: &RateParameters, debit: f64, now: f64) -> f64 {
        let elapsed = now - self.last_update;
        self.last_update = now;
        self.balance = params.clamp(self.balance + params.accrued(elapsed) - debit);
        self.balance
    }

    /// Debit `cost` only if the balance stays at or above `threshold`
    ///
    /// Accrues first, then commits the debit at the same instant if
    /// `balance - cost >= threshold`. A rejected unit is not charged, so a
    /// sender over its budget is not pushed further into debt.
    ///
    /// # Example
    ///
    /// ```
    /// use ratebank::{ManualClock, RateAccount, RateParameters};
    ///
    /// let clock = ManualClock::new(0.0);
    /// let params = RateParameters::new(100.0, 500.0, 0.0);
    /// let mut account = RateAccount::with_preload(300.0, &clock);
    ///
    /// let first = account.admit(&params, 200.0, 0.0, &clock);
    /// assert!(first.admitted);
    /// assert_eq!(first.balance, 100.0);
    ///
    /// let second = account.admit(&params, 200.0, 0.0, &clock);
    /// assert!(!second.admitted);
    /// assert_eq!(second.shortfall, 100.0);
    /// ```
    pub fn admit(
        &mut self,
        params: &RateParameters,
        cost: f64,
        threshold: f64,
        clock: &impl Clock,
    ) -> Admission {
        self.admit_at(params, cost, threshold, clock.now())
    }

    /// Admission check as of `now`
    pub fn admit_at(
        &mut self,
        params: &RateParameters,
        cost: f64,
        threshold: f64,
        now: f64,
    ) -> Admission {
        let available = self.update_at(params, 0.0, now);
        let remaining = available - cost;

        if remaining >= threshold {
            Admission {
                admitted: true,
                balance: self.update_at(params, cost, now),
                shortfall: 0.0,
            }
        } else {
            Admission {
                admitted: false,
                balance: available,
                shortfall: threshold - remaining,
            }
        }
    }

    /// Balance as of the last update, without accruing
    #[inline]
    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// Clock reading of the last update or initialization
    #[inline]
    pub fn last_update(&self) -> f64 {
        self.last_update
    }
}
