//! Time sources for balance accrual
//!
//! Accounts measure elapsed time as the difference between two readings of a
//! [`Clock`], expressed as fractional seconds. Only differences matter, so a
//! clock may start at any origin.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// A source of fractional-second timestamps
///
/// Implementations should be non-decreasing. A clock that steps backwards
/// produces negative elapsed time, which drains accrued credit instead of
/// adding it.
pub trait Clock {
    /// Current time in seconds
    fn now(&self) -> f64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> f64 {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> f64 {
        (**self).now()
    }
}

impl<C: Clock + ?Sized> Clock for Box<C> {
    fn now(&self) -> f64 {
        (**self).now()
    }
}

/// Monotonic clock measuring seconds since it was created
///
/// This is the default time source. It never goes backwards.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        MonotonicClock {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Wall clock measuring seconds since the Unix epoch
///
/// Follows the system clock, so it can jump in either direction when the
/// clock is adjusted. Prefer [`MonotonicClock`] unless timestamps must be
/// comparable across processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(since_epoch) => since_epoch.as_secs_f64(),
            // Clock set before the epoch
            Err(e) => -e.duration().as_secs_f64(),
        }
    }
}

/// Manually driven clock for tests and simulations
///
/// Clones share the same time value, so a test can hand one handle to an
/// [`AccountTable`](crate::AccountTable) and keep another to advance time.
///
/// # Example
///
/// ```
/// use ratebank::{Clock, ManualClock};
///
/// let clock = ManualClock::new(10.0);
/// let handle = clock.clone();
///
/// handle.advance(2.5);
/// assert_eq!(clock.now(), 12.5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock reading `start` seconds
    pub fn new(start: f64) -> Self {
        ManualClock {
            bits: Arc::new(AtomicU64::new(start.to_bits())),
        }
    }

    /// Jump to an absolute time
    ///
    /// Setting an earlier time than the current one is allowed and models a
    /// clock that steps backwards.
    pub fn set(&self, seconds: f64) {
        self.bits.store(seconds.to_bits(), Ordering::Release);
    }

    /// Move the clock forward by `seconds`
    pub fn advance(&self, seconds: f64) {
        // Keeps concurrent advances additive; the closure never returns None
        self.bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some((f64::from_bits(bits) + seconds).to_bits())
            })
            .ok();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

/// Adapter turning any `Fn() -> f64` into a [`Clock`]
///
/// # Example
///
/// ```
/// use ratebank::{Clock, FnClock};
///
/// let clock = FnClock(|| 42.0);
/// assert_eq!(clock.now(), 42.0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FnClock<F>(pub F);

impl<F: Fn() -> f64> Clock for FnClock<F> {
    fn now(&self) -> f64 {
        (self.0)()
    }
}
