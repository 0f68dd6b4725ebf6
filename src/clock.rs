//! [`Clock`]s provide the millisecond timestamps that drive scheduling.
//!
//! See the documentation for the [`Clock`] type for more details.
use alloc::sync::Arc;
use core::{
    fmt,
    ops::{Add, AddAssign, Sub, SubAssign},
    time::Duration,
};

/// Timestamps and intervals are counted in whole milliseconds.
///
/// One millisecond is this crate's fixed granularity: the dispatch
/// primitives it adapts take millisecond delays, and sub-millisecond
/// precision is explicitly out of scope.
pub type Millis = u64;

/// A millisecond time source.
///
/// A `Clock` wraps a host-supplied `now()` function returning the current
/// time as a 64-bit number of milliseconds. A `Clock` must be provided when
/// constructing a [`Scheduler`](crate::Scheduler); it is used to compute the
/// absolute start time of periodic schedules and the drift-corrected time of
/// each subsequent fire.
///
/// # Implementing `now()`
///
/// Timestamps returned by `now()` MUST be monotonically non-decreasing: a
/// call to `now()` must never return a value less than a value returned by a
/// previous call. The epoch is arbitrary — only differences between
/// timestamps are meaningful to this crate.
///
/// The wall clock behind `now()` need only be "monotonic enough": small
/// amounts of jitter are tolerated (delays are lower bounds, not deadlines),
/// but a clock that jumps backwards will stall periodic schedules until it
/// catches back up.
#[derive(Clone)]
pub struct Clock {
    now: Arc<dyn Fn() -> Millis + Send + Sync>,
    name: &'static str,
}

/// A measurement of a [`Clock`]. Opaque and useful only with [`Duration`].
///
/// Provided that the [`Clock`] implementation is correct, `Instant`s are
/// always guaranteed to be no less than any previously measured instant from
/// the same clock. Instants from different clocks are not comparable in any
/// meaningful way.
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct Instant(Duration);

// === impl Clock ===

impl Clock {
    /// Returns a new `Clock` with the provided `now()` function.
    ///
    /// See the [type-level documentation](Self#implementing-now) for the
    /// contract `now()` must uphold.
    #[must_use]
    pub fn new(now: impl Fn() -> Millis + Send + Sync + 'static) -> Self {
        Self {
            now: Arc::new(now),
            name: "<unnamed mystery clock>",
        }
    }

    /// Add an arbitrary user-defined name to this `Clock`.
    ///
    /// This is generally used to describe the host time source used by the
    /// `now()` function for this `Clock`.
    #[must_use]
    pub fn named(self, name: &'static str) -> Self {
        Self { name, ..self }
    }

    /// Returns the current timestamp in [`Millis`].
    #[must_use]
    pub fn now_millis(&self) -> Millis {
        (self.now)()
    }

    /// Returns an [`Instant`] representing the current timestamp according
    /// to this `Clock`.
    #[must_use]
    pub fn now(&self) -> Instant {
        Instant(Duration::from_millis(self.now_millis()))
    }

    /// Returns this `Clock`'s name, if it was given one using the
    /// [`Clock::named`] method.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clock").field("name", &self.name).finish()
    }
}

/// Converts a [`Duration`] to whole milliseconds, saturating at
/// [`u64::MAX`].
///
/// Saturating (rather than erroring) keeps every scheduling operation
/// infallible; a delay of `u64::MAX` milliseconds is several hundred million
/// years, which is indistinguishable from "never" for this crate's purposes.
#[inline]
#[must_use]
pub(crate) fn dur_to_millis(dur: Duration) -> Millis {
    u64::try_from(dur.as_millis()).unwrap_or(u64::MAX)
}

// === impl Instant ===

impl Instant {
    /// Returns the amount of time elapsed from another instant to this one,
    /// or zero duration if that instant is later than this one.
    #[must_use]
    pub fn duration_since(&self, earlier: Instant) -> Duration {
        self.checked_duration_since(earlier).unwrap_or_default()
    }

    /// Returns the amount of time elapsed from another instant to this one,
    /// or [`None`] if that instant is later than this one.
    #[must_use]
    pub fn checked_duration_since(&self, earlier: Instant) -> Option<Duration> {
        self.0.checked_sub(earlier.0)
    }

    /// Returns this instant as a number of milliseconds since its clock's
    /// epoch.
    #[must_use]
    pub fn as_millis(&self) -> Millis {
        // constructed from whole milliseconds, so this cannot truncate.
        self.0.as_millis() as Millis
    }

    /// Returns `Some(t)` where `t` is the time `self + duration`, or
    /// [`None`] if the sum cannot be represented.
    #[must_use]
    pub fn checked_add(&self, duration: Duration) -> Option<Instant> {
        self.0.checked_add(duration).map(Instant)
    }

    /// Returns `Some(t)` where `t` is the time `self - duration`, or
    /// [`None`] if the difference cannot be represented.
    #[must_use]
    pub fn checked_sub(&self, duration: Duration) -> Option<Instant> {
        self.0.checked_sub(duration).map(Instant)
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    /// # Panics
    ///
    /// This function may panic if the resulting point in time cannot be
    /// represented. See [`Instant::checked_add`] for a version without
    /// panic.
    fn add(self, other: Duration) -> Instant {
        self.checked_add(other)
            .expect("overflow when adding duration to instant")
    }
}

impl AddAssign<Duration> for Instant {
    fn add_assign(&mut self, other: Duration) {
        *self = *self + other;
    }
}

impl Sub<Duration> for Instant {
    type Output = Instant;

    fn sub(self, other: Duration) -> Instant {
        self.checked_sub(other)
            .expect("overflow when subtracting duration from instant")
    }
}

impl SubAssign<Duration> for Instant {
    fn sub_assign(&mut self, other: Duration) {
        *self = *self - other;
    }
}

impl Sub<Instant> for Instant {
    type Output = Duration;

    /// Returns the amount of time elapsed from another instant to this one,
    /// or zero duration if that instant is later than this one.
    fn sub(self, other: Instant) -> Duration {
        self.duration_since(other)
    }
}

impl fmt::Display for Instant {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}
