//!
//! Temporal quantification in a simulation context.
//!
//! A [`Duration`] describes a span of time, a [`SimTime`] a point on the
//! simulation clock. The clock is logical: it never moves backwards and is
//! advanced exclusively by the event dispatch loop, independent of wall
//! clock time.
//!

use std::cell::Cell;
use std::fmt::{Debug, Display};
use std::ops::{Add, AddAssign, Sub};

/// A span of simulated time.
pub use std::time::Duration;

thread_local! {
    static SIMTIME: Cell<SimTime> = const { Cell::new(SimTime::ZERO) };
}

///
/// A specific point of time in the simulation.
///
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimTime(Duration);

impl SimTime {
    /// The start of the simulation timeline.
    pub const ZERO: SimTime = SimTime(Duration::ZERO);
    /// The earliest representable point in time.
    pub const MIN: SimTime = SimTime(Duration::ZERO);
    /// The latest representable point in time, used as a sentinel
    /// for "never" / "no timeout".
    pub const MAX: SimTime = SimTime(Duration::MAX);

    /// Returns the instant corresponding to "now" in the simulation context.
    ///
    /// # Examples
    ///
    /// ```
    /// use simcore::time::SimTime;
    ///
    /// let now = SimTime::now();
    /// assert!(now <= SimTime::MAX);
    /// ```
    #[must_use]
    pub fn now() -> Self {
        SIMTIME.with(Cell::get)
    }

    pub(crate) fn set_now(time: SimTime) {
        SIMTIME.with(|s| s.set(time));
    }

    /// Constructs an instance from a duration since [`SimTime::ZERO`].
    #[must_use]
    pub const fn from_duration(duration: Duration) -> Self {
        Self(duration)
    }

    /// Returns the amount of time elapsed from another instant to this one,
    /// or a zero duration if that instant is later than this one.
    #[must_use]
    pub fn duration_since(&self, earlier: SimTime) -> Duration {
        self.0.saturating_sub(earlier.0)
    }

    /// Returns the absolute difference between two instants.
    #[must_use]
    pub fn duration_diff(&self, other: SimTime) -> Duration {
        if *self > other {
            self.duration_since(other)
        } else {
            other.duration_since(*self)
        }
    }

    /// Checked addition of a duration, `None` on overflow.
    #[must_use]
    pub fn checked_add(&self, duration: Duration) -> Option<SimTime> {
        self.0.checked_add(duration).map(SimTime)
    }

    /// The instant as fractional seconds since the start of the timeline.
    #[must_use]
    pub fn as_secs_f64(&self) -> f64 {
        self.0.as_secs_f64()
    }

    /// The instant as whole seconds since the start of the timeline.
    #[must_use]
    pub fn as_secs(&self) -> u64 {
        self.0.as_secs()
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;
    fn add(self, rhs: Duration) -> Self::Output {
        self.checked_add(rhs)
            .expect("overflow when adding Duration to SimTime")
    }
}

impl AddAssign<Duration> for SimTime {
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl Sub<SimTime> for SimTime {
    type Output = Duration;
    fn sub(self, rhs: SimTime) -> Self::Output {
        self.duration_since(rhs)
    }
}

impl From<f64> for SimTime {
    fn from(secs: f64) -> Self {
        Self(Duration::from_secs_f64(secs))
    }
}

impl From<SimTime> for Duration {
    fn from(time: SimTime) -> Self {
        time.0
    }
}

impl Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if *self == SimTime::MAX {
            write!(f, "MAX")
        } else {
            write!(f, "{:?}", self.0)
        }
    }
}

impl Debug for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simtime_arithmetic() {
        let t = SimTime::from(1.5);
        assert_eq!(t + Duration::from_millis(500), SimTime::from(2.0));
        assert_eq!(SimTime::from(2.0) - t, Duration::from_millis(500));
        // saturating in the wrong direction
        assert_eq!(t - SimTime::from(2.0), Duration::ZERO);
    }

    #[test]
    fn simtime_ordering() {
        assert!(SimTime::ZERO < SimTime::from(0.1));
        assert!(SimTime::from(0.1) < SimTime::MAX);
        assert_eq!(SimTime::MAX.to_string(), "MAX");
    }
}
