// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic host time in nanoseconds.
//!
//! [`HostTime`] is a point on the `CLOCK_MONOTONIC` timeline and [`Duration`]
//! is a span on the same timeline. Both are unsigned nanosecond counts. The
//! composer HAL reports vsync timestamps as signed 64-bit nanoseconds, so
//! [`HostTime::from_signed_nanos`] and [`HostTime::as_signed_nanos`] convert at
//! that boundary, saturating rather than wrapping.

use core::fmt;

/// A point in time on the monotonic clock, in nanoseconds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HostTime(pub u64);

impl HostTime {
    /// The clock origin.
    pub const ZERO: Self = Self(0);

    /// Returns the raw nanosecond value.
    #[inline]
    #[must_use]
    pub const fn nanos(self) -> u64 {
        self.0
    }

    /// Creates a host time from a signed HAL timestamp.
    ///
    /// Negative values clamp to [`HostTime::ZERO`].
    #[inline]
    #[must_use]
    pub const fn from_signed_nanos(nanos: i64) -> Self {
        if nanos < 0 {
            Self(0)
        } else {
            Self(nanos.unsigned_abs())
        }
    }

    /// Returns this time as a signed HAL timestamp, saturating at `i64::MAX`.
    #[inline]
    #[must_use]
    pub const fn as_signed_nanos(self) -> i64 {
        if self.0 > i64::MAX as u64 {
            i64::MAX
        } else {
            self.0 as i64
        }
    }

    /// Returns the duration between `self` and an earlier time, or zero if
    /// `earlier` is after `self`.
    #[inline]
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration(self.0.saturating_sub(earlier.0))
    }

    /// Saturating addition of a duration.
    #[inline]
    #[must_use]
    pub const fn saturating_add(self, duration: Duration) -> Self {
        Self(self.0.saturating_add(duration.0))
    }

    /// Saturating subtraction of a duration.
    #[inline]
    #[must_use]
    pub const fn saturating_sub(self, duration: Duration) -> Self {
        Self(self.0.saturating_sub(duration.0))
    }

    /// Checked addition of a duration.
    #[inline]
    #[must_use]
    pub const fn checked_add(self, duration: Duration) -> Option<Self> {
        match self.0.checked_add(duration.0) {
            Some(t) => Some(Self(t)),
            None => None,
        }
    }
}

impl fmt::Debug for HostTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostTime({}ns)", self.0)
    }
}

/// A span of monotonic time, in nanoseconds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration(pub u64);

impl Duration {
    /// A zero-length duration.
    pub const ZERO: Self = Self(0);

    /// Creates a duration from whole milliseconds.
    #[inline]
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis * 1_000_000)
    }

    /// Creates a duration from a signed nanosecond count, clamping negative
    /// values to zero.
    #[inline]
    #[must_use]
    pub const fn from_signed_nanos(nanos: i64) -> Self {
        if nanos < 0 {
            Self(0)
        } else {
            Self(nanos.unsigned_abs())
        }
    }

    /// Returns the raw nanosecond value.
    #[inline]
    #[must_use]
    pub const fn nanos(self) -> u64 {
        self.0
    }

    /// Returns this duration as signed nanoseconds, saturating at `i64::MAX`.
    #[inline]
    #[must_use]
    pub const fn as_signed_nanos(self) -> i64 {
        HostTime(self.0).as_signed_nanos()
    }

    /// Saturating addition.
    #[inline]
    #[must_use]
    pub const fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// Saturating subtraction.
    #[inline]
    #[must_use]
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// Saturating multiplication by an integer factor.
    #[inline]
    #[must_use]
    pub const fn saturating_mul(self, factor: u32) -> Self {
        Self(self.0.saturating_mul(factor as u64))
    }

    /// Returns the smaller of two durations.
    #[inline]
    #[must_use]
    pub const fn min(self, other: Self) -> Self {
        if self.0 <= other.0 { self } else { other }
    }
}

impl fmt::Debug for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Duration({}ns)", self.0)
    }
}

impl From<Duration> for std::time::Duration {
    #[inline]
    fn from(d: Duration) -> Self {
        Self::from_nanos(d.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_conversion_clamps() {
        assert_eq!(HostTime::from_signed_nanos(-5), HostTime::ZERO);
        assert_eq!(HostTime::from_signed_nanos(42), HostTime(42));
        assert_eq!(HostTime(u64::MAX).as_signed_nanos(), i64::MAX);
        assert_eq!(HostTime(7).as_signed_nanos(), 7);
        assert_eq!(Duration::from_signed_nanos(-1), Duration::ZERO);
    }

    #[test]
    fn saturating_ops() {
        let t = HostTime(100);
        assert_eq!(t.saturating_sub(Duration(200)), HostTime::ZERO);
        assert_eq!(HostTime(u64::MAX).saturating_add(Duration(1)), HostTime(u64::MAX));
        assert_eq!(t.saturating_duration_since(HostTime(150)), Duration::ZERO);
        assert_eq!(t.saturating_duration_since(HostTime(40)), Duration(60));
        assert_eq!(HostTime(u64::MAX).checked_add(Duration(1)), None);
    }

    #[test]
    fn duration_helpers() {
        assert_eq!(Duration::from_millis(4), Duration(4_000_000));
        assert_eq!(Duration(10).saturating_mul(3), Duration(30));
        assert_eq!(Duration(u64::MAX).saturating_mul(2), Duration(u64::MAX));
        assert_eq!(Duration(3).min(Duration(2)), Duration(2));
        assert_eq!(Duration(u64::MAX).saturating_add(Duration(1)), Duration(u64::MAX));
        assert_eq!(Duration(1).saturating_sub(Duration(2)), Duration::ZERO);
        assert_eq!(
            std::time::Duration::from(Duration(1_500)),
            std::time::Duration::from_nanos(1_500)
        );
    }
}
