// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic host clock reads.

use hwpost_core::time::HostTime;
use rustix::time::{ClockId, Timespec, clock_gettime};

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Returns the current `CLOCK_MONOTONIC` time in nanoseconds.
///
/// Vsync timestamps reported by the composer and the driver's vsync event node
/// are on this clock.
#[must_use]
pub fn now() -> HostTime {
    timespec_to_host_time(clock_gettime(ClockId::Monotonic))
}

pub(crate) fn timespec_to_host_time(timespec: Timespec) -> HostTime {
    let seconds = u64::try_from(timespec.tv_sec).unwrap_or(0);
    let nanos = u64::try_from(timespec.tv_nsec)
        .unwrap_or(0)
        .min(NANOS_PER_SECOND - 1);
    HostTime(
        seconds
            .saturating_mul(NANOS_PER_SECOND)
            .saturating_add(nanos),
    )
}

pub(crate) fn host_time_to_timespec(time: HostTime) -> Timespec {
    let nanos = time.nanos();
    Timespec {
        tv_sec: (nanos / NANOS_PER_SECOND).try_into().unwrap_or(i64::MAX),
        tv_nsec: (nanos % NANOS_PER_SECOND).try_into().unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_monotonic_non_decreasing() {
        let first = now();
        let second = now();
        assert!(second >= first, "monotonic clock should not go backwards");
    }

    #[test]
    fn timespec_conversion_splits_seconds() {
        let ts = host_time_to_timespec(HostTime(3_000_000_123));
        assert_eq!(ts.tv_sec, 3);
        assert_eq!(ts.tv_nsec, 123);
        assert_eq!(timespec_to_host_time(ts), HostTime(3_000_000_123));
    }

    #[test]
    fn negative_timespec_clamps_to_zero() {
        let ts = Timespec {
            tv_sec: -1,
            tv_nsec: 5,
        };
        assert_eq!(timespec_to_host_time(ts), HostTime(5));
    }
}
