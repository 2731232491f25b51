// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Vsync prediction.
//!
//! The posting thread never blocks on the hardware vsync signal. It sleeps
//! until a predicted vsync, `last_vsync + period * prediction_interval`, and
//! afterwards checks the newest timestamp the driver reported:
//!
//! - **Advanced**: the timestamp is strictly later than the last confirmed
//!   one. It becomes the new baseline and the interval resets to 1.
//! - **Delayed**: the timestamp did not move. The interval grows so the
//!   next prediction lands one period further out.
//!
//! The externally visible vsync counter only advances on iterations that
//! start with an interval of 1, so clients see a skipped count when the
//! driver stalls.

use crate::time::{Duration, HostTime};

/// Result of [`VsyncPredictor::observe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VsyncObservation {
    /// The driver reported a new vsync.
    Advanced,
    /// The driver timestamp did not advance; the prediction interval grew to
    /// the contained value.
    Delayed {
        /// New prediction interval.
        prediction_interval: u32,
    },
}

/// Predicts the next vsync from the last confirmed one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VsyncPredictor {
    last_vsync: HostTime,
    prediction_interval: u32,
    vsync_count: u32,
}

impl Default for VsyncPredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl VsyncPredictor {
    /// Creates a predictor with no baseline.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_vsync: HostTime::ZERO,
            prediction_interval: 1,
            vsync_count: 0,
        }
    }

    /// Re-derives the baseline from the current clock, as on resume.
    pub fn reset(&mut self, now: HostTime) {
        self.last_vsync = now;
        self.prediction_interval = 1;
    }

    /// The absolute time of the next predicted vsync.
    #[must_use]
    pub const fn predicted_vsync(&self, period: Duration) -> HostTime {
        self.last_vsync
            .saturating_add(period.saturating_mul(self.prediction_interval))
    }

    /// Advances the vsync counter if the prediction is trusted. Returns
    /// whether it advanced.
    pub fn advance_count(&mut self) -> bool {
        if self.prediction_interval == 1 {
            self.vsync_count = self.vsync_count.wrapping_add(1);
            true
        } else {
            false
        }
    }

    /// Folds in the newest driver timestamp.
    pub fn observe(&mut self, timestamp: HostTime) -> VsyncObservation {
        if timestamp > self.last_vsync {
            self.last_vsync = timestamp;
            self.prediction_interval = 1;
            VsyncObservation::Advanced
        } else {
            self.prediction_interval = self.prediction_interval.saturating_add(1);
            VsyncObservation::Delayed {
                prediction_interval: self.prediction_interval,
            }
        }
    }

    /// Last confirmed vsync.
    #[must_use]
    pub const fn last_vsync(&self) -> HostTime {
        self.last_vsync
    }

    /// Current prediction interval multiplier, at least 1.
    #[must_use]
    pub const fn prediction_interval(&self) -> u32 {
        self.prediction_interval
    }

    /// Number of trusted vsyncs seen.
    #[must_use]
    pub const fn vsync_count(&self) -> u32 {
        self.vsync_count
    }
}

/// Published to the vsync broadcast ring every trusted iteration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct VsyncRecord {
    /// Trusted vsync counter.
    pub vsync_count: u32,
    /// Predicted vsync timestamp.
    pub vsync_timestamp_ns: i64,
    /// Vsync to left eye photons.
    pub vsync_left_eye_offset_ns: i64,
    /// Vsync to right eye photons.
    pub vsync_right_eye_offset_ns: i64,
    /// Refresh period.
    pub vsync_period_ns: i64,
}
