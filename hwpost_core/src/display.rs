// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Display identification and metrics.
//!
//! [`DisplayId`] is the HAL's display handle. [`DisplayMetrics`] is read once
//! from the composer when the pipeline initializes and stays fixed for the
//! life of the pipeline.

use core::fmt;

use crate::hwc::{Composer, ConfigId, DisplayAttribute, HwcError};
use crate::time::Duration;

/// Identifies a display known to the composer HAL.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DisplayId(pub u64);

impl DisplayId {
    /// The built-in panel.
    pub const PRIMARY: Self = Self(0);

    /// Number of physical displays with driver-level vsync bookkeeping.
    pub const NUM_PHYSICAL: usize = 3;

    /// Returns `true` if this id names one of the physical displays.
    #[inline]
    #[must_use]
    pub const fn is_physical(self) -> bool {
        self.0 < Self::NUM_PHYSICAL as u64
    }

    /// Returns this id as an index into per-physical-display tables.
    #[inline]
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "only called for physical displays, which fit in usize"
    )]
    pub const fn index(self) -> Option<usize> {
        if self.is_physical() {
            Some(self.0 as usize)
        } else {
            None
        }
    }
}

impl fmt::Debug for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DisplayId({})", self.0)
    }
}

impl fmt::Display for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Horizontal and vertical density in dots per thousand inches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Dpi {
    /// Horizontal density.
    pub x: i32,
    /// Vertical density.
    pub y: i32,
}

/// Geometry and timing of a display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct DisplayMetrics {
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
    /// Density.
    pub dpi: Dpi,
    /// Refresh period in nanoseconds.
    pub vsync_period_ns: i64,
}

impl DisplayMetrics {
    /// Reads the metrics of `config` on `display` from the composer.
    ///
    /// # Errors
    ///
    /// Returns the first HAL error reported for any attribute.
    pub fn query(
        composer: &dyn Composer,
        display: DisplayId,
        config: ConfigId,
    ) -> Result<Self, HwcError> {
        let attr = |a| composer.get_display_attribute(display, config, a);
        Ok(Self {
            width: attr(DisplayAttribute::Width)?,
            height: attr(DisplayAttribute::Height)?,
            dpi: Dpi {
                x: attr(DisplayAttribute::DpiX)?,
                y: attr(DisplayAttribute::DpiY)?,
            },
            vsync_period_ns: i64::from(attr(DisplayAttribute::VsyncPeriod)?),
        })
    }

    /// Returns the refresh period.
    #[inline]
    #[must_use]
    pub const fn vsync_period(&self) -> Duration {
        Duration::from_signed_nanos(self.vsync_period_ns)
    }

    /// Time from vsync until photons leave the left eye panel, 1.5 periods.
    #[inline]
    #[must_use]
    pub const fn left_eye_photon_offset_ns(&self) -> i64 {
        self.vsync_period_ns * 150 / 100
    }

    /// Time from vsync until the right eye scanout midpoint: half of the
    /// period without the 6.3% vertical blanking interval.
    #[inline]
    #[must_use]
    pub const fn default_right_eye_photon_offset_ns(&self) -> i64 {
        let vblank_ns = self.vsync_period_ns * 63 / 1000;
        (self.vsync_period_ns - vblank_ns) / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_displays() {
        assert!(DisplayId::PRIMARY.is_physical(), "primary is physical");
        assert!(DisplayId(2).is_physical(), "display 2 is physical");
        assert!(!DisplayId(3).is_physical(), "display 3 is virtual");
        assert_eq!(DisplayId(1).index(), Some(1));
        assert_eq!(DisplayId(7).index(), None);
    }

    #[test]
    fn eye_offsets_at_60hz() {
        let metrics = DisplayMetrics {
            width: 1440,
            height: 2560,
            dpi: Dpi { x: 500_000, y: 500_000 },
            vsync_period_ns: 16_666_666,
        };
        assert_eq!(metrics.left_eye_photon_offset_ns(), 24_999_999);
        // vblank = 1_049_999; (16_666_666 - 1_049_999) / 2
        assert_eq!(metrics.default_right_eye_photon_offset_ns(), 7_808_333);
        assert_eq!(metrics.vsync_period(), Duration(16_666_666));
    }
}
