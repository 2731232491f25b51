// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Static configuration of a [`HardwareComposer`](crate::HardwareComposer).

use std::borrow::Cow;
use std::path::PathBuf;

use crate::sysfs::DEFAULT_GRAPHICS_ROOT;

/// Device-level settings fixed for the life of the compositor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HardwareComposerConfig {
    /// Standalone headsets keep one composer client alive and only toggle
    /// display power on pause and resume. Phones hand the display back to
    /// the system compositor, so they drop the client on pause.
    pub is_standalone_device: bool,
    /// Overrides the computed right-eye photon offset published with every
    /// vsync.
    pub right_eye_offset_ns: Option<i64>,
    /// Backlight brightness node, set to full brightness on resume.
    pub backlight_path: Option<PathBuf>,
    /// Directory probed for `fb<N>/vsync_event` nodes on hotplug.
    pub sysfs_graphics_root: PathBuf,
    /// Name of the posting thread.
    pub thread_name: Cow<'static, str>,
}

impl HardwareComposerConfig {
    /// Posting thread name.
    pub const DEFAULT_THREAD_NAME: &'static str = "VrHwcPost";

    /// A phone sharing the display with the system compositor.
    #[must_use]
    pub fn phone() -> Self {
        Self {
            is_standalone_device: false,
            right_eye_offset_ns: None,
            backlight_path: None,
            sysfs_graphics_root: PathBuf::from(DEFAULT_GRAPHICS_ROOT),
            thread_name: Cow::Borrowed(Self::DEFAULT_THREAD_NAME),
        }
    }

    /// A standalone headset owning its display.
    #[must_use]
    pub fn standalone() -> Self {
        Self {
            is_standalone_device: true,
            ..Self::phone()
        }
    }
}

impl Default for HardwareComposerConfig {
    fn default() -> Self {
        Self::phone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_differ_only_in_ownership() {
        let phone = HardwareComposerConfig::phone();
        let standalone = HardwareComposerConfig::standalone();
        assert!(!phone.is_standalone_device);
        assert!(standalone.is_standalone_device);
        assert_eq!(
            HardwareComposerConfig {
                is_standalone_device: false,
                ..standalone
            },
            phone
        );
        assert_eq!(phone.thread_name, "VrHwcPost");
    }
}
