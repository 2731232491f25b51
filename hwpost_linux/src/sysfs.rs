// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Display driver sysfs nodes.
//!
//! Some framebuffer drivers expose `fb<N>/vsync_event`, which always reads as
//! `VSYNC=<ns>` with the newest hardware vsync timestamp. Reading it is more
//! up to date than waiting for the composer's vsync callback.

use std::io;
use std::os::fd::OwnedFd;
use std::path::{Path, PathBuf};

use rustix::fs::{Mode, OFlags, SeekFrom, open, seek};
use rustix::io::Errno;

use crate::callback::VsyncError;

/// Default sysfs directory holding the `fb<N>` nodes.
pub const DEFAULT_GRAPHICS_ROOT: &str = "/sys/class/graphics";

/// Path of the vsync event node for framebuffer `index` under `root`.
#[must_use]
pub fn vsync_event_path(root: &Path, index: usize) -> PathBuf {
    root.join(format!("fb{index}")).join("vsync_event")
}

/// Parses the contents of a vsync event node.
///
/// Trailing NULs and whitespace are ignored.
#[must_use]
pub fn parse_vsync_event(text: &[u8]) -> Option<i64> {
    let text = core::str::from_utf8(text).ok()?;
    let digits = text
        .trim_end_matches(['\0', '\n', ' '])
        .strip_prefix("VSYNC=")?;
    digits.parse::<u64>().ok().and_then(|ns| i64::try_from(ns).ok())
}

/// An open `vsync_event` node.
#[derive(Debug)]
pub struct VsyncEventNode {
    fd: OwnedFd,
    path: PathBuf,
}

impl VsyncEventNode {
    /// Opens the node read-only and non-blocking.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the node does not exist or cannot be opened.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let fd = open(
            &path,
            OFlags::RDONLY | OFlags::CLOEXEC | OFlags::NONBLOCK,
            Mode::empty(),
        )?;
        Ok(Self { fd, path })
    }

    /// Where the node lives.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewinds and reads the newest timestamp.
    ///
    /// # Errors
    ///
    /// [`VsyncError::Seek`] or [`VsyncError::Read`] for I/O failures
    /// (`EAGAIN` when the driver has nothing new), [`VsyncError::Parse`] for
    /// malformed contents.
    pub fn read_timestamp(&self) -> Result<i64, VsyncError> {
        seek(&self.fd, SeekFrom::Start(0)).map_err(VsyncError::Seek)?;
        let mut data = [0_u8; 32];
        let len = rustix::io::read(&self.fd, &mut data).map_err(VsyncError::Read)?;
        parse_vsync_event(&data[..len]).ok_or(VsyncError::Parse)
    }
}

/// Panel backlight brightness control.
#[derive(Debug)]
pub struct Backlight {
    fd: OwnedFd,
}

impl Backlight {
    /// Full brightness, written on every resume.
    pub const MAX_BRIGHTNESS: u32 = 255;

    /// Opens the brightness node for writing.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the node cannot be opened.
    pub fn open(path: &Path) -> io::Result<Self> {
        let fd = open(path, OFlags::WRONLY | OFlags::CLOEXEC, Mode::empty())?;
        Ok(Self { fd })
    }

    /// Writes `brightness` as decimal text.
    ///
    /// # Errors
    ///
    /// Returns the OS error from the write.
    pub fn set_brightness(&self, brightness: u32) -> Result<(), Errno> {
        rustix::io::write(&self.fd, brightness.to_string().as_bytes())?;
        Ok(())
    }
}
