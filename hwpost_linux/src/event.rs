// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Control-plane interrupt.

use std::io;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use rustix::event::{EventfdFlags, eventfd};
use rustix::io::Errno;

/// A non-blocking eventfd that stays readable from [`signal`](Self::signal)
/// until [`clear`](Self::clear).
///
/// The controller raises it whenever the posting thread should stop what it
/// is doing, so a vsync sleep polling it returns immediately.
#[derive(Debug)]
pub struct InterruptEvent {
    fd: OwnedFd,
}

impl InterruptEvent {
    /// Creates a cleared event.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the eventfd cannot be created.
    pub fn new() -> io::Result<Self> {
        let fd = eventfd(0, EventfdFlags::CLOEXEC | EventfdFlags::NONBLOCK)?;
        Ok(Self { fd })
    }

    /// Makes the event readable.
    pub fn signal(&self) {
        if let Err(err) = rustix::io::write(&self.fd, &1_u64.to_ne_bytes()) {
            tracing::error!(%err, "failed to signal post thread interrupt");
        }
    }

    /// Drains the event.
    pub fn clear(&self) {
        let mut value = [0_u8; 8];
        match rustix::io::read(&self.fd, &mut value) {
            Ok(_) | Err(Errno::AGAIN) => {}
            Err(err) => tracing::error!(%err, "failed to clear post thread interrupt"),
        }
    }

    /// Returns `true` if the event is currently raised.
    #[must_use]
    pub fn is_signaled(&self) -> bool {
        crate::fence::poll_readable(self.fd.as_fd())
    }
}

impl AsFd for InterruptEvent {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}
