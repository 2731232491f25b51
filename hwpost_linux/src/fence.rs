// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sync-file backed fences.

use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use hwpost_core::fence::{Fence, SyncFence};
use rustix::event::{PollFd, PollFlags, poll};
use rustix::io::Errno;
use rustix::time::Timespec;

const NO_WAIT: Timespec = Timespec {
    tv_sec: 0,
    tv_nsec: 0,
};

/// Returns `true` if `fd` is readable right now.
pub(crate) fn poll_readable(fd: BorrowedFd<'_>) -> bool {
    let mut fds = [PollFd::new(&fd, PollFlags::IN)];
    loop {
        match poll(&mut fds, Some(&NO_WAIT)) {
            Ok(ready) => return ready > 0 && fds[0].revents().contains(PollFlags::IN),
            Err(Errno::INTR) => {}
            Err(err) => {
                tracing::warn!(%err, "fence poll failed");
                return false;
            }
        }
    }
}

/// A sync-file descriptor. Signaled once it polls readable.
#[derive(Debug)]
pub struct FdFence {
    fd: OwnedFd,
}

impl FdFence {
    /// Takes ownership of a sync-file descriptor.
    #[must_use]
    pub fn new(fd: OwnedFd) -> Self {
        Self { fd }
    }

    /// Wraps `fd` into a [`Fence`].
    #[must_use]
    pub fn into_fence(fd: OwnedFd) -> Fence {
        Fence::new(Self::new(fd))
    }
}

impl SyncFence for FdFence {
    fn is_signaled(&self) -> bool {
        poll_readable(self.fd.as_fd())
    }
}

impl AsFd for FdFence {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

#[cfg(test)]
mod tests {
    use rustix::event::{EventfdFlags, eventfd};

    use super::*;

    #[test]
    fn eventfd_stands_in_for_a_sync_file() {
        let fd = eventfd(0, EventfdFlags::CLOEXEC | EventfdFlags::NONBLOCK).unwrap();
        let writer = fd.try_clone().unwrap();
        let fence = FdFence::into_fence(fd);
        assert!(!fence.is_retired());

        rustix::io::write(&writer, &1_u64.to_ne_bytes()).unwrap();
        assert!(fence.is_retired());
    }
}
