// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Interruptible absolute-time sleeps.
//!
//! The posting thread sleeps on a `CLOCK_MONOTONIC` timerfd armed with an
//! absolute deadline, so retrying a sleep never drifts. The timerfd is polled
//! together with the [`InterruptEvent`]; whichever becomes readable first ends
//! the sleep.

use std::io;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use hwpost_core::time::HostTime;
use rustix::event::{PollFd, PollFlags, poll};
use rustix::io::Errno;
use rustix::time::{
    Itimerspec, Timespec, TimerfdClockId, TimerfdFlags, TimerfdTimerFlags, timerfd_create,
    timerfd_settime,
};
use thiserror::Error;

use crate::clock::host_time_to_timespec;
use crate::event::InterruptEvent;

/// Why a sleep ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wake {
    /// The deadline passed.
    Elapsed,
    /// The control-plane interrupt was raised.
    Interrupted,
}

/// Errors from [`VsyncTimer::sleep_until`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SleepError {
    /// `timerfd_settime` failed.
    #[error("failed to arm vsync timer: {0}")]
    Arm(#[source] Errno),
    /// `poll` failed with something other than `EINTR`.
    #[error("failed to poll vsync timer: {0}")]
    Poll(#[source] Errno),
}

/// Absolute-deadline `CLOCK_MONOTONIC` timer.
#[derive(Debug)]
pub struct VsyncTimer {
    fd: OwnedFd,
}

impl VsyncTimer {
    /// Creates a disarmed timer.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the timerfd cannot be created.
    pub fn new() -> io::Result<Self> {
        let fd = timerfd_create(
            TimerfdClockId::Monotonic,
            TimerfdFlags::CLOEXEC | TimerfdFlags::NONBLOCK,
        )?;
        Ok(Self { fd })
    }

    fn arm(&self, deadline: HostTime) -> Result<(), Errno> {
        // A zero it_value disarms the timer.
        let deadline = HostTime(deadline.nanos().max(1));
        let spec = Itimerspec {
            it_interval: Timespec {
                tv_sec: 0,
                tv_nsec: 0,
            },
            it_value: host_time_to_timespec(deadline),
        };
        timerfd_settime(&self.fd, TimerfdTimerFlags::ABSTIME, &spec)?;
        Ok(())
    }

    fn consume(&self) {
        let mut expirations = [0_u8; 8];
        match rustix::io::read(&self.fd, &mut expirations) {
            Ok(_) | Err(Errno::AGAIN) => {}
            Err(err) => tracing::warn!(%err, "failed to read vsync timer"),
        }
    }

    /// Sleeps until `deadline` or until `interrupt` is raised.
    ///
    /// A deadline in the past returns [`Wake::Elapsed`] right away, unless the
    /// interrupt is already raised. `EINTR` is retried.
    ///
    /// # Errors
    ///
    /// Returns [`SleepError`] if the timer cannot be armed or polled.
    pub fn sleep_until(
        &self,
        deadline: HostTime,
        interrupt: &InterruptEvent,
    ) -> Result<Wake, SleepError> {
        self.arm(deadline).map_err(SleepError::Arm)?;

        let interrupt_fd = interrupt.as_fd();
        let mut fds = [
            PollFd::new(&self.fd, PollFlags::IN),
            PollFd::new(&interrupt_fd, PollFlags::IN | PollFlags::PRI),
        ];
        loop {
            match poll(&mut fds, None) {
                Ok(_) => break,
                Err(Errno::INTR) => {}
                Err(err) => return Err(SleepError::Poll(err)),
            }
        }

        if !fds[1].revents().is_empty() {
            tracing::debug!("post thread sleep interrupted");
            return Ok(Wake::Interrupted);
        }
        if !fds[0].revents().is_empty() {
            self.consume();
        }
        Ok(Wake::Elapsed)
    }
}

impl AsFd for VsyncTimer {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

#[cfg(test)]
mod tests {
    use hwpost_core::time::Duration;

    use super::*;
    use crate::clock::now;

    #[test]
    fn past_deadline_elapses_immediately() {
        let timer = VsyncTimer::new().unwrap();
        let interrupt = InterruptEvent::new().unwrap();
        assert_eq!(
            timer.sleep_until(HostTime::ZERO, &interrupt),
            Ok(Wake::Elapsed)
        );
    }

    #[test]
    fn sleeps_until_deadline() {
        let timer = VsyncTimer::new().unwrap();
        let interrupt = InterruptEvent::new().unwrap();
        let start = now();
        let deadline = start.saturating_add(Duration::from_millis(5));
        assert_eq!(timer.sleep_until(deadline, &interrupt), Ok(Wake::Elapsed));
        assert!(now() >= deadline, "woke before the deadline");
    }

    #[test]
    fn raised_interrupt_wins() {
        let timer = VsyncTimer::new().unwrap();
        let interrupt = InterruptEvent::new().unwrap();
        interrupt.signal();
        let deadline = now().saturating_add(Duration::from_millis(10_000));
        assert_eq!(
            timer.sleep_until(deadline, &interrupt),
            Ok(Wake::Interrupted)
        );
    }

    #[test]
    fn interrupt_from_another_thread() {
        let timer = VsyncTimer::new().unwrap();
        let interrupt = std::sync::Arc::new(InterruptEvent::new().unwrap());
        let signaler = {
            let interrupt = interrupt.clone();
            std::thread::spawn(move || {
                std::thread::sleep(std::time::Duration::from_millis(5));
                interrupt.signal();
            })
        };
        let deadline = now().saturating_add(Duration::from_millis(10_000));
        assert_eq!(
            timer.sleep_until(deadline, &interrupt),
            Ok(Wake::Interrupted)
        );
        signaler.join().unwrap();
    }
}
