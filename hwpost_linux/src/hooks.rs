// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Platform hooks called from the posting thread.

/// Target-specific performance profile requested on resume and pause.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PerformanceMode {
    /// The posting thread is active.
    Performance,
    /// The posting thread is parked.
    Idle,
}

/// Scheduler and power plumbing the posting thread cannot do portably.
///
/// Both methods run on the posting thread.
pub trait PostThreadHooks: Send {
    /// Moves the calling thread into the real-time scheduling class. Returns
    /// `false` on failure; the thread retries on its next resume.
    fn set_thread_policy(&mut self) -> bool {
        true
    }

    /// Requests a performance profile.
    fn set_performance_mode(&mut self, mode: PerformanceMode) {
        _ = mode;
    }
}

/// Hooks that do nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHooks;

impl PostThreadHooks for NoopHooks {}
