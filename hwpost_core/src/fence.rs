// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sync fences and the retire-fence queue.
//!
//! A [`Fence`] owns at most one platform sync object. An empty fence is the
//! HAL's "no fence" value and counts as already signaled.
//!
//! [`RetireFenceQueue`] keeps the present fences of frames the display has not
//! finished scanning out yet, oldest first. Its length after
//! [`drain_retired`](RetireFenceQueue::drain_retired) is the backpressure
//! signal used to decide whether to drop a frame.

use std::collections::VecDeque;
use std::fmt;

/// A platform synchronization object.
///
/// `hwpost_linux` backs this with a sync-file descriptor.
pub trait SyncFence: Send + fmt::Debug {
    /// Returns `true` once the fence has signaled. Never blocks.
    fn is_signaled(&self) -> bool;
}

/// An owned, possibly empty, sync fence.
#[derive(Default)]
pub struct Fence(Option<Box<dyn SyncFence>>);

impl Fence {
    /// The empty fence.
    #[inline]
    #[must_use]
    pub const fn none() -> Self {
        Self(None)
    }

    /// Wraps a platform fence.
    #[must_use]
    pub fn new(fence: impl SyncFence + 'static) -> Self {
        Self(Some(Box::new(fence)))
    }

    /// Returns `true` if this fence holds no sync object.
    #[inline]
    #[must_use]
    pub const fn is_none(&self) -> bool {
        self.0.is_none()
    }

    /// Returns `true` if the fence is empty or has signaled.
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.0.as_ref().is_none_or(|f| f.is_signaled())
    }

    /// Closes the underlying sync object, leaving the fence empty.
    pub fn close(&mut self) {
        self.0 = None;
    }

    /// Moves the sync object out, leaving this fence empty.
    #[must_use]
    pub fn take(&mut self) -> Self {
        Self(self.0.take())
    }
}

impl fmt::Debug for Fence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(inner) => f.debug_tuple("Fence").field(inner).finish(),
            None => f.write_str("Fence(None)"),
        }
    }
}

/// Present fences of frames still in flight, in submission order.
#[derive(Debug, Default)]
pub struct RetireFenceQueue {
    fences: VecDeque<Fence>,
}

impl RetireFenceQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the present fence of a frame just submitted.
    pub fn push(&mut self, fence: Fence) {
        self.fences.push_back(fence);
    }

    /// Removes fences from the front while they are empty or signaled and
    /// returns how many were removed.
    ///
    /// Stops at the first pending fence, so a later fence that signaled out
    /// of order stays queued behind it.
    pub fn drain_retired(&mut self) -> usize {
        let mut drained = 0;
        while self.fences.front().is_some_and(Fence::is_retired) {
            self.fences.pop_front();
            drained += 1;
        }
        drained
    }

    /// Number of fences in the queue.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.fences.len()
    }

    /// Returns `true` if no fences are queued.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }

    /// Closes every queued fence.
    pub fn clear(&mut self) {
        self.fences.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    #[derive(Debug)]
    struct Flag(Arc<AtomicBool>);

    impl SyncFence for Flag {
        fn is_signaled(&self) -> bool {
            self.0.load(Ordering::Acquire)
        }
    }

    fn fence(signaled: bool) -> (Fence, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(signaled));
        (Fence::new(Flag(flag.clone())), flag)
    }

    #[test]
    fn empty_fence_is_retired() {
        assert!(Fence::none().is_retired(), "no fence means nothing to wait for");
        assert!(Fence::default().is_none(), "default is empty");
    }

    #[test]
    fn take_and_close() {
        let (mut f, _) = fence(false);
        assert!(!f.is_retired(), "unsignaled fence is pending");
        let moved = f.take();
        assert!(f.is_none(), "take leaves the source empty");
        assert!(!moved.is_none(), "take moves the sync object");
        let mut moved = moved;
        moved.close();
        assert!(moved.is_none(), "close drops the sync object");
    }

    #[test]
    fn drain_stops_at_first_pending() {
        let mut queue = RetireFenceQueue::new();
        let (a, _) = fence(true);
        let (b, b_flag) = fence(false);
        let (c, _) = fence(true);
        queue.push(Fence::none());
        queue.push(a);
        queue.push(b);
        queue.push(c);

        assert_eq!(queue.drain_retired(), 2);
        assert_eq!(queue.pending(), 2, "signaled fence behind a pending one stays");

        b_flag.store(true, Ordering::Release);
        assert_eq!(queue.drain_retired(), 2);
        assert!(queue.is_empty(), "everything retired");
    }

    #[test]
    fn clear_empties_queue() {
        let mut queue = RetireFenceQueue::new();
        queue.push(fence(false).0);
        queue.push(fence(false).0);
        queue.clear();
        assert_eq!(queue.pending(), 0);
    }
}
