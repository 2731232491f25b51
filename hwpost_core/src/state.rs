// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Posting-thread state bits.

use bitflags::bitflags;

bitflags! {
    /// Reasons the posting thread is parked. Any bit set means quiescent.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PostThreadState: u32 {
        /// No surfaces to show.
        const IDLE = 1 << 0;
        /// Disabled by the display owner.
        const SUSPENDED = 1 << 1;
        /// Shutting down. Never cleared.
        const QUIT = 1 << 2;
    }
}

impl PostThreadState {
    /// State of a freshly spawned posting thread.
    pub const INITIAL: Self = Self::IDLE.union(Self::SUSPENDED);

    /// Returns `true` if the posting thread must park.
    #[inline]
    #[must_use]
    pub const fn is_quiescent(self) -> bool {
        !self.is_empty()
    }

    /// Sets or clears `bits`. [`QUIT`](Self::QUIT) is sticky.
    #[must_use]
    pub fn update(self, bits: Self, set: bool) -> Self {
        if set {
            self | bits
        } else {
            (self - bits) | (self & Self::QUIT)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_quiescent() {
        let state = PostThreadState::INITIAL;
        assert!(state.is_quiescent());
        assert!(state.contains(PostThreadState::IDLE));
        assert!(state.contains(PostThreadState::SUSPENDED));
    }

    #[test]
    fn clearing_all_bits_activates() {
        let state = PostThreadState::INITIAL
            .update(PostThreadState::SUSPENDED, false)
            .update(PostThreadState::IDLE, false);
        assert!(!state.is_quiescent());
    }

    #[test]
    fn quit_is_sticky() {
        let state = PostThreadState::empty().update(PostThreadState::QUIT, true);
        let state = state.update(PostThreadState::all(), false);
        assert!(state.contains(PostThreadState::QUIT));
        assert!(state.is_quiescent());
    }
}
