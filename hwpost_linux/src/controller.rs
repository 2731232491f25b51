// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cross-thread control of the posting thread.
//!
//! Callers vote the posting thread quiescent by setting
//! [`PostThreadState`] bits; the thread runs only while no bit is set. All
//! shared control state sits behind one mutex with two condition variables:
//!
//! - `wait` parks the posting thread while it is quiescent.
//! - `ready` blocks callers of [`PostThreadController::update`] until the
//!   posting thread has observably resumed or paused.
//!
//! An [`InterruptEvent`] stays raised for as long as the thread should be
//! quiescent, cutting any vsync sleep short.
//!
//! ```text
//!   caller                          posting thread
//!   ──────                          ──────────────
//!   update(SUSPENDED, true)
//!     quiescent = true
//!     interrupt.signal() ─────────► sleep returns Interrupted
//!     ready.wait(resumed == false)  tears down, park():
//!                                     resumed = false
//!     ◄──────────────────────────── ready.notify_all()
//!                                     wait.wait(!quiescent)
//! ```

use std::sync::Arc;

use hwpost_core::source::DisplaySurface;
use hwpost_core::state::PostThreadState;
use parking_lot::{Condvar, Mutex};

use crate::event::InterruptEvent;

/// How [`PostThreadController::park`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Park {
    /// Every bit cleared; the thread is running again.
    Resumed,
    /// [`PostThreadState::QUIT`] was set; the thread must exit.
    Quit,
}

struct ControlState {
    bits: PostThreadState,
    quiescent: bool,
    resumed: bool,
    resuming: bool,
    exited: bool,
    pending_surfaces: Option<Vec<Arc<dyn DisplaySurface>>>,
}

/// State machine and rendezvous between control callers and the posting
/// thread.
pub struct PostThreadController {
    state: Mutex<ControlState>,
    wait: Condvar,
    ready: Condvar,
    interrupt: InterruptEvent,
}

impl core::fmt::Debug for PostThreadController {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PostThreadController")
            .field("bits", &state.bits)
            .field("quiescent", &state.quiescent)
            .field("resumed", &state.resumed)
            .field("resuming", &state.resuming)
            .field(
                "pending_surfaces",
                &state.pending_surfaces.as_ref().map(Vec::len),
            )
            .finish_non_exhaustive()
    }
}

impl PostThreadController {
    /// Creates a controller in the initial suspended and idle state.
    #[must_use]
    pub fn new(interrupt: InterruptEvent) -> Self {
        Self {
            state: Mutex::new(ControlState {
                bits: PostThreadState::INITIAL,
                quiescent: true,
                resumed: false,
                resuming: false,
                exited: false,
                pending_surfaces: None,
            }),
            wait: Condvar::new(),
            ready: Condvar::new(),
            interrupt,
        }
    }

    /// The interrupt raised while the posting thread should be quiescent.
    #[must_use]
    pub fn interrupt(&self) -> &InterruptEvent {
        &self.interrupt
    }

    /// Sets or clears `bits`, then blocks until the posting thread's resumed
    /// flag matches the new effective state, or the thread has exited. A
    /// resume in progress is always waited out.
    ///
    /// Must not be called from the posting thread.
    pub fn update(&self, bits: PostThreadState, set: bool) {
        let mut state = self.state.lock();
        state.bits = state.bits.update(bits, set);

        let quit = state.bits.contains(PostThreadState::QUIT);
        let effective_suspend = state.bits.is_quiescent();
        if quit {
            state.quiescent = true;
            self.interrupt.signal();
            self.wait.notify_one();
        } else if effective_suspend && !state.quiescent {
            state.quiescent = true;
            self.interrupt.signal();
        } else if !effective_suspend && state.quiescent {
            state.quiescent = false;
            self.interrupt.clear();
            self.wait.notify_one();
        }

        self.ready.wait_while(&mut state, |s| {
            !s.exited && (s.resuming || s.resumed == effective_suspend)
        });
    }

    /// Parks the posting thread until it may run again.
    ///
    /// The thread calls this before its first active iteration and whenever
    /// it has torn down after turning quiescent. Publishes `resumed = false`
    /// first, so callers waiting for a pause are released even if the thread
    /// leaves again right away. Returns immediately with [`Park::Resumed`] if
    /// nothing is set; the thread then brings the display up and calls
    /// [`mark_resumed`](Self::mark_resumed).
    pub fn park(&self) -> Park {
        let mut state = self.state.lock();
        state.resumed = false;
        self.ready.notify_all();

        self.wait.wait_while(&mut state, |s| {
            s.quiescent && !s.bits.contains(PostThreadState::QUIT)
        });
        if state.bits.contains(PostThreadState::QUIT) {
            tracing::info!("post thread quitting");
            return Park::Quit;
        }

        state.resuming = true;
        Park::Resumed
    }

    /// Records that the posting thread has finished resuming, releasing
    /// callers waiting in [`update`](Self::update).
    pub fn mark_resumed(&self) {
        let mut state = self.state.lock();
        state.resuming = false;
        state.resumed = true;
        self.ready.notify_all();
    }

    /// Records that the posting thread is gone, releasing every waiter.
    ///
    /// Runs from a drop guard, so a panicking thread cannot leave callers
    /// blocked.
    pub fn mark_exited(&self) {
        let mut state = self.state.lock();
        state.resumed = false;
        state.resuming = false;
        state.exited = true;
        self.ready.notify_all();
    }

    /// Returns `true` if the posting thread should be parked.
    #[must_use]
    pub fn is_quiescent(&self) -> bool {
        self.state.lock().quiescent
    }

    /// Returns `true` if the posting thread is running.
    #[must_use]
    pub fn is_resumed(&self) -> bool {
        self.state.lock().resumed
    }

    /// Current state bits.
    #[must_use]
    pub fn bits(&self) -> PostThreadState {
        self.state.lock().bits
    }

    /// Replaces the pending surface list. Only the newest list survives.
    pub fn set_pending_surfaces(&self, surfaces: Vec<Arc<dyn DisplaySurface>>) {
        self.state.lock().pending_surfaces = Some(surfaces);
    }

    /// Takes the pending surface list, if one arrived since the last take.
    pub fn take_pending_surfaces(&self) -> Option<Vec<Arc<dyn DisplaySurface>>> {
        self.state.lock().pending_surfaces.take()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use hwpost_core::source::SurfaceId;
    use hwpost_core::testing::FakeSurface;

    use super::*;

    fn controller() -> Arc<PostThreadController> {
        Arc::new(PostThreadController::new(InterruptEvent::new().unwrap()))
    }

    /// A bare posting loop: park until active, otherwise idle briefly.
    fn spawn_loop(controller: Arc<PostThreadController>) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            let mut running = false;
            loop {
                if controller.is_quiescent() {
                    running = false;
                }
                if !running {
                    if controller.park() == Park::Quit {
                        return;
                    }
                    controller.mark_resumed();
                    running = true;
                }
                thread::sleep(Duration::from_millis(1));
            }
        })
    }

    #[test]
    fn starts_quiescent_with_interrupt_clear() {
        let controller = controller();
        assert!(controller.is_quiescent());
        assert!(!controller.is_resumed());
        assert_eq!(controller.bits(), PostThreadState::INITIAL);
        assert!(!controller.interrupt().is_signaled());
    }

    #[test]
    fn enable_and_disable_rendezvous() {
        let controller = controller();
        let thread = spawn_loop(controller.clone());

        controller.update(PostThreadState::IDLE, false);
        assert!(!controller.is_resumed(), "still suspended");

        controller.update(PostThreadState::SUSPENDED, false);
        assert!(controller.is_resumed());
        assert!(!controller.interrupt().is_signaled());

        controller.update(PostThreadState::SUSPENDED, true);
        assert!(!controller.is_resumed());
        assert!(controller.interrupt().is_signaled());

        controller.update(PostThreadState::SUSPENDED, false);
        assert!(controller.is_resumed());

        controller.update(PostThreadState::QUIT, true);
        assert!(!controller.is_resumed());
        thread.join().unwrap();
    }

    #[test]
    fn quit_releases_a_parked_thread() {
        let controller = controller();
        let thread = spawn_loop(controller.clone());
        controller.update(PostThreadState::QUIT, true);
        thread.join().unwrap();

        controller.update(PostThreadState::SUSPENDED, false);
        assert!(controller.bits().contains(PostThreadState::QUIT));
        assert!(!controller.is_resumed());
    }

    #[test]
    fn pending_surfaces_are_last_writer_wins() {
        let controller = controller();
        assert!(controller.take_pending_surfaces().is_none());

        controller.set_pending_surfaces(Vec::new());
        controller.set_pending_surfaces(vec![
            FakeSurface::new(SurfaceId(1), 0) as Arc<dyn DisplaySurface>,
        ]);
        let taken = controller.take_pending_surfaces().unwrap();
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].surface_id(), SurfaceId(1));
        assert!(controller.take_pending_surfaces().is_none());
    }

    #[test]
    fn exited_thread_releases_callers() {
        let controller = controller();
        let thread = {
            let controller = controller.clone();
            thread::spawn(move || {
                struct Exit(Arc<PostThreadController>);
                impl Drop for Exit {
                    fn drop(&mut self) {
                        self.0.mark_exited();
                    }
                }
                let _exit = Exit(controller);
            })
        };
        thread.join().unwrap();
        controller.update(PostThreadState::SUSPENDED, false);
        controller.update(PostThreadState::IDLE, false);
        assert!(!controller.is_resumed());
    }
}
