// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Content sources for layers.
//!
//! A layer is bound to exactly one [`LayerSource`] for its lifetime:
//!
//! - **Surface-backed** ([`SurfaceSource`]): pulls buffers from a client
//!   [`DisplaySurface`] queue. A new buffer is acquired only when the queue
//!   has one; otherwise the previous buffer is shown again with no acquire
//!   fence. The previous acquisition is released back to its producer, with
//!   the release fence the HAL returned for it, when the next one arrives.
//! - **Buffer-backed** ([`BufferSource`]): shows a single shared
//!   [`GraphicBuffer`] that the owner replaces with `Layer::update_buffer`.
//!
//! Both variants answer [`LayerSource::acquire`] with an [`Acquisition`].

use core::fmt;
use std::sync::Arc;

use crate::fence::Fence;
use crate::hwc::NativeBufferHandle;

/// Identifies a client display surface.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceId(pub i32);

impl SurfaceId {
    /// Reported by layers without a surface.
    pub const NONE: Self = Self(-1);
}

impl fmt::Debug for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SurfaceId({})", self.0)
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a graphic buffer. Negative ids are never cached.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferId(pub i32);

impl BufferId {
    /// Reported when no buffer has arrived yet.
    pub const NONE: Self = Self(-1);

    /// Returns `true` for ids the HAL buffer cache may remember.
    #[inline]
    #[must_use]
    pub const fn is_cacheable(self) -> bool {
        self.0 >= 0
    }
}

impl fmt::Debug for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BufferId({})", self.0)
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A graphic buffer as seen by the compositor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GraphicBuffer {
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
    /// Stable buffer id.
    pub id: BufferId,
    /// Native handle imported by the HAL.
    pub handle: NativeBufferHandle,
}

/// A buffer acquired from a [`DisplaySurface`] queue.
pub trait AcquiredBuffer: Send {
    /// The acquired buffer.
    fn buffer(&self) -> &GraphicBuffer;

    /// The HAL buffer slot this buffer occupies.
    fn slot(&self) -> u32;

    /// Transfers the acquire fence out. Subsequent calls return an empty
    /// fence.
    fn claim_acquire_fence(&mut self) -> Fence;

    /// Returns the buffer to its producer, signaling reuse with
    /// `release_fence`.
    fn release(self: Box<Self>, release_fence: Fence);
}

/// A client surface shown directly on the display.
pub trait DisplaySurface: Send + Sync {
    /// Stable surface id.
    fn surface_id(&self) -> SurfaceId;

    /// Client-declared z-order. Only the relative order matters.
    fn z_order(&self) -> i32;

    /// Returns `true` if a new buffer is queued.
    fn is_buffer_available(&self) -> bool;

    /// Acquires the newest queued buffer.
    fn acquire_current_buffer(&self) -> Option<Box<dyn AcquiredBuffer>>;
}

/// What a source hands to the layer for one frame.
#[derive(Debug, Default)]
pub struct Acquisition {
    /// Buffer width, or 0 without a buffer.
    pub width: i32,
    /// Buffer height, or 0 without a buffer.
    pub height: i32,
    /// Buffer id, or [`BufferId::NONE`].
    pub id: Option<BufferId>,
    /// Native handle, or `None` if no buffer has arrived yet.
    pub handle: Option<NativeBufferHandle>,
    /// Acquire fence; empty when re-showing a previous buffer.
    pub fence: Fence,
    /// HAL buffer slot.
    pub slot: u32,
}

impl Acquisition {
    /// The id to report, [`BufferId::NONE`] without a buffer.
    #[must_use]
    pub fn buffer_id(&self) -> BufferId {
        self.id.unwrap_or(BufferId::NONE)
    }
}

/// Surface-backed layer content.
pub struct SurfaceSource {
    surface: Arc<dyn DisplaySurface>,
    acquired: Option<Box<dyn AcquiredBuffer>>,
    release_fence: Fence,
}

impl fmt::Debug for SurfaceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceSource")
            .field("surface_id", &self.surface.surface_id())
            .field("acquired", &self.acquired.as_ref().map(|b| *b.buffer()))
            .field("release_fence", &self.release_fence)
            .finish()
    }
}

impl SurfaceSource {
    /// Binds a source to `surface`. Nothing is acquired until the first
    /// [`acquire`](Self::acquire).
    #[must_use]
    pub fn new(surface: Arc<dyn DisplaySurface>) -> Self {
        Self {
            surface,
            acquired: None,
            release_fence: Fence::none(),
        }
    }

    /// Acquires the newest buffer if one is queued, otherwise re-shows the
    /// previous one with an empty fence.
    pub fn acquire(&mut self) -> Acquisition {
        let mut fence = Fence::none();
        if self.surface.is_buffer_available() {
            if let Some(previous) = self.acquired.take() {
                previous.release(self.release_fence.take());
            }
            self.acquired = self.surface.acquire_current_buffer();
            if let Some(acquired) = &mut self.acquired {
                fence = acquired.claim_acquire_fence();
            }
        }

        match &self.acquired {
            Some(acquired) => {
                let buffer = acquired.buffer();
                Acquisition {
                    width: buffer.width,
                    height: buffer.height,
                    id: Some(buffer.id),
                    handle: Some(buffer.handle),
                    fence,
                    slot: acquired.slot(),
                }
            }
            None => Acquisition::default(),
        }
    }

    /// Stores the release fence for the current acquisition.
    pub fn finish(&mut self, release_fence: Fence) {
        self.release_fence = release_fence;
    }

    /// The current buffer, if any.
    #[must_use]
    pub fn buffer(&self) -> Option<&GraphicBuffer> {
        self.acquired.as_deref().map(AcquiredBuffer::buffer)
    }

    /// The bound surface.
    #[must_use]
    pub fn surface(&self) -> &Arc<dyn DisplaySurface> {
        &self.surface
    }
}

impl Drop for SurfaceSource {
    fn drop(&mut self) {
        if let Some(acquired) = self.acquired.take() {
            acquired.release(self.release_fence.take());
        }
    }
}

/// Buffer-backed layer content.
#[derive(Clone, Copy, Debug, Default)]
pub struct BufferSource {
    buffer: Option<GraphicBuffer>,
}

impl BufferSource {
    /// Shows `buffer`, or nothing.
    #[must_use]
    pub const fn new(buffer: Option<GraphicBuffer>) -> Self {
        Self { buffer }
    }

    /// Returns the buffer with an empty fence in slot 0.
    #[must_use]
    pub fn acquire(&self) -> Acquisition {
        match self.buffer {
            Some(buffer) => Acquisition {
                width: buffer.width,
                height: buffer.height,
                id: Some(buffer.id),
                handle: Some(buffer.handle),
                fence: Fence::none(),
                slot: 0,
            },
            None => Acquisition::default(),
        }
    }

    /// The shown buffer, if any.
    #[must_use]
    pub const fn buffer(&self) -> Option<&GraphicBuffer> {
        self.buffer.as_ref()
    }
}

/// The content bound to a layer.
#[derive(Debug)]
pub enum LayerSource {
    /// Pulls buffers from a client surface queue.
    Surface(SurfaceSource),
    /// Shows a shared buffer.
    Buffer(BufferSource),
}

impl LayerSource {
    /// Acquires content for the next frame.
    pub fn acquire(&mut self) -> Acquisition {
        match self {
            Self::Surface(source) => source.acquire(),
            Self::Buffer(source) => source.acquire(),
        }
    }

    /// Hands the HAL's release fence for the last presented buffer back to
    /// the source. Buffer-backed sources have no producer to notify.
    pub fn finish(&mut self, release_fence: Fence) {
        match self {
            Self::Surface(source) => source.finish(release_fence),
            Self::Buffer(_) => {}
        }
    }

    /// The current buffer, if any.
    #[must_use]
    pub fn buffer(&self) -> Option<&GraphicBuffer> {
        match self {
            Self::Surface(source) => source.buffer(),
            Self::Buffer(source) => source.buffer(),
        }
    }

    /// The bound surface id, or [`SurfaceId::NONE`] for buffer-backed layers.
    #[must_use]
    pub fn surface_id(&self) -> SurfaceId {
        match self {
            Self::Surface(source) => source.surface().surface_id(),
            Self::Buffer(_) => SurfaceId::NONE,
        }
    }

    /// The current buffer id, or [`BufferId::NONE`].
    #[must_use]
    pub fn buffer_id(&self) -> BufferId {
        self.buffer().map_or(BufferId::NONE, |b| b.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeFence, FakeSurface};

    fn buffer(id: i32) -> GraphicBuffer {
        GraphicBuffer {
            width: 64,
            height: 32,
            id: BufferId(id),
            handle: NativeBufferHandle(0x1000 + id as u64),
        }
    }

    #[test]
    fn surface_source_without_buffers() {
        let surface = FakeSurface::new(SurfaceId(4), 0);
        let mut source = SurfaceSource::new(surface);
        let acq = source.acquire();
        assert!(acq.handle.is_none(), "no buffer has arrived");
        assert_eq!(acq.buffer_id(), BufferId::NONE);
        assert_eq!((acq.width, acq.height), (0, 0));
    }

    #[test]
    fn surface_source_reuses_previous_buffer_without_fence() {
        let surface = FakeSurface::new(SurfaceId(1), 0);
        let fence = FakeFence::new(false);
        surface.queue_buffer(buffer(7), 2, fence.fence());
        let mut source = SurfaceSource::new(surface.clone());

        let first = source.acquire();
        assert_eq!(first.buffer_id(), BufferId(7));
        assert_eq!(first.slot, 2);
        assert!(!first.fence.is_none(), "new buffer carries its acquire fence");

        let second = source.acquire();
        assert_eq!(second.buffer_id(), BufferId(7), "previous buffer re-shown");
        assert!(second.fence.is_none(), "re-shown buffer has no fence");
        assert!(surface.released().is_empty(), "nothing released yet");
    }

    #[test]
    fn surface_source_releases_previous_with_release_fence() {
        let surface = FakeSurface::new(SurfaceId(1), 0);
        surface.queue_buffer(buffer(1), 0, Fence::none());
        let mut source = SurfaceSource::new(surface.clone());
        let _ = source.acquire();

        let release = FakeFence::new(false);
        source.finish(release.fence());
        surface.queue_buffer(buffer(2), 1, Fence::none());
        let acq = source.acquire();

        assert_eq!(acq.buffer_id(), BufferId(2));
        let released = surface.released();
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].0, BufferId(1));
        assert!(released[0].1, "release fence was passed to the producer");
    }

    #[test]
    fn surface_source_drop_releases_current() {
        let surface = FakeSurface::new(SurfaceId(1), 0);
        surface.queue_buffer(buffer(3), 0, Fence::none());
        let mut source = SurfaceSource::new(surface.clone());
        let _ = source.acquire();
        drop(source);
        assert_eq!(surface.released().len(), 1, "drop returns the buffer");
    }

    #[test]
    fn buffer_source_reports_slot_zero() {
        let mut source = LayerSource::Buffer(BufferSource::new(Some(buffer(9))));
        let acq = source.acquire();
        assert_eq!(acq.slot, 0);
        assert_eq!(acq.buffer_id(), BufferId(9));
        assert!(acq.fence.is_none(), "shared buffers have no acquire fence");
        assert_eq!(source.surface_id(), SurfaceId::NONE);
        assert_eq!(source.buffer_id(), BufferId(9));
    }

    #[test]
    fn buffer_id_cacheability() {
        assert!(BufferId(0).is_cacheable(), "zero is a real id");
        assert!(!BufferId::NONE.is_cacheable(), "negative ids are not cached");
    }
}
