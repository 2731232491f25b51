// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the posting thread.
//!
//! This module provides a [`TraceSink`] trait with one method per event the
//! posting thread emits. All method bodies default to no-ops, so implementing
//! only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing. When **on**, each
//! method performs a single `Option` branch before dispatching.
//!
//! Log output goes through the `tracing` crate independently of this module;
//! these events are for machine consumption (recording, Chrome traces).
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).

use crate::time::HostTime;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How a `post_layers` call ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameOutcomeKind {
    /// The frame was presented.
    Presented,
    /// The frame was dropped because too many present fences were pending.
    Dropped,
    /// Validation failed; nothing was presented.
    ValidateFailed,
    /// Present failed.
    PresentFailed,
}

/// Posting-thread power transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PowerTransition {
    /// HAL resources were brought up.
    Resumed,
    /// HAL resources were torn down.
    Paused,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when the vsync wait returns.
#[derive(Clone, Copy, Debug)]
pub struct VsyncWaitEvent {
    /// Vsync the thread slept towards.
    pub predicted: HostTime,
    /// When the wait returned.
    pub woke_at: HostTime,
    /// Whether a control-plane change cut the wait short.
    pub interrupted: bool,
}

/// Emitted after the newest driver vsync timestamp is folded in.
#[derive(Clone, Copy, Debug)]
pub struct VsyncEvent {
    /// Trusted vsync counter.
    pub vsync_count: u32,
    /// Driver timestamp.
    pub timestamp: HostTime,
    /// Whether the timestamp failed to advance.
    pub delayed: bool,
    /// Prediction interval after the observation.
    pub prediction_interval: u32,
}

/// Emitted after the layer stack is rebuilt.
#[derive(Clone, Copy, Debug)]
pub struct LayerConfigEvent {
    /// Number of active layers.
    pub layer_count: usize,
    /// When the rebuild happened.
    pub timestamp: HostTime,
}

/// Emitted after every `post_layers` call.
#[derive(Clone, Copy, Debug)]
pub struct FrameEvent {
    /// Trusted vsync counter for this iteration.
    pub vsync_count: u32,
    /// How the frame ended.
    pub outcome: FrameOutcomeKind,
    /// Present fences still pending after the frame.
    pub pending_fences: usize,
    /// Total dropped frames so far.
    pub frame_skip_count: u64,
    /// When the frame was posted.
    pub timestamp: HostTime,
}

/// Emitted when the posting thread resumes or pauses.
#[derive(Clone, Copy, Debug)]
pub struct PowerEvent {
    /// Direction of the transition.
    pub transition: PowerTransition,
    /// When it happened.
    pub timestamp: HostTime,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the posting thread.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about. Sinks run on the posting thread and
/// must not block.
pub trait TraceSink: Send {
    /// Called when the vsync wait returns.
    fn on_vsync_wait(&mut self, e: &VsyncWaitEvent) {
        _ = e;
    }

    /// Called after a driver vsync timestamp is observed.
    fn on_vsync(&mut self, e: &VsyncEvent) {
        _ = e;
    }

    /// Called after the layer stack is rebuilt.
    fn on_layer_config(&mut self, e: &LayerConfigEvent) {
        _ = e;
    }

    /// Called after every frame.
    fn on_frame(&mut self, e: &FrameEvent) {
        _ = e;
    }

    /// Called on resume and pause.
    fn on_power(&mut self, e: &PowerEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`VsyncWaitEvent`].
    #[inline]
    pub fn vsync_wait(&mut self, e: &VsyncWaitEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_vsync_wait(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`VsyncEvent`].
    #[inline]
    pub fn vsync(&mut self, e: &VsyncEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_vsync(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`LayerConfigEvent`].
    #[inline]
    pub fn layer_config(&mut self, e: &LayerConfigEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_layer_config(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`FrameEvent`].
    #[inline]
    pub fn frame(&mut self, e: &FrameEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_frame(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PowerEvent`].
    #[inline]
    pub fn power(&mut self, e: &PowerEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_power(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
