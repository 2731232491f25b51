// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame posting.
//!
//! [`FramePipeline`] owns the state the posting thread mutates every frame:
//! the [`LayerStack`], the [`RetireFenceQueue`] and the dropped-frame
//! counter. [`FramePipeline::post_layers`] runs one frame:
//!
//! 1. Prepare every layer (acquire buffers, push attribute changes).
//! 2. Validate the display, accepting any composition changes the HAL asks
//!    for. A validate error abandons the frame.
//! 3. Drain retired present fences from the front of the queue.
//! 4. If more present fences are pending than allowed, drop the frame: every
//!    layer closes its acquire fence and nothing is presented.
//! 5. Otherwise present, queue the present fence and hand the per-layer
//!    release fences back to their layers.
//!
//! HAL errors never escape; they are logged and reported in the returned
//! [`FrameOutcome`].

use tracing::{error, warn};

use crate::display::DisplayId;
use crate::fence::RetireFenceQueue;
use crate::hwc::{Composer, HwcError, ValidateOutcome};
use crate::layer::LayerStack;
use crate::trace::FrameOutcomeKind;

/// How a [`FramePipeline::post_layers`] call ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was presented.
    Presented {
        /// Number of release fences handed back to layers.
        release_fences: usize,
    },
    /// The frame was dropped under backpressure.
    Dropped {
        /// Present fences pending when the frame was dropped.
        pending_fences: usize,
    },
    /// Validation failed; nothing was presented.
    ValidateFailed(HwcError),
    /// Present failed.
    PresentFailed(HwcError),
}

impl FrameOutcome {
    /// The outcome without its payload, for tracing.
    #[must_use]
    pub const fn kind(&self) -> FrameOutcomeKind {
        match self {
            Self::Presented { .. } => FrameOutcomeKind::Presented,
            Self::Dropped { .. } => FrameOutcomeKind::Dropped,
            Self::ValidateFailed(_) => FrameOutcomeKind::ValidateFailed,
            Self::PresentFailed(_) => FrameOutcomeKind::PresentFailed,
        }
    }
}

/// Layer stack plus in-flight frame bookkeeping.
#[derive(Debug, Default)]
pub struct FramePipeline {
    layers: LayerStack,
    retire_fences: RetireFenceQueue,
    frame_skip_count: u64,
}

impl FramePipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The active layers.
    #[must_use]
    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    /// Mutable access to the active layers.
    pub fn layers_mut(&mut self) -> &mut LayerStack {
        &mut self.layers
    }

    /// Present fences of frames still in flight.
    #[must_use]
    pub fn retire_fences(&self) -> &RetireFenceQueue {
        &self.retire_fences
    }

    /// Mutable access to the in-flight present fences.
    pub fn retire_fences_mut(&mut self) -> &mut RetireFenceQueue {
        &mut self.retire_fences
    }

    /// Frames dropped under backpressure so far.
    #[must_use]
    pub fn frame_skip_count(&self) -> u64 {
        self.frame_skip_count
    }

    /// Closes all pending present fences and drops every layer.
    pub fn reset(&mut self) {
        self.retire_fences.clear();
        self.layers.clear();
    }

    /// Validates `display_id`, accepting HAL-requested changes.
    ///
    /// # Errors
    ///
    /// Returns the HAL error from validate or accept.
    pub fn validate(composer: &dyn Composer, display_id: DisplayId) -> Result<(), HwcError> {
        match composer.validate_display(display_id)? {
            ValidateOutcome::Clean => Ok(()),
            ValidateOutcome::HasChanges { .. } => composer.accept_display_changes(display_id),
        }
    }

    /// Posts one frame to `display_id`.
    ///
    /// A frame is dropped when more than `allowed_pending_fences` present
    /// fences are still pending after draining retired ones.
    pub fn post_layers(
        &mut self,
        composer: &dyn Composer,
        display_id: DisplayId,
        allowed_pending_fences: usize,
    ) -> FrameOutcome {
        for layer in self.layers.iter_mut() {
            layer.prepare();
        }

        if let Err(err) = Self::validate(composer, display_id) {
            error!(%err, display = %display_id, "validate failed; frame abandoned");
            return FrameOutcome::ValidateFailed(err);
        }

        self.retire_fences.drain_retired();
        let pending_fences = self.retire_fences.pending();
        if pending_fences > allowed_pending_fences {
            self.frame_skip_count += 1;
            warn!(
                pending_fences,
                allowed_pending_fences,
                frame_skip_count = self.frame_skip_count,
                "too many present fences pending; dropping frame"
            );
            for layer in self.layers.iter_mut() {
                layer.drop_frame();
            }
            return FrameOutcome::Dropped { pending_fences };
        }

        match composer.present_display(display_id) {
            Ok(fence) => self.retire_fences.push(fence),
            Err(err) => {
                error!(%err, display = %display_id, "present failed");
                return FrameOutcome::PresentFailed(err);
            }
        }

        let release_fences = match composer.get_release_fences(display_id) {
            Ok(fences) => fences,
            Err(err) => {
                error!(%err, display = %display_id, "failed to get release fences");
                Vec::new()
            }
        };
        let mut delivered = 0;
        for (handle, fence) in release_fences {
            if let Some(layer) = self.layers.by_handle_mut(handle) {
                layer.finish(fence);
                delivered += 1;
            }
        }
        FrameOutcome::Presented {
            release_fences: delivered,
        }
    }
}
