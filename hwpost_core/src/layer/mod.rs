// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compositor layers.
//!
//! A [`Layer`] is one HAL layer slot bound to one [`LayerSource`]. It owns:
//!
//! - The HAL layer handle, created in the constructor and destroyed in
//!   [`Drop`]. Moving a `Layer` moves the handle; there is no way to copy it.
//! - The HAL-visible attributes (blend mode, z-order, composition type). Blend
//!   mode and z-order changes are latched in `pending_visibility_settings` and
//!   pushed on the next [`prepare`](Layer::prepare).
//! - The acquire fence of the buffer prepared for the current frame.
//! - A slot to buffer-id map mirroring what the HAL has imported, so buffers
//!   the HAL already knows are passed by slot only.
//!
//! The composer client and display metrics are injected through a
//! [`LayerContext`]. [`LayerStack`] owns the active layers.

mod stack;

pub use stack::{LayerStack, LayerSummary};

use core::fmt;
use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{error, trace};

use crate::display::{DisplayId, DisplayMetrics};
use crate::fence::Fence;
use crate::hwc::{
    BlendMode, Color, Composer, Composition, FRect, HwcError, LayerHandle, Rect, Transform,
};
use crate::source::{
    BufferId, BufferSource, DisplaySurface, GraphicBuffer, LayerSource, SurfaceId, SurfaceSource,
};

/// Dependencies shared by every layer on a display.
#[derive(Clone)]
pub struct LayerContext {
    /// The composer client that owns the HAL layers.
    pub composer: Arc<dyn Composer>,
    /// The display the layers are shown on.
    pub display: DisplayId,
    /// Metrics of that display.
    pub metrics: DisplayMetrics,
}

impl fmt::Debug for LayerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerContext")
            .field("display", &self.display)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

/// One compositor slot on the display.
pub struct Layer {
    context: LayerContext,
    handle: LayerHandle,
    z_order: u32,
    blending: BlendMode,
    transform: Transform,
    composition: Composition,
    target_composition: Composition,
    source: LayerSource,
    acquire_fence: Fence,
    surface_rect_functions_applied: bool,
    pending_visibility_settings: bool,
    cached_buffers: BTreeMap<u32, BufferId>,
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("handle", &self.handle)
            .field("z_order", &self.z_order)
            .field("blending", &self.blending)
            .field("transform", &self.transform)
            .field("composition", &self.composition)
            .field("target_composition", &self.target_composition)
            .field("source", &self.source)
            .field("acquire_fence", &self.acquire_fence)
            .field(
                "surface_rect_functions_applied",
                &self.surface_rect_functions_applied,
            )
            .field(
                "pending_visibility_settings",
                &self.pending_visibility_settings,
            )
            .field("cached_buffers", &self.cached_buffers)
            .finish_non_exhaustive()
    }
}

impl Layer {
    /// Creates a layer showing buffers from `surface`.
    #[must_use]
    pub fn new_surface(
        context: LayerContext,
        surface: Arc<dyn DisplaySurface>,
        blending: BlendMode,
        transform: Transform,
        composition: Composition,
        z_order: u32,
    ) -> Self {
        let source = LayerSource::Surface(SurfaceSource::new(surface));
        Self::with_source(context, source, blending, transform, composition, z_order)
    }

    /// Creates a layer showing a single shared buffer.
    #[must_use]
    pub fn new_buffer(
        context: LayerContext,
        buffer: Option<GraphicBuffer>,
        blending: BlendMode,
        transform: Transform,
        composition: Composition,
        z_order: u32,
    ) -> Self {
        let source = LayerSource::Buffer(BufferSource::new(buffer));
        Self::with_source(context, source, blending, transform, composition, z_order)
    }

    fn with_source(
        context: LayerContext,
        source: LayerSource,
        blending: BlendMode,
        transform: Transform,
        composition: Composition,
        z_order: u32,
    ) -> Self {
        let handle = match context.composer.create_layer(context.display) {
            Ok(handle) => handle,
            Err(err) => {
                error!(%err, display = %context.display, "failed to create layer");
                LayerHandle::INVALID
            }
        };
        let mut layer = Self {
            context,
            handle,
            z_order,
            blending,
            transform,
            composition: Composition::Invalid,
            target_composition: composition,
            source,
            acquire_fence: Fence::none(),
            surface_rect_functions_applied: false,
            pending_visibility_settings: true,
            cached_buffers: BTreeMap::new(),
        };
        layer.update_layer_settings();
        layer
    }

    /// Replaces the buffer of a buffer-backed layer. Ignored for
    /// surface-backed layers.
    pub fn update_buffer(&mut self, buffer: Option<GraphicBuffer>) {
        if let LayerSource::Buffer(source) = &mut self.source {
            *source = BufferSource::new(buffer);
        }
    }

    /// Sets the blend mode, pushed to the HAL on the next prepare.
    pub fn set_blending(&mut self, blending: BlendMode) {
        if self.blending != blending {
            self.blending = blending;
            self.pending_visibility_settings = true;
        }
    }

    /// Sets the z-order, pushed to the HAL on the next prepare.
    pub fn set_z_order(&mut self, z_order: u32) {
        if self.z_order != z_order {
            self.z_order = z_order;
            self.pending_visibility_settings = true;
        }
    }

    /// Acquires this frame's buffer and brings the HAL layer state up to date.
    ///
    /// Until the first buffer arrives the layer is shown as a transparent
    /// solid color so it does not hold up presentation.
    pub fn prepare(&mut self) {
        let acquisition = self.source.acquire();
        let id = acquisition.buffer_id();
        let slot = acquisition.slot;
        self.acquire_fence = acquisition.fence;
        trace!(buffer_id = id.0, slot, "prepare layer");

        self.update_visibility_settings();

        let Some(handle) = acquisition.handle else {
            if self.composition == Composition::Invalid {
                self.composition = Composition::SolidColor;
                let result = self.context.composer.set_layer_composition_type(
                    self.context.display,
                    self.handle,
                    self.composition,
                );
                self.check("composition type", result);
                let result = self.context.composer.set_layer_color(
                    self.context.display,
                    self.handle,
                    Color::TRANSPARENT,
                );
                self.check("color", result);
            }
            return;
        };

        if self.composition != self.target_composition {
            self.composition = self.target_composition;
            let result = self.context.composer.set_layer_composition_type(
                self.context.display,
                self.handle,
                self.composition,
            );
            self.check("composition type", result);
        }

        let cached = self.check_and_update_cached_buffer(slot, id);
        let result = self.context.composer.set_layer_buffer(
            self.context.display,
            self.handle,
            slot,
            (!cached).then_some(handle),
            &self.acquire_fence,
        );
        self.check("buffer", result);

        if !self.surface_rect_functions_applied {
            let crop = FRect::new(
                0.0,
                0.0,
                acquisition.width as f32,
                acquisition.height as f32,
            );
            let result =
                self.context
                    .composer
                    .set_layer_source_crop(self.context.display, self.handle, crop);
            self.check("source crop", result);
            self.surface_rect_functions_applied = true;
        }
    }

    /// Hands the HAL's release fence for the presented buffer to the source.
    pub fn finish(&mut self, release_fence: Fence) {
        self.source.finish(release_fence);
    }

    /// Discards this frame: closes the acquire fence without presenting.
    pub fn drop_frame(&mut self) {
        self.acquire_fence.close();
    }

    /// Returns `true` if the HAL already holds buffer `id` in `slot`.
    /// Otherwise records the association (for non-negative ids) and returns
    /// `false`.
    pub fn check_and_update_cached_buffer(&mut self, slot: u32, id: BufferId) -> bool {
        if self.cached_buffers.get(&slot) == Some(&id) {
            return true;
        }
        if id.is_cacheable() {
            self.cached_buffers.insert(slot, id);
        }
        false
    }

    /// The HAL layer handle.
    #[must_use]
    pub fn handle(&self) -> LayerHandle {
        self.handle
    }

    /// Relative z-order among the active layers.
    #[must_use]
    pub fn z_order(&self) -> u32 {
        self.z_order
    }

    /// Current blend mode.
    #[must_use]
    pub fn blending(&self) -> BlendMode {
        self.blending
    }

    /// Layer transform.
    #[must_use]
    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Composition type last pushed to the HAL.
    #[must_use]
    pub fn composition(&self) -> Composition {
        self.composition
    }

    /// Composition type used once a buffer is available.
    #[must_use]
    pub fn target_composition(&self) -> Composition {
        self.target_composition
    }

    /// Bound surface id, or [`SurfaceId::NONE`].
    #[must_use]
    pub fn surface_id(&self) -> SurfaceId {
        self.source.surface_id()
    }

    /// Current buffer id, or [`BufferId::NONE`].
    #[must_use]
    pub fn buffer_id(&self) -> BufferId {
        self.source.buffer_id()
    }

    /// Current buffer, if any.
    #[must_use]
    pub fn buffer(&self) -> Option<&GraphicBuffer> {
        self.source.buffer()
    }

    /// Returns `true` for layers bound to a client surface.
    #[must_use]
    pub fn is_surface_backed(&self) -> bool {
        matches!(self.source, LayerSource::Surface(_))
    }

    /// Acquire fence of the buffer prepared for this frame.
    #[must_use]
    pub fn acquire_fence(&self) -> &Fence {
        &self.acquire_fence
    }

    fn update_visibility_settings(&mut self) {
        if !self.pending_visibility_settings {
            return;
        }
        self.pending_visibility_settings = false;
        let result = self.context.composer.set_layer_blend_mode(
            self.context.display,
            self.handle,
            self.blending,
        );
        self.check("blend mode", result);
        let result =
            self.context
                .composer
                .set_layer_z_order(self.context.display, self.handle, self.z_order);
        self.check("z-order", result);
    }

    fn update_layer_settings(&mut self) {
        self.update_visibility_settings();

        let DisplayMetrics { width, height, .. } = self.context.metrics;
        let full = Rect::new(0, 0, width, height);
        let composer = &self.context.composer;
        let display = self.context.display;
        self.check(
            "display frame",
            composer.set_layer_display_frame(display, self.handle, full),
        );
        self.check(
            "visible region",
            composer.set_layer_visible_region(display, self.handle, &[full]),
        );
        self.check(
            "plane alpha",
            composer.set_layer_plane_alpha(display, self.handle, 1.0),
        );
    }

    fn check(&self, what: &'static str, result: Result<(), HwcError>) {
        if let Err(err) = result {
            error!(%err, layer = ?self.handle, "failed to set layer {what}");
        }
    }
}

impl Drop for Layer {
    fn drop(&mut self) {
        if !self.handle.is_valid() {
            return;
        }
        if let Err(err) = self
            .context
            .composer
            .destroy_layer(self.context.display, self.handle)
        {
            error!(%err, layer = ?self.handle, "failed to destroy layer");
        }
        self.handle = LayerHandle::INVALID;
    }
}
