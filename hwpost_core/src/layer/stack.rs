// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The active layer stack.
//!
//! Layers are kept sorted by ascending surface id so the layer bound to a
//! surface is found by binary search. Relative z-order is a separate dense
//! ordinal assigned on every rebuild: the bottom layer is opaque, every layer
//! above it blends with coverage.
//!
//! # Rebuild
//!
//! [`LayerStack::update_config`] partitions the old stack explicitly. Layers
//! whose surface is still present are removed from the old vector and pushed
//! into the new one, keeping their HAL handles and buffer caches. Whatever is
//! left in the old vector is dropped at the end, destroying those HAL layers.

use std::sync::Arc;

use tracing::debug;

use super::{Layer, LayerContext};
use crate::hwc::{BlendMode, Composition, LayerHandle, Transform};
use crate::source::{BufferId, DisplaySurface, SurfaceId};

/// What a dump reports about one layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerSummary {
    /// Composition type last pushed to the HAL.
    pub composition: Composition,
    /// Bound surface id.
    pub surface_id: SurfaceId,
    /// Current buffer id.
    pub buffer_id: BufferId,
    /// Relative z-order.
    pub z_order: u32,
    /// HAL layer handle.
    pub handle: LayerHandle,
}

/// The layers currently shown on a display.
#[derive(Debug, Default)]
pub struct LayerStack {
    layers: Vec<Layer>,
    context: Option<LayerContext>,
}

impl LayerStack {
    /// Creates an empty stack with no composer attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches the composer client new layers are created on.
    pub fn set_context(&mut self, context: LayerContext) {
        self.context = Some(context);
    }

    /// Drops every layer, then detaches the composer client.
    pub fn clear_context(&mut self) {
        self.clear();
        self.context = None;
    }

    /// The attached context, if any.
    #[must_use]
    pub fn context(&self) -> Option<&LayerContext> {
        self.context.as_ref()
    }

    /// Drops every layer, destroying their HAL layers.
    pub fn clear(&mut self) {
        self.layers.clear();
    }

    /// Number of active layers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns `true` if no layers are active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Active layers in ascending surface id order.
    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    /// Mutable access to the active layers.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Layer> {
        self.layers.iter_mut()
    }

    /// Returns the index of the layer bound to `surface_id`.
    #[must_use]
    pub fn find(&self, surface_id: SurfaceId) -> Option<usize> {
        self.layers
            .binary_search_by_key(&surface_id, Layer::surface_id)
            .ok()
    }

    /// Returns the layer bound to `surface_id`.
    #[must_use]
    pub fn get(&self, surface_id: SurfaceId) -> Option<&Layer> {
        self.find(surface_id).map(|i| &self.layers[i])
    }

    /// Returns the layer owning the HAL layer `handle`.
    pub fn by_handle_mut(&mut self, handle: LayerHandle) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.handle() == handle)
    }

    /// Summaries of the active layers, for dumps.
    #[must_use]
    pub fn snapshot(&self) -> Vec<LayerSummary> {
        self.layers
            .iter()
            .map(|layer| LayerSummary {
                composition: layer.composition(),
                surface_id: layer.surface_id(),
                buffer_id: layer.buffer_id(),
                z_order: layer.z_order(),
                handle: layer.handle(),
            })
            .collect()
    }

    /// Rebuilds the stack from a new surface list.
    ///
    /// Returns `true` when the stack was rebuilt. Without an attached context
    /// no layers can be created, the list is discarded and `false` is
    /// returned.
    pub fn update_config(&mut self, mut surfaces: Vec<Arc<dyn DisplaySurface>>) -> bool {
        let Some(context) = self.context.clone() else {
            debug!(count = surfaces.len(), "no composer attached; surface list dropped");
            return false;
        };

        surfaces.sort_by_key(|s| s.z_order());

        let mut old = core::mem::take(&mut self.layers);
        let mut layers = Vec::with_capacity(surfaces.len());
        for (position, surface) in surfaces.into_iter().enumerate() {
            let z_order = u32::try_from(position).unwrap_or(u32::MAX);
            let blending = if position == 0 {
                BlendMode::None
            } else {
                BlendMode::Coverage
            };
            let surface_id = surface.surface_id();
            match old.binary_search_by_key(&surface_id, Layer::surface_id) {
                Ok(index) => {
                    let mut layer = old.remove(index);
                    layer.set_blending(blending);
                    layer.set_z_order(z_order);
                    layers.push(layer);
                }
                Err(_) => {
                    layers.push(Layer::new_surface(
                        context.clone(),
                        surface,
                        blending,
                        Transform::None,
                        Composition::Device,
                        z_order,
                    ));
                }
            }
        }

        layers.sort_by_key(Layer::surface_id);
        self.layers = layers;
        debug!(
            active = self.layers.len(),
            removed = old.len(),
            "layer stack rebuilt"
        );
        drop(old);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{DisplayId, DisplayMetrics};
    use crate::testing::{Call, FakeComposer, FakeSurface};

    fn stack(composer: &Arc<FakeComposer>) -> LayerStack {
        let mut stack = LayerStack::new();
        stack.set_context(LayerContext {
            composer: composer.clone(),
            display: DisplayId::PRIMARY,
            metrics: DisplayMetrics {
                width: 100,
                height: 100,
                vsync_period_ns: 16_666_667,
                ..Default::default()
            },
        });
        stack
    }

    fn surfaces(specs: &[(i32, i32)]) -> Vec<Arc<dyn DisplaySurface>> {
        specs
            .iter()
            .map(|&(id, z)| FakeSurface::new(SurfaceId(id), z) as Arc<dyn DisplaySurface>)
            .collect()
    }

    #[test]
    fn rebuild_sorts_by_surface_id_and_assigns_dense_z() {
        let composer = FakeComposer::new();
        let mut stack = stack(&composer);
        assert!(stack.update_config(surfaces(&[(30, 5), (10, 9), (20, -1)])));

        let ids: Vec<_> = stack.iter().map(|l| l.surface_id().0).collect();
        assert_eq!(ids, vec![10, 20, 30]);

        let z = |id| stack.get(SurfaceId(id)).map(Layer::z_order);
        assert_eq!(z(20), Some(0));
        assert_eq!(z(30), Some(1));
        assert_eq!(z(10), Some(2));

        let blend = |id| stack.get(SurfaceId(id)).map(Layer::blending);
        assert_eq!(blend(20), Some(BlendMode::None));
        assert_eq!(blend(30), Some(BlendMode::Coverage));
        assert_eq!(blend(10), Some(BlendMode::Coverage));
        assert!(
            stack
                .iter()
                .all(|l| l.target_composition() == Composition::Device)
        );
        assert!(
            stack.iter().all(|l| l.transform() == Transform::None),
            "surface layers are never transformed"
        );
    }

    #[test]
    fn surviving_layers_keep_their_handles() {
        let composer = FakeComposer::new();
        let mut stack = stack(&composer);
        stack.update_config(surfaces(&[(1, 0), (2, 1), (3, 2)]));
        let before_2 = stack.get(SurfaceId(2)).map(Layer::handle);
        let before_3 = stack.get(SurfaceId(3)).map(Layer::handle);
        let before_1 = stack.get(SurfaceId(1)).map(Layer::handle);
        composer.take_calls();

        stack.update_config(surfaces(&[(3, 0), (4, 1), (2, 2)]));
        assert_eq!(stack.get(SurfaceId(2)).map(Layer::handle), before_2);
        assert_eq!(stack.get(SurfaceId(3)).map(Layer::handle), before_3);
        assert!(stack.get(SurfaceId(1)).is_none());

        let calls = composer.take_calls();
        let destroyed: Vec<_> = calls
            .iter()
            .filter_map(|c| match c {
                Call::DestroyLayer(h) => Some(*h),
                _ => None,
            })
            .collect();
        assert_eq!(destroyed, before_1.into_iter().collect::<Vec<_>>());
        let created = calls
            .iter()
            .filter(|c| matches!(c, Call::CreateLayer(_)))
            .count();
        assert_eq!(created, 1, "only the new surface gets a HAL layer");

        assert_eq!(stack.get(SurfaceId(3)).map(Layer::blending), Some(BlendMode::None));
        assert_eq!(stack.get(SurfaceId(3)).map(Layer::z_order), Some(0));
    }

    #[test]
    fn empty_list_clears_stack() {
        let composer = FakeComposer::new();
        let mut stack = stack(&composer);
        stack.update_config(surfaces(&[(1, 0), (2, 1)]));
        assert!(stack.update_config(Vec::new()), "empty list is a real update");
        assert!(stack.is_empty());
        assert!(composer.live_layers().is_empty(), "all HAL layers destroyed");
    }

    #[test]
    fn without_context_nothing_is_created() {
        let composer = FakeComposer::new();
        let mut stack = LayerStack::new();
        assert!(!stack.update_config(surfaces(&[(1, 0)])));
        assert!(stack.is_empty());
        assert!(composer.take_calls().is_empty());
    }

    #[test]
    fn clear_context_destroys_layers() {
        let composer = FakeComposer::new();
        let mut stack = stack(&composer);
        stack.update_config(surfaces(&[(1, 0), (2, 1)]));
        assert_eq!(composer.live_layers().len(), 2);
        stack.clear_context();
        assert!(composer.live_layers().is_empty());
        assert!(stack.context().is_none());
    }

    #[test]
    fn snapshot_reports_layers() {
        let composer = FakeComposer::new();
        let mut stack = stack(&composer);
        stack.update_config(surfaces(&[(7, 0)]));
        let snapshot = stack.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].surface_id, SurfaceId(7));
        assert_eq!(snapshot[0].buffer_id, BufferId::NONE);
        assert_eq!(snapshot[0].composition, Composition::Invalid);
    }
}
