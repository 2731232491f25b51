// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property tests for vsync counting, backpressure and layer stack rebuilds.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use hwpost_core::display::{DisplayId, DisplayMetrics};
use hwpost_core::hwc::{BlendMode, LayerHandle};
use hwpost_core::layer::{LayerContext, LayerStack};
use hwpost_core::pipeline::{FrameOutcome, FramePipeline};
use hwpost_core::source::{DisplaySurface, SurfaceId};
use hwpost_core::testing::{FakeComposer, FakeFence, FakeSurface};
use hwpost_core::time::HostTime;
use hwpost_core::vsync::{VsyncObservation, VsyncPredictor};
use proptest::prelude::*;

fn context(composer: &Arc<FakeComposer>) -> LayerContext {
    LayerContext {
        composer: composer.clone(),
        display: DisplayId::PRIMARY,
        metrics: DisplayMetrics {
            width: 100,
            height: 100,
            vsync_period_ns: 11_111_111,
            ..Default::default()
        },
    }
}

/// Unique surface ids, each with an arbitrary client z-order.
fn surface_list() -> impl Strategy<Value = Vec<(i32, i32)>> {
    prop::collection::btree_map(0_i32..64, -10_i32..10, 0..12)
        .prop_map(|m| m.into_iter().collect())
}

fn surfaces(specs: &[(i32, i32)]) -> Vec<Arc<dyn DisplaySurface>> {
    specs
        .iter()
        .map(|&(id, z)| FakeSurface::new(SurfaceId(id), z) as Arc<dyn DisplaySurface>)
        .collect()
}

#[derive(Clone, Debug)]
enum FrameStep {
    Post,
    Signal(usize),
}

fn frame_step() -> impl Strategy<Value = FrameStep> {
    prop_oneof![
        3 => Just(FrameStep::Post),
        1 => (0_usize..16).prop_map(FrameStep::Signal),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    #[test]
    fn vsync_counter_advances_only_after_trusted_vsync(deltas in prop::collection::vec(-3_i64..4, 1..60)) {
        let mut predictor = VsyncPredictor::new();
        predictor.reset(HostTime(1_000));
        let mut timestamp: i64 = 1_000;
        let mut previous_count = predictor.vsync_count();
        let mut trusted = true;

        for delta in deltas {
            predictor.advance_count();
            let count = predictor.vsync_count();
            prop_assert!(count >= previous_count);
            prop_assert_eq!(count - previous_count, u32::from(trusted));
            previous_count = count;

            timestamp += delta;
            let before = predictor.last_vsync();
            let observed = predictor.observe(HostTime::from_signed_nanos(timestamp));
            let advanced = HostTime::from_signed_nanos(timestamp) > before;
            prop_assert_eq!(observed == VsyncObservation::Advanced, advanced);
            prop_assert!(predictor.prediction_interval() >= 1);
            trusted = advanced;
        }
    }

    #[test]
    fn pending_fences_stay_bounded(
        allowed in 0_usize..4,
        steps in prop::collection::vec(frame_step(), 1..80),
    ) {
        let composer = FakeComposer::new();
        let mut pipeline = FramePipeline::new();
        pipeline.layers_mut().set_context(context(&composer));
        let mut queued: VecDeque<FakeFence> = VecDeque::new();
        let mut in_flight: Vec<FakeFence> = Vec::new();
        let mut presents = 0_u64;
        let mut drops = 0_u64;

        for step in steps {
            match step {
                FrameStep::Signal(i) => {
                    if !in_flight.is_empty() {
                        in_flight[i % in_flight.len()].signal();
                    }
                }
                FrameStep::Post => {
                    let fence = FakeFence::new(false);
                    composer.queue_present_fence(fence.fence());
                    queued.push_back(fence);
                    match pipeline.post_layers(&*composer, DisplayId::PRIMARY, allowed) {
                        FrameOutcome::Presented { .. } => {
                            presents += 1;
                            in_flight.extend(queued.pop_front());
                        }
                        FrameOutcome::Dropped { pending_fences } => {
                            drops += 1;
                            prop_assert!(pending_fences > allowed);
                        }
                        other => prop_assert!(false, "unexpected outcome {other:?}"),
                    }
                    prop_assert!(pipeline.retire_fences().pending() <= allowed + 1);
                }
            }
        }
        prop_assert_eq!(composer.present_count(), presents);
        prop_assert_eq!(pipeline.frame_skip_count(), drops);
    }

    #[test]
    fn rebuild_assigns_dense_z_orders(specs in surface_list()) {
        let composer = FakeComposer::new();
        let mut stack = LayerStack::new();
        stack.set_context(context(&composer));
        prop_assert!(stack.update_config(surfaces(&specs)));

        let z_orders: BTreeSet<u32> = stack.iter().map(|l| l.z_order()).collect();
        let expected: BTreeSet<u32> = (0..u32::try_from(specs.len()).unwrap()).collect();
        prop_assert_eq!(&z_orders, &expected);

        let ids: Vec<i32> = stack.iter().map(|l| l.surface_id().0).collect();
        let mut sorted = ids.clone();
        sorted.sort_unstable();
        prop_assert_eq!(ids, sorted);

        if let Some(min_z) = specs.iter().map(|&(_, z)| z).min() {
            let bottom = stack.iter().find(|l| l.z_order() == 0).unwrap();
            let bottom_spec = specs.iter().find(|&&(id, _)| id == bottom.surface_id().0).unwrap();
            prop_assert_eq!(bottom_spec.1, min_z);
            prop_assert_eq!(bottom.blending(), BlendMode::None);
            prop_assert!(
                stack
                    .iter()
                    .filter(|l| l.z_order() != 0)
                    .all(|l| l.blending() == BlendMode::Coverage)
            );
        }
    }

    #[test]
    fn surviving_surfaces_keep_layer_handles(first in surface_list(), second in surface_list()) {
        let composer = FakeComposer::new();
        let mut stack = LayerStack::new();
        stack.set_context(context(&composer));
        stack.update_config(surfaces(&first));
        let before: BTreeMap<i32, LayerHandle> =
            stack.iter().map(|l| (l.surface_id().0, l.handle())).collect();

        stack.update_config(surfaces(&second));
        for layer in stack.iter() {
            if let Some(handle) = before.get(&layer.surface_id().0) {
                prop_assert_eq!(layer.handle(), *handle);
            }
        }

        let live: BTreeSet<LayerHandle> = composer.live_layers().into_iter().collect();
        let active: BTreeSet<LayerHandle> = stack.iter().map(|l| l.handle()).collect();
        prop_assert_eq!(live, active);
    }
}
