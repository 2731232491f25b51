// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The posting thread.
//!
//! One iteration per display refresh:
//!
//! 1. Pick up the newest runtime config.
//! 2. If quiescent: tear down (once), park, and on wake bring the composer
//!    back up and re-derive the vsync baseline from the clock.
//! 3. Sleep until the predicted vsync. An interrupt restarts the iteration.
//! 4. Advance the vsync counter if the prediction is trusted and rebuild the
//!    layer stack if a new surface list arrived.
//! 5. On trusted iterations, publish a vsync record and call the vsync
//!    observer.
//! 6. Sleep until `frame_post_offset` before the vsync after the predicted
//!    one. An interrupt restarts the iteration, validating first if the layer
//!    configuration changed.
//! 7. Fold in the newest driver vsync timestamp and post the layers.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use hwpost_core::config::PostThreadConfig;
use hwpost_core::display::{DisplayId, DisplayMetrics};
use hwpost_core::hwc::{Composer, ComposerFactory, PowerMode};
use hwpost_core::layer::LayerContext;
use hwpost_core::pipeline::FramePipeline;
use hwpost_core::time::HostTime;
use hwpost_core::trace::{
    FrameEvent, LayerConfigEvent, PowerEvent, PowerTransition, TraceSink, Tracer, VsyncEvent,
    VsyncWaitEvent,
};
use hwpost_core::vsync::{VsyncObservation, VsyncPredictor, VsyncRecord};
use tracing::{debug, error, info, warn};

use crate::callback::ComposerCallback;
use crate::clock;
use crate::composer::Shared;
use crate::config::HardwareComposerConfig;
use crate::controller::{Park, PostThreadController};
use crate::hooks::{PerformanceMode, PostThreadHooks};
use crate::sysfs::Backlight;
use crate::timer::{VsyncTimer, Wake};

const DISPLAY: DisplayId = DisplayId::PRIMARY;

/// Photon offsets published with every vsync record.
#[derive(Clone, Copy, Debug)]
struct PhotonOffsets {
    left_eye_ns: i64,
    right_eye_ns: i64,
}

pub(crate) struct PostThread {
    controller: Arc<PostThreadController>,
    shared: Arc<Shared>,
    factory: Arc<dyn ComposerFactory>,
    config: HardwareComposerConfig,
    hooks: Box<dyn PostThreadHooks>,
    trace_sink: Option<Box<dyn TraceSink>>,
    metrics: DisplayMetrics,
    composer: Option<Arc<dyn Composer>>,
    callback: Option<Arc<ComposerCallback>>,
    pipeline: FramePipeline,
    predictor: VsyncPredictor,
    post_config: PostThreadConfig,
    backlight: Option<Backlight>,
    thread_policy_set: bool,
}

/// Releases control callers if the posting thread leaves for any reason.
struct ExitGuard(Arc<PostThreadController>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.0.mark_exited();
    }
}

impl PostThread {
    pub(crate) fn new(
        controller: Arc<PostThreadController>,
        shared: Arc<Shared>,
        factory: Arc<dyn ComposerFactory>,
        config: HardwareComposerConfig,
        hooks: Box<dyn PostThreadHooks>,
        trace_sink: Option<Box<dyn TraceSink>>,
        metrics: DisplayMetrics,
    ) -> Self {
        Self {
            controller,
            shared,
            factory,
            config,
            hooks,
            trace_sink,
            metrics,
            composer: None,
            callback: None,
            pipeline: FramePipeline::new(),
            predictor: VsyncPredictor::new(),
            post_config: PostThreadConfig::DEFAULT,
            backlight: None,
            thread_policy_set: false,
        }
    }

    fn tracer(&mut self) -> Tracer<'_> {
        match self.trace_sink.as_deref_mut() {
            Some(sink) => Tracer::new(sink),
            None => Tracer::none(),
        }
    }

    pub(crate) fn run(mut self) {
        let _exit = ExitGuard(self.controller.clone());

        let timer = match VsyncTimer::new() {
            Ok(timer) => timer,
            Err(err) => panic!("failed to create vsync sleep timerfd: {err}"),
        };

        self.thread_policy_set = self.hooks.set_thread_policy();
        if !self.thread_policy_set {
            warn!("failed to set post thread policy; retrying on resume");
        }

        if let Some(path) = &self.config.backlight_path {
            match Backlight::open(path) {
                Ok(backlight) => self.backlight = Some(backlight),
                Err(err) => warn!(%err, path = %path.display(), "failed to open backlight control"),
            }
        }

        let offsets = PhotonOffsets {
            left_eye_ns: self.metrics.left_eye_photon_offset_ns(),
            right_eye_ns: self
                .config
                .right_eye_offset_ns
                .unwrap_or_else(|| self.metrics.default_right_eye_photon_offset_ns()),
        };
        let period = self.metrics.vsync_period();
        let mut was_running = false;

        loop {
            self.update_config_buffer();

            if was_running && self.controller.is_quiescent() {
                info!("entering quiescent state");
                self.on_paused();
                was_running = false;
            }
            if !was_running {
                if self.controller.park() == Park::Quit {
                    return;
                }
                info!("exiting quiescent state");
                self.on_resumed();
                self.controller.mark_resumed();
                was_running = true;
                self.predictor.reset(clock::now());
            }

            let Some(vsync_timestamp) = self.wait_for_vsync(&timer) else {
                continue;
            };

            let trusted = self.predictor.advance_count();
            let layer_config_changed = self.update_layer_config();
            if trusted {
                self.publish_vsync(vsync_timestamp, offsets);
            }

            let wakeup = vsync_timestamp
                .saturating_add(period)
                .saturating_sub(self.post_config.frame_post_offset);
            if wakeup > clock::now() {
                match timer.sleep_until(wakeup, self.controller.interrupt()) {
                    Ok(Wake::Elapsed) => {}
                    Ok(Wake::Interrupted) => {
                        if layer_config_changed {
                            self.validate();
                        }
                        continue;
                    }
                    Err(err) => error!(%err, "failed to sleep until frame post time"),
                }
            }

            self.observe_vsync();
            self.post_layers();
        }
    }

    fn update_config_buffer(&mut self) {
        let Some(record) = self.shared.config_ring.lock().poll() else {
            return;
        };
        let config = PostThreadConfig::from_record(&record, self.metrics.vsync_period());
        if config != self.post_config {
            debug!(
                frame_post_offset_ns = config.frame_post_offset.nanos(),
                allowed_pending_fence_count = config.allowed_pending_fence_count,
                "post thread config updated"
            );
        }
        self.post_config = config;
    }

    fn on_resumed(&mut self) {
        if !self.config.is_standalone_device || self.composer.is_none() {
            let composer = self.factory.create_composer();
            let callback = Arc::new(ComposerCallback::new(
                self.config.sysfs_graphics_root.clone(),
            ));
            composer.register_callback(callback.clone());
            self.pipeline.layers_mut().set_context(LayerContext {
                composer: composer.clone(),
                display: DISPLAY,
                metrics: self.metrics,
            });
            self.callback = Some(callback);
            self.composer = Some(composer);
        } else {
            self.set_power_mode(PowerMode::On);
        }

        self.enable_vsync(true);

        if let Some(backlight) = &self.backlight
            && let Err(err) = backlight.set_brightness(Backlight::MAX_BRIGHTNESS)
        {
            warn!(%err, "failed to set backlight brightness");
        }

        self.hooks
            .set_performance_mode(PerformanceMode::Performance);

        if !self.thread_policy_set {
            self.thread_policy_set = self.hooks.set_thread_policy();
        }

        self.publish_state();
        let timestamp = clock::now();
        self.tracer().power(&PowerEvent {
            transition: PowerTransition::Resumed,
            timestamp,
        });
    }

    fn on_paused(&mut self) {
        self.pipeline.reset();
        self.enable_vsync(false);

        if self.config.is_standalone_device {
            self.set_power_mode(PowerMode::Off);
        } else {
            self.pipeline.layers_mut().clear_context();
            self.callback = None;
            self.composer = None;
        }

        self.hooks.set_performance_mode(PerformanceMode::Idle);

        self.publish_state();
        let timestamp = clock::now();
        self.tracer().power(&PowerEvent {
            transition: PowerTransition::Paused,
            timestamp,
        });
    }

    fn enable_vsync(&self, enabled: bool) {
        if let Some(composer) = &self.composer
            && let Err(err) = composer.set_vsync_enabled(DISPLAY, enabled)
        {
            error!(%err, enabled, "failed to set vsync enabled");
        }
    }

    fn set_power_mode(&self, mode: PowerMode) {
        if let Some(composer) = &self.composer
            && let Err(err) = composer.set_power_mode(DISPLAY, mode)
        {
            error!(%err, ?mode, "failed to set power mode");
        }
    }

    fn validate(&self) {
        if let Some(composer) = &self.composer
            && let Err(err) = FramePipeline::validate(&**composer, DISPLAY)
        {
            error!(%err, "validate after layer config change failed");
        }
    }

    /// Sleeps until the predicted vsync. Returns it, or `None` if the sleep
    /// was interrupted or failed.
    fn wait_for_vsync(&mut self, timer: &VsyncTimer) -> Option<HostTime> {
        let predicted = self
            .predictor
            .predicted_vsync(self.metrics.vsync_period());
        let result = timer.sleep_until(predicted, self.controller.interrupt());
        let woke_at = clock::now();
        self.tracer().vsync_wait(&VsyncWaitEvent {
            predicted,
            woke_at,
            interrupted: result == Ok(Wake::Interrupted),
        });
        match result {
            Ok(Wake::Elapsed) => Some(predicted),
            Ok(Wake::Interrupted) => None,
            Err(err) => {
                error!(%err, "failed to wait for vsync");
                None
            }
        }
    }

    fn update_layer_config(&mut self) -> bool {
        let Some(surfaces) = self.controller.take_pending_surfaces() else {
            return false;
        };
        let changed = self.pipeline.layers_mut().update_config(surfaces);
        if changed {
            debug!(layers = self.pipeline.layers().len(), "layer config updated");
            self.publish_state();
            let event = LayerConfigEvent {
                layer_count: self.pipeline.layers().len(),
                timestamp: clock::now(),
            };
            self.tracer().layer_config(&event);
        }
        changed
    }

    fn publish_vsync(&mut self, vsync_timestamp: HostTime, offsets: PhotonOffsets) {
        let vsync_count = self.predictor.vsync_count();
        let timestamp_ns = vsync_timestamp.as_signed_nanos();
        if let Some(ring) = &*self.shared.vsync_ring.lock() {
            ring.publish(VsyncRecord {
                vsync_count,
                vsync_timestamp_ns: timestamp_ns,
                vsync_left_eye_offset_ns: offsets.left_eye_ns,
                vsync_right_eye_offset_ns: offsets.right_eye_ns,
                vsync_period_ns: self.metrics.vsync_period_ns,
            });
        }
        // Invoked outside the lock so the callback may install a replacement.
        let taken = self.shared.vsync_callback.lock().take();
        if let Some(mut callback) = taken {
            callback(DISPLAY, timestamp_ns, 0, vsync_count);
            let mut slot = self.shared.vsync_callback.lock();
            if slot.is_none() {
                *slot = Some(callback);
            }
        }
    }

    fn observe_vsync(&mut self) {
        let last = self.predictor.last_vsync();
        let timestamp = match &self.callback {
            Some(callback) => match callback.vsync_time(DISPLAY) {
                Ok(ns) => HostTime::from_signed_nanos(ns),
                Err(_) => last,
            },
            None => last,
        };

        let observation = self.predictor.observe(timestamp);
        if let VsyncObservation::Delayed {
            prediction_interval,
        } = observation
        {
            warn!(
                timestamp = timestamp.nanos(),
                prediction_interval, "vsync timestamp did not advance since last frame"
            );
        }
        let event = VsyncEvent {
            vsync_count: self.predictor.vsync_count(),
            timestamp,
            delayed: observation != VsyncObservation::Advanced,
            prediction_interval: self.predictor.prediction_interval(),
        };
        self.tracer().vsync(&event);
    }

    fn post_layers(&mut self) {
        let Some(composer) = self.composer.clone() else {
            return;
        };
        let outcome = self.pipeline.post_layers(
            &*composer,
            DISPLAY,
            self.post_config.allowed_pending_fence_count,
        );
        let frame_skip_count = self.pipeline.frame_skip_count();
        self.shared
            .frame_skip_count
            .store(frame_skip_count, Ordering::Relaxed);
        self.publish_state();

        let event = FrameEvent {
            vsync_count: self.predictor.vsync_count(),
            outcome: outcome.kind(),
            pending_fences: self.pipeline.retire_fences().pending(),
            frame_skip_count,
            timestamp: clock::now(),
        };
        self.tracer().frame(&event);
    }

    /// Publishes the composer and layer summaries for dumps and display
    /// requests.
    fn publish_state(&self) {
        let mut published = self.shared.published.lock();
        published.composer.clone_from(&self.composer);
        published.layers = self.pipeline.layers().snapshot();
    }
}
