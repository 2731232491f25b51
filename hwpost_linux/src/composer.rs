// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The hardware composer orchestrator.
//!
//! [`HardwareComposer`] is the thread-safe control surface of the posting
//! pipeline. It reads the display metrics once in
//! [`initialize`](HardwareComposer::initialize), spawns the posting thread in
//! the suspended and idle state, and from then on only talks to that thread
//! through the [`PostThreadController`] and a few small mutex-guarded slots.
//!
//! # Lifecycle
//!
//! ```text
//!   new ──► initialize ──► Quiescent ◄──► Active
//!                              │
//!                            drop ──► Terminated
//! ```
//!
//! The thread is active only while it is enabled *and* has surfaces to show.
//! [`enable`](HardwareComposer::enable) and
//! [`disable`](HardwareComposer::disable) return only after the thread has
//! actually resumed or paused.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;

use hwpost_core::config::ConfigRecord;
use hwpost_core::display::{DisplayId, DisplayMetrics};
use hwpost_core::hwc::{Composer, ComposerFactory, HwcError};
use hwpost_core::layer::LayerSummary;
use hwpost_core::ring::{BroadcastRing, RingError};
use hwpost_core::source::DisplaySurface;
use hwpost_core::state::PostThreadState;
use hwpost_core::trace::TraceSink;
use hwpost_core::vsync::VsyncRecord;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::HardwareComposerConfig;
use crate::controller::PostThreadController;
use crate::dump::{DumpSnapshot, format_dump};
use crate::event::InterruptEvent;
use crate::hooks::{NoopHooks, PostThreadHooks};
use crate::post_thread::PostThread;

/// Called with `true` when the compositor needs the display and `false` when
/// it can hand it back.
pub type RequestDisplayCallback = Box<dyn Fn(bool) + Send + Sync>;

/// Called on the posting thread once per trusted vsync with
/// `(display, vsync_timestamp_ns, frame_time_estimate_ns, vsync_count)`.
/// Must not block.
pub type VsyncCallback = Box<dyn FnMut(DisplayId, i64, i64, u32) + Send>;

/// Errors from [`HardwareComposer::initialize`].
#[derive(Debug, Error)]
pub enum InitError {
    /// `initialize` already succeeded once.
    #[error("hardware composer already initialized")]
    AlreadyInitialized,
    /// The primary display's active config could not be read.
    #[error("failed to get active display config: {0}")]
    ActiveConfig(#[source] HwcError),
    /// A display attribute could not be read.
    #[error("failed to get display metrics: {0}")]
    DisplayMetrics(#[source] HwcError),
    /// The posting thread could not be spawned.
    #[error("failed to spawn post thread: {0}")]
    SpawnThread(#[source] std::io::Error),
}

/// Well-known shared buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GlobalBufferKey {
    /// Vsync records written every trusted vsync.
    VsyncRing,
    /// Runtime tuning records read every vsync.
    ConfigRing,
}

/// A mapped shared buffer, handed back to the other side of the ring.
#[derive(Clone, Debug)]
pub enum GlobalBuffer {
    /// Read [`VsyncRecord`]s from here.
    Vsync(Arc<BroadcastRing<VsyncRecord>>),
    /// Write [`ConfigRecord`]s here.
    Config(Arc<BroadcastRing<ConfigRecord>>),
}

/// Errors mapping a shared buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum GlobalBufferError {
    /// The buffer cannot hold a single record.
    #[error("global buffer has an invalid size")]
    InvalidSize(#[from] RingError),
}

/// Config ring plus the posting thread's read cursor.
#[derive(Debug, Default)]
pub(crate) struct ConfigRingSlot {
    ring: Option<Arc<BroadcastRing<ConfigRecord>>>,
    sequence: u32,
}

impl ConfigRingSlot {
    /// Returns the newest record not yet seen.
    pub(crate) fn poll(&mut self) -> Option<ConfigRecord> {
        self.ring.as_ref()?.newest(&mut self.sequence)
    }
}

/// What the posting thread publishes for other threads to read.
#[derive(Default)]
pub(crate) struct Published {
    pub(crate) composer: Option<Arc<dyn Composer>>,
    pub(crate) layers: Vec<LayerSummary>,
}

/// State shared between the [`HardwareComposer`] and its posting thread,
/// apart from the controller.
#[derive(Default)]
pub(crate) struct Shared {
    pub(crate) vsync_callback: Mutex<Option<VsyncCallback>>,
    pub(crate) vsync_ring: Mutex<Option<Arc<BroadcastRing<VsyncRecord>>>>,
    pub(crate) config_ring: Mutex<ConfigRingSlot>,
    pub(crate) frame_skip_count: AtomicU64,
    pub(crate) published: Mutex<Published>,
}

struct Runtime {
    controller: Arc<PostThreadController>,
    thread: Option<JoinHandle<()>>,
    metrics: DisplayMetrics,
    request_display: Option<RequestDisplayCallback>,
}

/// Posts client surfaces to the primary display through the composer HAL.
pub struct HardwareComposer {
    factory: Arc<dyn ComposerFactory>,
    config: HardwareComposerConfig,
    hooks: Option<Box<dyn PostThreadHooks>>,
    trace_sink: Option<Box<dyn TraceSink>>,
    shared: Arc<Shared>,
    runtime: Option<Runtime>,
}

impl core::fmt::Debug for HardwareComposer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HardwareComposer")
            .field("config", &self.config)
            .field("initialized", &self.is_initialized())
            .field("metrics", &self.metrics())
            .field("frame_skip_count", &self.frame_skip_count())
            .finish_non_exhaustive()
    }
}

impl HardwareComposer {
    /// Creates an uninitialized compositor.
    ///
    /// The posting thread creates its own composer clients through `factory`
    /// each time it takes ownership of the display.
    #[must_use]
    pub fn new(
        factory: Arc<dyn ComposerFactory>,
        config: HardwareComposerConfig,
        hooks: Box<dyn PostThreadHooks>,
    ) -> Self {
        Self {
            factory,
            config,
            hooks: Some(hooks),
            trace_sink: None,
            shared: Arc::new(Shared::default()),
            runtime: None,
        }
    }

    /// Creates an uninitialized compositor with [`NoopHooks`].
    #[must_use]
    pub fn with_config(factory: Arc<dyn ComposerFactory>, config: HardwareComposerConfig) -> Self {
        Self::new(factory, config, Box::new(NoopHooks))
    }

    /// Installs a sink for posting-thread trace events. Only takes effect
    /// before [`initialize`](Self::initialize).
    pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink>) {
        if self.runtime.is_some() {
            warn!("trace sink installed after initialize; ignored");
            return;
        }
        self.trace_sink = Some(sink);
    }

    /// Reads the primary display metrics from `composer` and spawns the
    /// posting thread, parked until [`enable`](Self::enable) is called and
    /// surfaces are set.
    ///
    /// # Errors
    ///
    /// [`InitError::AlreadyInitialized`] on a repeat call, or the HAL error
    /// that prevented reading the display configuration.
    ///
    /// # Panics
    ///
    /// Panics if the posting-thread interrupt eventfd cannot be created.
    pub fn initialize(
        &mut self,
        composer: &dyn Composer,
        request_display_callback: Option<RequestDisplayCallback>,
    ) -> Result<(), InitError> {
        if self.runtime.is_some() {
            error!("hardware composer already initialized");
            return Err(InitError::AlreadyInitialized);
        }

        let config_id = composer
            .get_active_config(DisplayId::PRIMARY)
            .map_err(|err| {
                error!(%err, "failed to get active display config");
                InitError::ActiveConfig(err)
            })?;
        let metrics = DisplayMetrics::query(composer, DisplayId::PRIMARY, config_id)
            .map_err(|err| {
                error!(%err, "failed to get display metrics");
                InitError::DisplayMetrics(err)
            })?;
        info!(
            width = metrics.width,
            height = metrics.height,
            vsync_period_ns = metrics.vsync_period_ns,
            dpi_x = metrics.dpi.x,
            dpi_y = metrics.dpi.y,
            "primary display metrics"
        );

        let interrupt = match InterruptEvent::new() {
            Ok(interrupt) => interrupt,
            Err(err) => panic!("failed to create post thread interrupt eventfd: {err}"),
        };
        let controller = Arc::new(PostThreadController::new(interrupt));

        let post_thread = PostThread::new(
            controller.clone(),
            self.shared.clone(),
            self.factory.clone(),
            self.config.clone(),
            self.hooks.take().unwrap_or_else(|| Box::new(NoopHooks)),
            self.trace_sink.take(),
            metrics,
        );
        let thread = std::thread::Builder::new()
            .name(self.config.thread_name.to_string())
            .spawn(move || post_thread.run())
            .map_err(InitError::SpawnThread)?;

        self.runtime = Some(Runtime {
            controller,
            thread: Some(thread),
            metrics,
            request_display: request_display_callback,
        });
        Ok(())
    }

    /// Returns `true` once [`initialize`](Self::initialize) has succeeded.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.runtime.is_some()
    }

    /// Native metrics of the primary display.
    #[must_use]
    pub fn metrics(&self) -> Option<DisplayMetrics> {
        self.runtime.as_ref().map(|r| r.metrics)
    }

    /// Frames dropped because the display fell behind.
    #[must_use]
    pub fn frame_skip_count(&self) -> u64 {
        self.shared.frame_skip_count.load(Ordering::Relaxed)
    }

    /// Returns `true` while the posting thread is running.
    #[must_use]
    pub fn is_resumed(&self) -> bool {
        self.runtime
            .as_ref()
            .is_some_and(|r| r.controller.is_resumed())
    }

    /// Lets the posting thread run, blocking until it has resumed if it also
    /// has surfaces to show.
    pub fn enable(&self) {
        self.update_post_thread_state(PostThreadState::SUSPENDED, false);
    }

    /// Parks the posting thread, blocking until it has released the display.
    pub fn disable(&self) {
        self.update_post_thread_state(PostThreadState::SUSPENDED, true);
    }

    fn update_post_thread_state(&self, bits: PostThreadState, set: bool) {
        match &self.runtime {
            Some(runtime) => runtime.controller.update(bits, set),
            None => warn!(?bits, set, "post thread state change before initialize; ignored"),
        }
    }

    /// Hands a new surface list to the posting thread.
    ///
    /// Only the newest list is used if several arrive between two vsyncs. An
    /// empty list parks the posting thread.
    pub fn set_display_surfaces(&self, surfaces: Vec<Arc<dyn DisplaySurface>>) {
        let Some(runtime) = &self.runtime else {
            warn!(count = surfaces.len(), "display surfaces set before initialize; ignored");
            return;
        };
        info!(count = surfaces.len(), "set display surfaces");
        let display_idle = surfaces.is_empty();
        runtime.controller.set_pending_surfaces(surfaces);

        if let Some(request_display) = &runtime.request_display {
            let owns_composer = !self.config.is_standalone_device
                || self.shared.published.lock().composer.is_none();
            if owns_composer {
                request_display(!display_idle);
            }
        }

        runtime
            .controller
            .update(PostThreadState::IDLE, display_idle);
    }

    /// Installs the per-vsync observer. Replaces any previous one.
    ///
    /// The observer runs on the posting thread and may itself call this to
    /// install its successor; the successor is used from the next vsync.
    pub fn set_vsync_callback(&self, callback: VsyncCallback) {
        *self.shared.vsync_callback.lock() = Some(callback);
    }

    /// Maps a shared ring of `capacity` records under `key`.
    ///
    /// The compositor allocates the ring itself rather than mapping memory
    /// provided by the caller. The returned [`GlobalBuffer`] is the caller's
    /// handle to it: vsync records are read from it and config records are
    /// written to it. Mapping a key again replaces the previous ring.
    ///
    /// # Errors
    ///
    /// [`GlobalBufferError::InvalidSize`] if `capacity` is zero.
    pub fn on_new_global_buffer(
        &self,
        key: GlobalBufferKey,
        capacity: usize,
    ) -> Result<GlobalBuffer, GlobalBufferError> {
        match key {
            GlobalBufferKey::VsyncRing => {
                let ring = Arc::new(BroadcastRing::new(capacity)?);
                *self.shared.vsync_ring.lock() = Some(ring.clone());
                Ok(GlobalBuffer::Vsync(ring))
            }
            GlobalBufferKey::ConfigRing => {
                let ring = Arc::new(BroadcastRing::new(capacity)?);
                *self.shared.config_ring.lock() = ConfigRingSlot {
                    ring: Some(ring.clone()),
                    sequence: BroadcastRing::<ConfigRecord>::INITIAL_SEQUENCE,
                };
                Ok(GlobalBuffer::Config(ring))
            }
        }
    }

    /// Unmaps the ring under `key`.
    pub fn on_deleted_global_buffer(&self, key: GlobalBufferKey) {
        match key {
            GlobalBufferKey::VsyncRing => *self.shared.vsync_ring.lock() = None,
            GlobalBufferKey::ConfigRing => {
                *self.shared.config_ring.lock() = ConfigRingSlot::default();
            }
        }
    }

    /// Human-readable state for bug reports.
    #[must_use]
    pub fn dump(&self) -> String {
        let Some(runtime) = &self.runtime else {
            return String::from("Hardware composer not initialized.\n");
        };
        let resumed = runtime.controller.is_resumed();
        let (layers, composer) = {
            let published = self.shared.published.lock();
            (published.layers.clone(), published.composer.clone())
        };
        format_dump(&DumpSnapshot {
            metrics: runtime.metrics,
            resumed,
            frame_skip_count: self.frame_skip_count(),
            layers,
            composer_dump: composer
                .filter(|_| resumed)
                .map(|c| c.dump_debug_info()),
        })
    }
}

impl Drop for HardwareComposer {
    fn drop(&mut self) {
        let Some(runtime) = &mut self.runtime else {
            return;
        };
        runtime.controller.update(PostThreadState::QUIT, true);
        if let Some(thread) = runtime.thread.take()
            && thread.join().is_err()
        {
            error!("post thread panicked");
        }
    }
}
