// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Test doubles for the composer HAL and client surfaces.
//!
//! Available with the `testing` feature (and always in this crate's own
//! tests).
//!
//! - [`FakeComposer`] records every state-changing HAL call as a [`Call`],
//!   hands out layer handles, and can be scripted to fail specific calls.
//! - [`FakeComposerFactory`] creates `FakeComposer`s and remembers them.
//! - [`FakeFence`] is a sync fence signaled by hand.
//! - [`FakeSurface`] is a client surface with a hand-fed buffer queue that
//!   logs every buffer released back to it.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::display::{DisplayId, DisplayMetrics, Dpi};
use crate::fence::{Fence, SyncFence};
use crate::hwc::{
    BlendMode, Color, Composer, ComposerFactory, Composition, ConfigId, DisplayAttribute, FRect,
    HwcCallback, HwcError, LayerHandle, NativeBufferHandle, PowerMode, Rect, ValidateOutcome,
};
use crate::source::{AcquiredBuffer, BufferId, DisplaySurface, GraphicBuffer, SurfaceId};

/// A state-changing call recorded by [`FakeComposer`].
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    /// `create_layer` returned this handle.
    CreateLayer(LayerHandle),
    /// `destroy_layer`.
    DestroyLayer(LayerHandle),
    /// `set_layer_blend_mode`.
    SetBlendMode(LayerHandle, BlendMode),
    /// `set_layer_z_order`.
    SetZOrder(LayerHandle, u32),
    /// `set_layer_display_frame`.
    SetDisplayFrame(LayerHandle, Rect),
    /// `set_layer_visible_region`.
    SetVisibleRegion(LayerHandle, Vec<Rect>),
    /// `set_layer_plane_alpha`.
    SetPlaneAlpha(LayerHandle, f32),
    /// `set_layer_composition_type`.
    SetCompositionType(LayerHandle, Composition),
    /// `set_layer_buffer`.
    SetBuffer {
        /// Target layer.
        layer: LayerHandle,
        /// Buffer slot.
        slot: u32,
        /// Handle passed, `None` on a cache hit.
        buffer: Option<NativeBufferHandle>,
        /// Whether a non-empty acquire fence was passed.
        has_fence: bool,
    },
    /// `set_layer_source_crop`.
    SetSourceCrop(LayerHandle, FRect),
    /// `set_layer_color`.
    SetColor(LayerHandle, Color),
    /// `validate_display`.
    ValidateDisplay,
    /// `accept_display_changes`.
    AcceptDisplayChanges,
    /// `present_display`.
    PresentDisplay,
    /// `set_vsync_enabled`.
    SetVsyncEnabled(bool),
    /// `set_power_mode`.
    SetPowerMode(PowerMode),
    /// `register_callback`.
    RegisterCallback,
}

struct ComposerState {
    calls: Vec<Call>,
    next_layer: u64,
    live_layers: BTreeSet<LayerHandle>,
    metrics: DisplayMetrics,
    active_config_error: Option<HwcError>,
    validate_error: Option<HwcError>,
    validate_outcome: ValidateOutcome,
    present_error: Option<HwcError>,
    present_fences: VecDeque<Fence>,
    present_count: u64,
    release_fences_for_all_layers: bool,
    vsync_enabled: bool,
    power_mode: Option<PowerMode>,
    callback: Option<Arc<dyn HwcCallback>>,
}

/// Recording composer HAL.
pub struct FakeComposer {
    state: Mutex<ComposerState>,
}

impl core::fmt::Debug for FakeComposer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FakeComposer")
            .field("calls", &state.calls.len())
            .field("live_layers", &state.live_layers)
            .field("present_count", &state.present_count)
            .finish_non_exhaustive()
    }
}

impl FakeComposer {
    /// Metrics reported by [`FakeComposer::new`]: 1440x1600 at 90 Hz.
    pub const DEFAULT_METRICS: DisplayMetrics = DisplayMetrics {
        width: 1440,
        height: 1600,
        dpi: Dpi {
            x: 615_000,
            y: 615_000,
        },
        vsync_period_ns: 11_111_111,
    };

    /// Creates a composer reporting [`DEFAULT_METRICS`](Self::DEFAULT_METRICS).
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_metrics(Self::DEFAULT_METRICS)
    }

    /// Creates a composer reporting `metrics` for every display.
    #[must_use]
    pub fn with_metrics(metrics: DisplayMetrics) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(ComposerState {
                calls: Vec::new(),
                next_layer: 1,
                live_layers: BTreeSet::new(),
                metrics,
                active_config_error: None,
                validate_error: None,
                validate_outcome: ValidateOutcome::Clean,
                present_error: None,
                present_fences: VecDeque::new(),
                present_count: 0,
                release_fences_for_all_layers: false,
                vsync_enabled: false,
                power_mode: None,
                callback: None,
            }),
        })
    }

    /// Returns and clears the recorded calls.
    pub fn take_calls(&self) -> Vec<Call> {
        core::mem::take(&mut self.state.lock().calls)
    }

    /// Returns the recorded calls without clearing them.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// HAL layers created and not yet destroyed.
    #[must_use]
    pub fn live_layers(&self) -> Vec<LayerHandle> {
        self.state.lock().live_layers.iter().copied().collect()
    }

    /// Makes `get_active_config` fail.
    pub fn fail_active_config(&self, error: Option<HwcError>) {
        self.state.lock().active_config_error = error;
    }

    /// Makes `validate_display` fail.
    pub fn fail_validate(&self, error: Option<HwcError>) {
        self.state.lock().validate_error = error;
    }

    /// Sets what a successful `validate_display` reports.
    pub fn set_validate_outcome(&self, outcome: ValidateOutcome) {
        self.state.lock().validate_outcome = outcome;
    }

    /// Makes `present_display` fail.
    pub fn fail_present(&self, error: Option<HwcError>) {
        self.state.lock().present_error = error;
    }

    /// Queues the fence returned by the next `present_display`. Without a
    /// queued fence, presents return an empty fence.
    pub fn queue_present_fence(&self, fence: Fence) {
        self.state.lock().present_fences.push_back(fence);
    }

    /// Makes `get_release_fences` return a signaled fence for every live
    /// layer.
    pub fn set_release_fences_for_all_layers(&self, enabled: bool) {
        self.state.lock().release_fences_for_all_layers = enabled;
    }

    /// Number of successful presents.
    #[must_use]
    pub fn present_count(&self) -> u64 {
        self.state.lock().present_count
    }

    /// Whether vsync callbacks are enabled.
    #[must_use]
    pub fn vsync_enabled(&self) -> bool {
        self.state.lock().vsync_enabled
    }

    /// Last power mode set.
    #[must_use]
    pub fn power_mode(&self) -> Option<PowerMode> {
        self.state.lock().power_mode
    }

    /// The registered HAL callback.
    #[must_use]
    pub fn callback(&self) -> Option<Arc<dyn HwcCallback>> {
        self.state.lock().callback.clone()
    }

    fn record(&self, call: Call) {
        self.state.lock().calls.push(call);
    }

    fn check_layer(&self, layer: LayerHandle) -> Result<(), HwcError> {
        if self.state.lock().live_layers.contains(&layer) {
            Ok(())
        } else {
            Err(HwcError::BadLayer)
        }
    }

    fn layer_call(&self, layer: LayerHandle, call: Call) -> Result<(), HwcError> {
        self.record(call);
        self.check_layer(layer)
    }
}

impl Composer for FakeComposer {
    fn get_active_config(&self, _display: DisplayId) -> Result<ConfigId, HwcError> {
        match self.state.lock().active_config_error {
            Some(err) => Err(err),
            None => Ok(ConfigId(1)),
        }
    }

    fn get_display_attribute(
        &self,
        display: DisplayId,
        _config: ConfigId,
        attribute: DisplayAttribute,
    ) -> Result<i32, HwcError> {
        if !display.is_physical() {
            return Err(HwcError::BadDisplay);
        }
        let metrics = self.state.lock().metrics;
        Ok(match attribute {
            DisplayAttribute::Width => metrics.width,
            DisplayAttribute::Height => metrics.height,
            DisplayAttribute::VsyncPeriod => {
                i32::try_from(metrics.vsync_period_ns).map_err(|_| HwcError::BadConfig)?
            }
            DisplayAttribute::DpiX => metrics.dpi.x,
            DisplayAttribute::DpiY => metrics.dpi.y,
        })
    }

    fn validate_display(&self, _display: DisplayId) -> Result<ValidateOutcome, HwcError> {
        self.record(Call::ValidateDisplay);
        let state = self.state.lock();
        match state.validate_error {
            Some(err) => Err(err),
            None => Ok(state.validate_outcome),
        }
    }

    fn accept_display_changes(&self, _display: DisplayId) -> Result<(), HwcError> {
        self.record(Call::AcceptDisplayChanges);
        Ok(())
    }

    fn set_vsync_enabled(&self, _display: DisplayId, enabled: bool) -> Result<(), HwcError> {
        let mut state = self.state.lock();
        state.calls.push(Call::SetVsyncEnabled(enabled));
        state.vsync_enabled = enabled;
        Ok(())
    }

    fn set_power_mode(&self, _display: DisplayId, mode: PowerMode) -> Result<(), HwcError> {
        let mut state = self.state.lock();
        state.calls.push(Call::SetPowerMode(mode));
        state.power_mode = Some(mode);
        Ok(())
    }

    fn present_display(&self, _display: DisplayId) -> Result<Fence, HwcError> {
        let mut state = self.state.lock();
        state.calls.push(Call::PresentDisplay);
        if let Some(err) = state.present_error {
            return Err(err);
        }
        state.present_count += 1;
        Ok(state.present_fences.pop_front().unwrap_or_default())
    }

    fn get_release_fences(
        &self,
        _display: DisplayId,
    ) -> Result<Vec<(LayerHandle, Fence)>, HwcError> {
        let state = self.state.lock();
        if !state.release_fences_for_all_layers {
            return Ok(Vec::new());
        }
        Ok(state
            .live_layers
            .iter()
            .map(|&layer| (layer, FakeFence::new(true).fence()))
            .collect())
    }

    fn create_layer(&self, _display: DisplayId) -> Result<LayerHandle, HwcError> {
        let mut state = self.state.lock();
        let layer = LayerHandle(state.next_layer);
        state.next_layer += 1;
        state.live_layers.insert(layer);
        state.calls.push(Call::CreateLayer(layer));
        Ok(layer)
    }

    fn destroy_layer(&self, _display: DisplayId, layer: LayerHandle) -> Result<(), HwcError> {
        let mut state = self.state.lock();
        state.calls.push(Call::DestroyLayer(layer));
        if state.live_layers.remove(&layer) {
            Ok(())
        } else {
            Err(HwcError::BadLayer)
        }
    }

    fn set_layer_blend_mode(
        &self,
        _display: DisplayId,
        layer: LayerHandle,
        mode: BlendMode,
    ) -> Result<(), HwcError> {
        self.layer_call(layer, Call::SetBlendMode(layer, mode))
    }

    fn set_layer_z_order(
        &self,
        _display: DisplayId,
        layer: LayerHandle,
        z_order: u32,
    ) -> Result<(), HwcError> {
        self.layer_call(layer, Call::SetZOrder(layer, z_order))
    }

    fn set_layer_display_frame(
        &self,
        _display: DisplayId,
        layer: LayerHandle,
        frame: Rect,
    ) -> Result<(), HwcError> {
        self.layer_call(layer, Call::SetDisplayFrame(layer, frame))
    }

    fn set_layer_visible_region(
        &self,
        _display: DisplayId,
        layer: LayerHandle,
        region: &[Rect],
    ) -> Result<(), HwcError> {
        self.layer_call(layer, Call::SetVisibleRegion(layer, region.to_vec()))
    }

    fn set_layer_plane_alpha(
        &self,
        _display: DisplayId,
        layer: LayerHandle,
        alpha: f32,
    ) -> Result<(), HwcError> {
        self.layer_call(layer, Call::SetPlaneAlpha(layer, alpha))
    }

    fn set_layer_composition_type(
        &self,
        _display: DisplayId,
        layer: LayerHandle,
        composition: Composition,
    ) -> Result<(), HwcError> {
        self.layer_call(layer, Call::SetCompositionType(layer, composition))
    }

    fn set_layer_buffer(
        &self,
        _display: DisplayId,
        layer: LayerHandle,
        slot: u32,
        buffer: Option<NativeBufferHandle>,
        acquire_fence: &Fence,
    ) -> Result<(), HwcError> {
        self.layer_call(
            layer,
            Call::SetBuffer {
                layer,
                slot,
                buffer,
                has_fence: !acquire_fence.is_none(),
            },
        )
    }

    fn set_layer_source_crop(
        &self,
        _display: DisplayId,
        layer: LayerHandle,
        crop: FRect,
    ) -> Result<(), HwcError> {
        self.layer_call(layer, Call::SetSourceCrop(layer, crop))
    }

    fn set_layer_color(
        &self,
        _display: DisplayId,
        layer: LayerHandle,
        color: Color,
    ) -> Result<(), HwcError> {
        self.layer_call(layer, Call::SetColor(layer, color))
    }

    fn register_callback(&self, callback: Arc<dyn HwcCallback>) {
        let mut state = self.state.lock();
        state.calls.push(Call::RegisterCallback);
        state.callback = Some(callback);
    }

    fn dump_debug_info(&self) -> String {
        let state = self.state.lock();
        format!(
            "FakeComposer: {} live layers, {} presents\n",
            state.live_layers.len(),
            state.present_count
        )
    }
}

/// Creates [`FakeComposer`]s and keeps every one it created.
#[derive(Debug)]
pub struct FakeComposerFactory {
    metrics: DisplayMetrics,
    created: Mutex<Vec<Arc<FakeComposer>>>,
}

impl FakeComposerFactory {
    /// Creates a factory whose composers report `metrics`.
    #[must_use]
    pub fn new(metrics: DisplayMetrics) -> Arc<Self> {
        Arc::new(Self {
            metrics,
            created: Mutex::new(Vec::new()),
        })
    }

    /// The most recently created composer.
    #[must_use]
    pub fn latest(&self) -> Option<Arc<FakeComposer>> {
        self.created.lock().last().cloned()
    }

    /// Number of composers created so far.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.created.lock().len()
    }
}

impl ComposerFactory for FakeComposerFactory {
    fn create_composer(&self) -> Arc<dyn Composer> {
        let composer = FakeComposer::with_metrics(self.metrics);
        self.created.lock().push(composer.clone());
        composer
    }
}

#[derive(Debug)]
struct FakeSyncFence(Arc<AtomicBool>);

impl SyncFence for FakeSyncFence {
    fn is_signaled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A fence signaled by hand. Every [`Fence`] made from it shares its state.
#[derive(Clone, Debug)]
pub struct FakeFence {
    signaled: Arc<AtomicBool>,
}

impl FakeFence {
    /// Creates a fence in the given state.
    #[must_use]
    pub fn new(signaled: bool) -> Self {
        Self {
            signaled: Arc::new(AtomicBool::new(signaled)),
        }
    }

    /// A [`Fence`] backed by this fake.
    #[must_use]
    pub fn fence(&self) -> Fence {
        Fence::new(FakeSyncFence(self.signaled.clone()))
    }

    /// Signals the fence.
    pub fn signal(&self) {
        self.signaled.store(true, Ordering::Release);
    }
}

type ReleaseLog = Arc<Mutex<Vec<(BufferId, bool)>>>;

struct FakeAcquired {
    buffer: GraphicBuffer,
    slot: u32,
    fence: Fence,
    released: ReleaseLog,
}

impl AcquiredBuffer for FakeAcquired {
    fn buffer(&self) -> &GraphicBuffer {
        &self.buffer
    }

    fn slot(&self) -> u32 {
        self.slot
    }

    fn claim_acquire_fence(&mut self) -> Fence {
        self.fence.take()
    }

    fn release(self: Box<Self>, release_fence: Fence) {
        self.released
            .lock()
            .push((self.buffer.id, !release_fence.is_none()));
    }
}

/// A client surface with a hand-fed buffer queue.
pub struct FakeSurface {
    id: SurfaceId,
    z_order: i32,
    queue: Mutex<VecDeque<FakeAcquired>>,
    released: ReleaseLog,
}

impl core::fmt::Debug for FakeSurface {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FakeSurface")
            .field("id", &self.id)
            .field("z_order", &self.z_order)
            .field("queued", &self.queue.lock().len())
            .finish_non_exhaustive()
    }
}

impl FakeSurface {
    /// Creates a surface with an empty queue.
    #[must_use]
    pub fn new(id: SurfaceId, z_order: i32) -> Arc<Self> {
        Arc::new(Self {
            id,
            z_order,
            queue: Mutex::new(VecDeque::new()),
            released: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Queues a buffer for the compositor to acquire.
    pub fn queue_buffer(&self, buffer: GraphicBuffer, slot: u32, acquire_fence: Fence) {
        self.queue.lock().push_back(FakeAcquired {
            buffer,
            slot,
            fence: acquire_fence,
            released: self.released.clone(),
        });
    }

    /// Buffers released back to this surface, with whether each release
    /// carried a fence.
    #[must_use]
    pub fn released(&self) -> Vec<(BufferId, bool)> {
        self.released.lock().clone()
    }
}

impl DisplaySurface for FakeSurface {
    fn surface_id(&self) -> SurfaceId {
        self.id
    }

    fn z_order(&self) -> i32 {
        self.z_order
    }

    fn is_buffer_available(&self) -> bool {
        !self.queue.lock().is_empty()
    }

    fn acquire_current_buffer(&self) -> Option<Box<dyn AcquiredBuffer>> {
        self.queue
            .lock()
            .pop_front()
            .map(|acquired| Box::new(acquired) as Box<dyn AcquiredBuffer>)
    }
}
