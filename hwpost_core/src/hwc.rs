// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hardware composer contract.
//!
//! The composer HAL is an external service. This module describes the subset
//! of it that the posting pipeline consumes:
//!
//! - **[`Composer`]**: the client-side command interface (display queries,
//!   validate/present, per-layer state).
//! - **[`HwcCallback`]**: the callback interface the HAL invokes for
//!   hotplug, refresh and vsync events.
//! - **[`ComposerFactory`]**: creates fresh composer clients. Phones tear the
//!   client down while the display is off and create a new one on resume.
//!
//! The value types mirror the HAL's enumerations. Status codes other than
//! success map to [`HwcError`].

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::display::DisplayId;
use crate::fence::Fence;

/// Identifies a display configuration reported by the HAL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConfigId(pub u32);

/// Opaque HAL layer handle.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LayerHandle(pub u64);

impl LayerHandle {
    /// The handle value the HAL never hands out.
    pub const INVALID: Self = Self(0);

    /// Returns `true` unless this is [`LayerHandle::INVALID`].
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Debug for LayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LayerHandle({:#x})", self.0)
    }
}

/// Opaque native buffer handle passed to `set_layer_buffer`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NativeBufferHandle(pub u64);

/// How a layer is blended with the layers below it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Not yet set.
    #[default]
    Invalid,
    /// Opaque; no blending.
    None,
    /// Source is premultiplied by its alpha.
    Premultiplied,
    /// Source alpha is coverage.
    Coverage,
}

/// How the HAL composes a layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Composition {
    /// Not yet set.
    #[default]
    Invalid,
    /// Composed by the client into the client target.
    Client,
    /// Composed by display hardware.
    Device,
    /// Filled with a solid color.
    SolidColor,
    /// Hardware cursor.
    Cursor,
    /// Sideband stream.
    Sideband,
}

impl Composition {
    /// Returns the name used in dumps.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Invalid => "Invalid",
            Self::Client => "Client",
            Self::Device => "Device",
            Self::SolidColor => "SolidColor",
            Self::Cursor => "Cursor",
            Self::Sideband => "Sideband",
        }
    }
}

/// Display or layer transform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Transform {
    /// No transform.
    #[default]
    None,
    /// Horizontal flip.
    FlipH,
    /// Vertical flip.
    FlipV,
    /// 90 degree rotation.
    Rot90,
    /// 180 degree rotation.
    Rot180,
    /// 270 degree rotation.
    Rot270,
}

/// Display power state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PowerMode {
    /// Panel off.
    Off,
    /// Low-power ambient mode.
    Doze,
    /// Fully on.
    On,
    /// Low-power ambient mode with display updates suspended.
    DozeSuspend,
}

/// Whether a display was connected or disconnected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Connection {
    /// The display is now attached.
    Connected,
    /// The display was removed.
    Disconnected,
}

/// Display attributes queryable through [`Composer::get_display_attribute`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DisplayAttribute {
    /// Width in pixels.
    Width,
    /// Height in pixels.
    Height,
    /// Vsync period in nanoseconds.
    VsyncPeriod,
    /// Horizontal dots per thousand inches.
    DpiX,
    /// Vertical dots per thousand inches.
    DpiY,
}

/// Integer rectangle in display coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    /// Left edge.
    pub left: i32,
    /// Top edge.
    pub top: i32,
    /// Right edge (exclusive).
    pub right: i32,
    /// Bottom edge (exclusive).
    pub bottom: i32,
}

impl Rect {
    /// Creates a rectangle from its edges.
    #[must_use]
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }
}

/// Floating-point rectangle in buffer coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct FRect {
    /// Left edge.
    pub left: f32,
    /// Top edge.
    pub top: f32,
    /// Right edge.
    pub right: f32,
    /// Bottom edge.
    pub bottom: f32,
}

impl FRect {
    /// Creates a rectangle from its edges.
    #[must_use]
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }
}

/// 8-bit RGBA color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Color {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// Alpha.
    pub a: u8,
}

impl Color {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };
}

/// Result of [`Composer::validate_display`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValidateOutcome {
    /// The HAL accepted the layer configuration as-is.
    Clean,
    /// The HAL wants to change composition types or has layer requests. The
    /// changes must be accepted before presenting.
    HasChanges {
        /// Number of layers whose composition type changed.
        num_types: u32,
        /// Number of layer requests.
        num_requests: u32,
    },
}

/// Errors reported by the composer HAL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum HwcError {
    /// Invalid configuration handle.
    #[error("bad config")]
    BadConfig,
    /// Invalid display handle.
    #[error("bad display")]
    BadDisplay,
    /// Invalid layer handle.
    #[error("bad layer")]
    BadLayer,
    /// Invalid argument.
    #[error("bad parameter")]
    BadParameter,
    /// The HAL ran out of resources.
    #[error("no resources")]
    NoResources,
    /// `present_display` was called without a successful validate.
    #[error("display not validated")]
    NotValidated,
    /// The operation is not supported by this HAL.
    #[error("unsupported")]
    Unsupported,
    /// A status code this crate does not model.
    #[error("unknown HAL error {0}")]
    Unknown(i32),
}

/// Client-side interface to the hardware composer.
///
/// Every method is a synchronous HAL call. Implementations must be callable
/// from the posting thread while other threads hold clones of the same
/// `Arc<dyn Composer>` for dumping.
pub trait Composer: Send + Sync {
    /// Returns the active configuration of `display`.
    fn get_active_config(&self, display: DisplayId) -> Result<ConfigId, HwcError>;

    /// Returns one attribute of `config` on `display`.
    fn get_display_attribute(
        &self,
        display: DisplayId,
        config: ConfigId,
        attribute: DisplayAttribute,
    ) -> Result<i32, HwcError>;

    /// Validates the current layer state of `display`.
    fn validate_display(&self, display: DisplayId) -> Result<ValidateOutcome, HwcError>;

    /// Accepts the changes reported by the last validate.
    fn accept_display_changes(&self, display: DisplayId) -> Result<(), HwcError>;

    /// Enables or disables vsync callbacks for `display`.
    fn set_vsync_enabled(&self, display: DisplayId, enabled: bool) -> Result<(), HwcError>;

    /// Sets the power mode of `display`.
    fn set_power_mode(&self, display: DisplayId, mode: PowerMode) -> Result<(), HwcError>;

    /// Presents the validated frame and returns its present (retire) fence.
    fn present_display(&self, display: DisplayId) -> Result<Fence, HwcError>;

    /// Returns the release fences for the layers of the last presented frame.
    fn get_release_fences(&self, display: DisplayId)
    -> Result<Vec<(LayerHandle, Fence)>, HwcError>;

    /// Creates a HAL layer on `display`.
    fn create_layer(&self, display: DisplayId) -> Result<LayerHandle, HwcError>;

    /// Destroys a HAL layer.
    fn destroy_layer(&self, display: DisplayId, layer: LayerHandle) -> Result<(), HwcError>;

    /// Sets the blend mode of a layer.
    fn set_layer_blend_mode(
        &self,
        display: DisplayId,
        layer: LayerHandle,
        mode: BlendMode,
    ) -> Result<(), HwcError>;

    /// Sets the z-order of a layer.
    fn set_layer_z_order(
        &self,
        display: DisplayId,
        layer: LayerHandle,
        z_order: u32,
    ) -> Result<(), HwcError>;

    /// Sets the display frame of a layer.
    fn set_layer_display_frame(
        &self,
        display: DisplayId,
        layer: LayerHandle,
        frame: Rect,
    ) -> Result<(), HwcError>;

    /// Sets the visible region of a layer.
    fn set_layer_visible_region(
        &self,
        display: DisplayId,
        layer: LayerHandle,
        region: &[Rect],
    ) -> Result<(), HwcError>;

    /// Sets the plane alpha of a layer.
    fn set_layer_plane_alpha(
        &self,
        display: DisplayId,
        layer: LayerHandle,
        alpha: f32,
    ) -> Result<(), HwcError>;

    /// Sets the composition type of a layer.
    fn set_layer_composition_type(
        &self,
        display: DisplayId,
        layer: LayerHandle,
        composition: Composition,
    ) -> Result<(), HwcError>;

    /// Sets the buffer of a layer.
    ///
    /// A `None` handle tells the HAL to reuse the buffer it already imported
    /// into `slot`.
    fn set_layer_buffer(
        &self,
        display: DisplayId,
        layer: LayerHandle,
        slot: u32,
        buffer: Option<NativeBufferHandle>,
        acquire_fence: &Fence,
    ) -> Result<(), HwcError>;

    /// Sets the source crop of a layer.
    fn set_layer_source_crop(
        &self,
        display: DisplayId,
        layer: LayerHandle,
        crop: FRect,
    ) -> Result<(), HwcError>;

    /// Sets the solid color of a layer.
    fn set_layer_color(
        &self,
        display: DisplayId,
        layer: LayerHandle,
        color: Color,
    ) -> Result<(), HwcError>;

    /// Registers the HAL event callback.
    fn register_callback(&self, callback: Arc<dyn HwcCallback>);

    /// Returns the HAL's own debug dump.
    fn dump_debug_info(&self) -> String;
}

/// Events delivered by the composer HAL.
///
/// Called on HAL binder threads, never on the posting thread.
pub trait HwcCallback: Send + Sync {
    /// A display was connected or disconnected.
    fn on_hotplug(&self, display: DisplayId, connection: Connection);

    /// The HAL asks for the display to be refreshed.
    fn on_refresh(&self, display: DisplayId);

    /// A hardware vsync occurred at `timestamp_ns` on the monotonic clock.
    fn on_vsync(&self, display: DisplayId, timestamp_ns: i64);
}

/// Creates composer clients.
pub trait ComposerFactory: Send + Sync {
    /// Connects a new composer client.
    fn create_composer(&self) -> Arc<dyn Composer>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_layer_handle() {
        assert!(!LayerHandle::INVALID.is_valid(), "zero is never a HAL layer");
        assert!(LayerHandle(3).is_valid(), "non-zero handles are valid");
        assert_eq!(format!("{:?}", LayerHandle(255)), "LayerHandle(0xff)");
    }

    #[test]
    fn composition_names() {
        assert_eq!(Composition::SolidColor.name(), "SolidColor");
        assert_eq!(Composition::default(), Composition::Invalid);
        assert_eq!(BlendMode::default(), BlendMode::Invalid);
    }

    #[test]
    fn error_display() {
        assert_eq!(HwcError::BadDisplay.to_string(), "bad display");
        assert_eq!(HwcError::Unknown(-22).to_string(), "unknown HAL error -22");
    }
}
