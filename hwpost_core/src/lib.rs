// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer stack, fences, and vsync prediction for hardware-composer posting.
//!
//! `hwpost_core` holds the platform-independent half of a compositor posting
//! pipeline: the data model and the per-frame algorithms that decide what to
//! hand to the hardware composer (HWC), when, and what to do when the display
//! falls behind. The posting thread, timers and driver plumbing live in
//! `hwpost_linux`.
//!
//! # Architecture
//!
//! Every iteration of the posting thread flows through these pieces:
//!
//! ```text
//!   VsyncPredictor::predicted_vsync() ──► sleep ──► advance_count()
//!                                                        │
//!        ┌───────────────────────────────────────────────┘
//!        ▼
//!   LayerStack::update_config()   (only when a new surface list arrived)
//!        │
//!        ▼
//!   FramePipeline::post_layers() ──► Layer::prepare() ──► Composer
//!        │                                                   │
//!        │          RetireFenceQueue ◄── present fence ◄─────┘
//!        ▼
//!   VsyncPredictor::observe(driver timestamp)
//! ```
//!
//! **[`hwc`]**: The [`Composer`](hwc::Composer) contract consumed from the
//! HAL, the [`HwcCallback`](hwc::HwcCallback) contract the HAL calls back
//! into, and the HAL value types.
//!
//! **[`layer`]**: [`Layer`](layer::Layer) owns one HAL layer handle and its
//! buffer cache; [`LayerStack`](layer::LayerStack) rebuilds the active set
//! from client surface lists while preserving surviving handles.
//!
//! **[`source`]**: Surface-backed and buffer-backed layer content.
//!
//! **[`fence`]**: Owned sync fences and the retire-fence queue that drives
//! backpressure.
//!
//! **[`pipeline`]**: [`FramePipeline::post_layers`](pipeline::FramePipeline::post_layers),
//! the per-frame prepare/validate/present/drop decision.
//!
//! **[`vsync`]**: Predictive vsync timing with correction from driver
//! timestamps.
//!
//! **[`config`]** / **[`ring`]**: Runtime tuning records and the broadcast
//! rings they travel through.
//!
//! **[`state`]**: Posting-thread state bits.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! posting-thread instrumentation, with zero-overhead
//! [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `testing` (disabled by default): Exposes the [`testing`] module with a
//!   recording fake composer, fake surfaces and fake fences.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod config;
pub mod display;
pub mod fence;
pub mod hwc;
pub mod layer;
pub mod pipeline;
pub mod ring;
pub mod source;
pub mod state;
pub mod time;
pub mod trace;
pub mod vsync;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
