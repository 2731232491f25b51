// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Linux and Android posting thread for hwpost.
//!
//! This crate drives [`hwpost_core`] against a real display:
//!
//! - [`HardwareComposer`]: the thread-safe control surface. Reads display
//!   metrics, owns the posting thread, and exposes enable/disable, surface
//!   updates, vsync observers, shared rings, and dumps.
//! - The posting thread: sleeps on a monotonic `timerfd` until the predicted
//!   vsync, posts layers `frame_post_offset` before the next one, and parks
//!   on a condition variable while quiescent.
//! - [`ComposerCallback`]: receives HAL hotplug and vsync events and prefers
//!   the driver's sysfs `vsync_event` node when one exists.
//! - [`InterruptEvent`]: the `eventfd` that wakes every posting-thread sleep
//!   when the control state changes.
//!
//! Scheduler policy and performance profiles are platform specific; plug
//! them in through [`PostThreadHooks`].

#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod callback;
mod clock;
mod composer;
mod config;
mod controller;
mod dump;
mod event;
mod fence;
mod hooks;
mod post_thread;
mod sysfs;
mod timer;

pub use callback::{ComposerCallback, VsyncError};
pub use clock::now;
pub use composer::{
    GlobalBuffer, GlobalBufferError, GlobalBufferKey, HardwareComposer, InitError,
    RequestDisplayCallback, VsyncCallback,
};
pub use config::HardwareComposerConfig;
pub use controller::{Park, PostThreadController};
pub use event::InterruptEvent;
pub use fence::FdFence;
pub use hooks::{NoopHooks, PerformanceMode, PostThreadHooks};
pub use sysfs::{
    Backlight, DEFAULT_GRAPHICS_ROOT, VsyncEventNode, parse_vsync_event, vsync_event_path,
};
pub use timer::{SleepError, VsyncTimer, Wake};
