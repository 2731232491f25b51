// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runtime tuning of the posting thread.
//!
//! Another component writes [`ConfigRecord`]s into the config ring. The
//! posting thread polls the ring once per vsync and turns the newest record
//! into a [`PostThreadConfig`] with [`PostThreadConfig::from_record`], which
//! clamps every field into a range the frame loop can use safely.

use crate::time::Duration;

/// Raw record as written to the config ring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConfigRecord {
    /// Time before the next vsync at which layers are posted.
    pub frame_post_offset_ns: i64,
    /// Present fences allowed in flight before frames are dropped.
    pub allowed_pending_fence_count: i32,
}

impl Default for ConfigRecord {
    fn default() -> Self {
        let defaults = PostThreadConfig::DEFAULT;
        Self {
            frame_post_offset_ns: defaults.frame_post_offset.as_signed_nanos(),
            allowed_pending_fence_count: 1,
        }
    }
}

/// Validated posting-thread tuning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PostThreadConfig {
    /// Layers are posted this long before the next predicted vsync.
    pub frame_post_offset: Duration,
    /// A frame is dropped when more present fences than this are pending.
    pub allowed_pending_fence_count: usize,
}

impl PostThreadConfig {
    /// Upper bound for [`allowed_pending_fence_count`](Self::allowed_pending_fence_count).
    pub const MAX_ALLOWED_PENDING_FENCES: usize = 8;

    /// 4 ms post offset, one pending fence.
    pub const DEFAULT: Self = Self {
        frame_post_offset: Duration::from_millis(4),
        allowed_pending_fence_count: 1,
    };

    /// Validates a ring record against the display refresh period.
    ///
    /// The post offset is clamped to `[0, vsync_period]` and the fence count
    /// to `[0, MAX_ALLOWED_PENDING_FENCES]`.
    #[must_use]
    pub fn from_record(record: &ConfigRecord, vsync_period: Duration) -> Self {
        let offset = Duration::from_signed_nanos(record.frame_post_offset_ns).min(vsync_period);
        let fences = usize::try_from(record.allowed_pending_fence_count)
            .unwrap_or(0)
            .min(Self::MAX_ALLOWED_PENDING_FENCES);
        Self {
            frame_post_offset: offset,
            allowed_pending_fence_count: fences,
        }
    }
}

impl Default for PostThreadConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
