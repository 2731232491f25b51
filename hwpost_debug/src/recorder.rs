// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`].
//!
//! The sink is `Send` and only appends to a vector, so it is safe to install
//! on the posting thread. Hand the bytes out through a shared handle (see
//! [`SharedRecorder`]) to read them while the thread keeps running.

use std::sync::Arc;

use hwpost_core::time::HostTime;
use hwpost_core::trace::{
    FrameEvent, FrameOutcomeKind, LayerConfigEvent, PowerEvent, PowerTransition, TraceSink,
    VsyncEvent, VsyncWaitEvent,
};
use parking_lot::Mutex;

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_VSYNC_WAIT: u8 = 1;
const TAG_VSYNC: u8 = 2;
const TAG_LAYER_CONFIG: u8 = 3;
const TAG_FRAME: u8 = 4;
const TAG_POWER: u8 = 5;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    fn write_count(&mut self, v: usize) {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "counts capped at u32::MAX for recording"
        )]
        self.write_u32(v.min(u32::MAX as usize) as u32);
    }

    fn write_outcome(&mut self, o: FrameOutcomeKind) {
        self.write_u8(match o {
            FrameOutcomeKind::Presented => 0,
            FrameOutcomeKind::Dropped => 1,
            FrameOutcomeKind::ValidateFailed => 2,
            FrameOutcomeKind::PresentFailed => 3,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_vsync_wait(&mut self, e: &VsyncWaitEvent) {
        self.write_u8(TAG_VSYNC_WAIT);
        self.write_u64(e.predicted.nanos());
        self.write_u64(e.woke_at.nanos());
        self.write_bool(e.interrupted);
    }

    fn on_vsync(&mut self, e: &VsyncEvent) {
        self.write_u8(TAG_VSYNC);
        self.write_u32(e.vsync_count);
        self.write_u64(e.timestamp.nanos());
        self.write_bool(e.delayed);
        self.write_u32(e.prediction_interval);
    }

    fn on_layer_config(&mut self, e: &LayerConfigEvent) {
        self.write_u8(TAG_LAYER_CONFIG);
        self.write_count(e.layer_count);
        self.write_u64(e.timestamp.nanos());
    }

    fn on_frame(&mut self, e: &FrameEvent) {
        self.write_u8(TAG_FRAME);
        self.write_u32(e.vsync_count);
        self.write_outcome(e.outcome);
        self.write_count(e.pending_fences);
        self.write_u64(e.frame_skip_count);
        self.write_u64(e.timestamp.nanos());
    }

    fn on_power(&mut self, e: &PowerEvent) {
        self.write_u8(TAG_POWER);
        self.write_u8(match e.transition {
            PowerTransition::Resumed => 0,
            PowerTransition::Paused => 1,
        });
        self.write_u64(e.timestamp.nanos());
    }
}

// ---------------------------------------------------------------------------
// SharedRecorder
// ---------------------------------------------------------------------------

/// A cloneable handle to a [`RecorderSink`].
///
/// Install one clone as the posting thread's sink and keep another to take
/// snapshots.
#[derive(Clone, Debug, Default)]
pub struct SharedRecorder {
    inner: Arc<Mutex<RecorderSink>>,
}

impl SharedRecorder {
    /// Creates an empty shared recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies out everything recorded so far.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.inner.lock().as_bytes().to_vec()
    }

    fn with(&self, f: impl FnOnce(&mut RecorderSink)) {
        f(&mut self.inner.lock());
    }
}

impl TraceSink for SharedRecorder {
    fn on_vsync_wait(&mut self, e: &VsyncWaitEvent) {
        self.with(|r| r.on_vsync_wait(e));
    }

    fn on_vsync(&mut self, e: &VsyncEvent) {
        self.with(|r| r.on_vsync(e));
    }

    fn on_layer_config(&mut self, e: &LayerConfigEvent) {
        self.with(|r| r.on_layer_config(e));
    }

    fn on_frame(&mut self, e: &FrameEvent) {
        self.with(|r| r.on_frame(e));
    }

    fn on_power(&mut self, e: &PowerEvent) {
        self.with(|r| r.on_power(e));
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`VsyncWaitEvent`].
    VsyncWait(VsyncWaitEvent),
    /// A [`VsyncEvent`].
    Vsync(VsyncEvent),
    /// A [`LayerConfigEvent`].
    LayerConfig(LayerConfigEvent),
    /// A [`FrameEvent`].
    Frame(FrameEvent),
    /// A [`PowerEvent`].
    Power(PowerEvent),
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?.try_into().ok()?;
        self.pos += N;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[v]| v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_le_bytes)
    }

    fn read_bool(&mut self) -> Option<bool> {
        Some(self.read_u8()? != 0)
    }

    fn read_time(&mut self) -> Option<HostTime> {
        self.read_u64().map(HostTime)
    }

    fn read_count(&mut self) -> Option<usize> {
        usize::try_from(self.read_u32()?).ok()
    }

    fn read_outcome(&mut self) -> Option<FrameOutcomeKind> {
        Some(match self.read_u8()? {
            0 => FrameOutcomeKind::Presented,
            1 => FrameOutcomeKind::Dropped,
            2 => FrameOutcomeKind::ValidateFailed,
            _ => FrameOutcomeKind::PresentFailed,
        })
    }

    fn decode_vsync_wait(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::VsyncWait(VsyncWaitEvent {
            predicted: self.read_time()?,
            woke_at: self.read_time()?,
            interrupted: self.read_bool()?,
        }))
    }

    fn decode_vsync(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Vsync(VsyncEvent {
            vsync_count: self.read_u32()?,
            timestamp: self.read_time()?,
            delayed: self.read_bool()?,
            prediction_interval: self.read_u32()?,
        }))
    }

    fn decode_layer_config(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::LayerConfig(LayerConfigEvent {
            layer_count: self.read_count()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_frame(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Frame(FrameEvent {
            vsync_count: self.read_u32()?,
            outcome: self.read_outcome()?,
            pending_fences: self.read_count()?,
            frame_skip_count: self.read_u64()?,
            timestamp: self.read_time()?,
        }))
    }

    fn decode_power(&mut self) -> Option<RecordedEvent> {
        let transition = match self.read_u8()? {
            0 => PowerTransition::Resumed,
            _ => PowerTransition::Paused,
        };
        Some(RecordedEvent::Power(PowerEvent {
            transition,
            timestamp: self.read_time()?,
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_u8()? {
            TAG_VSYNC_WAIT => self.decode_vsync_wait(),
            TAG_VSYNC => self.decode_vsync(),
            TAG_LAYER_CONFIG => self.decode_layer_config(),
            TAG_FRAME => self.decode_frame(),
            TAG_POWER => self.decode_power(),
            _ => None, // unknown tag, stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> FrameEvent {
        FrameEvent {
            vsync_count: 41,
            outcome: FrameOutcomeKind::Dropped,
            pending_fences: 3,
            frame_skip_count: 7,
            timestamp: HostTime(2_000_000),
        }
    }

    #[test]
    fn frame_event_survives_recording() {
        let mut rec = RecorderSink::new();
        let orig = sample_frame();
        rec.on_frame(&orig);

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 1);
        match &events[0] {
            RecordedEvent::Frame(e) => {
                assert_eq!(e.vsync_count, orig.vsync_count);
                assert_eq!(e.outcome, orig.outcome);
                assert_eq!(e.pending_fences, orig.pending_fences);
                assert_eq!(e.frame_skip_count, orig.frame_skip_count);
                assert_eq!(e.timestamp, orig.timestamp);
            }
            other => panic!("expected Frame, got {other:?}"),
        }
    }

    #[test]
    fn mixed_events_decode_in_order() {
        let mut rec = RecorderSink::new();
        rec.on_power(&PowerEvent {
            transition: PowerTransition::Resumed,
            timestamp: HostTime(1_000),
        });
        rec.on_vsync_wait(&VsyncWaitEvent {
            predicted: HostTime(11_000),
            woke_at: HostTime(11_050),
            interrupted: false,
        });
        rec.on_layer_config(&LayerConfigEvent {
            layer_count: 2,
            timestamp: HostTime(11_100),
        });
        rec.on_vsync(&VsyncEvent {
            vsync_count: 1,
            timestamp: HostTime(11_000),
            delayed: true,
            prediction_interval: 2,
        });
        rec.on_frame(&sample_frame());

        let events: Vec<_> = decode(rec.as_bytes()).collect();
        assert_eq!(events.len(), 5);
        assert!(matches!(
            events[0],
            RecordedEvent::Power(PowerEvent {
                transition: PowerTransition::Resumed,
                ..
            })
        ));
        match &events[1] {
            RecordedEvent::VsyncWait(e) => {
                assert_eq!(e.woke_at, HostTime(11_050));
                assert!(!e.interrupted);
            }
            other => panic!("expected VsyncWait, got {other:?}"),
        }
        assert!(matches!(
            events[2],
            RecordedEvent::LayerConfig(LayerConfigEvent { layer_count: 2, .. })
        ));
        match &events[3] {
            RecordedEvent::Vsync(e) => {
                assert!(e.delayed);
                assert_eq!(e.prediction_interval, 2);
            }
            other => panic!("expected Vsync, got {other:?}"),
        }
        assert!(matches!(events[4], RecordedEvent::Frame(_)));
    }

    #[test]
    fn truncated_record_stops_decoding() {
        let mut rec = RecorderSink::new();
        rec.on_frame(&sample_frame());
        rec.on_frame(&sample_frame());
        let bytes = rec.into_bytes();

        let events: Vec<_> = decode(&bytes[..bytes.len() - 1]).collect();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn empty_buffer_decodes_to_nothing() {
        let events: Vec<_> = decode(&[]).collect();
        assert!(events.is_empty());
    }

    #[test]
    fn shared_recorder_snapshots_while_recording() {
        let recorder = SharedRecorder::new();
        let mut sink: Box<dyn TraceSink> = Box::new(recorder.clone());
        sink.on_power(&PowerEvent {
            transition: PowerTransition::Paused,
            timestamp: HostTime(5),
        });
        assert_eq!(decode(&recorder.snapshot()).count(), 1);
        sink.on_frame(&sample_frame());
        assert_eq!(decode(&recorder.snapshot()).count(), 2);
    }
}
