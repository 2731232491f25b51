// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Timestamps
//! are printed in microseconds.

use std::io::Write;

use hwpost_core::time::HostTime;
use hwpost_core::trace::{
    FrameEvent, FrameOutcomeKind, LayerConfigEvent, PowerEvent, PowerTransition, TraceSink,
    VsyncEvent, VsyncWaitEvent,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write + Send = Box<dyn Write + Send>> {
    writer: W,
}

impl<W: Write + Send> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self { writer }
    }
}

impl<W: Write + Send> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns its writer.
    #[must_use]
    pub fn into_writer(self) -> W {
        self.writer
    }
}

fn us(t: HostTime) -> f64 {
    t.nanos() as f64 / 1000.0
}

fn outcome_name(outcome: FrameOutcomeKind) -> &'static str {
    match outcome {
        FrameOutcomeKind::Presented => "presented",
        FrameOutcomeKind::Dropped => "DROPPED",
        FrameOutcomeKind::ValidateFailed => "validate-failed",
        FrameOutcomeKind::PresentFailed => "present-failed",
    }
}

impl<W: Write + Send> TraceSink for PrettyPrintSink<W> {
    fn on_vsync_wait(&mut self, e: &VsyncWaitEvent) {
        let late_us = e.woke_at.nanos().saturating_sub(e.predicted.nanos()) as f64 / 1000.0;
        let interrupted = if e.interrupted { " INTERRUPTED" } else { "" };
        let _ = writeln!(
            self.writer,
            "[wait] predicted={:.1}µs woke={:.1}µs late={late_us:.1}µs{interrupted}",
            us(e.predicted),
            us(e.woke_at),
        );
    }

    fn on_vsync(&mut self, e: &VsyncEvent) {
        let status = if e.delayed { "DELAYED" } else { "ok" };
        let _ = writeln!(
            self.writer,
            "[vsync] count={} at {:.1}µs interval={} {status}",
            e.vsync_count,
            us(e.timestamp),
            e.prediction_interval,
        );
    }

    fn on_layer_config(&mut self, e: &LayerConfigEvent) {
        let _ = writeln!(
            self.writer,
            "[layers] count={} at {:.1}µs",
            e.layer_count,
            us(e.timestamp),
        );
    }

    fn on_frame(&mut self, e: &FrameEvent) {
        let _ = writeln!(
            self.writer,
            "[frame] vsync={} {} pending={} skipped={} at {:.1}µs",
            e.vsync_count,
            outcome_name(e.outcome),
            e.pending_fences,
            e.frame_skip_count,
            us(e.timestamp),
        );
    }

    fn on_power(&mut self, e: &PowerEvent) {
        let transition = match e.transition {
            PowerTransition::Resumed => "resumed",
            PowerTransition::Paused => "paused",
        };
        let _ = writeln!(
            self.writer,
            "[power] {transition} at {:.1}µs",
            us(e.timestamp),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_print_frame() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_frame(&FrameEvent {
            vsync_count: 9,
            outcome: FrameOutcomeKind::Dropped,
            pending_fences: 2,
            frame_skip_count: 1,
            timestamp: HostTime(1_500_000),
        });
        let output = String::from_utf8(sink.into_writer()).unwrap();
        assert_eq!(
            output,
            "[frame] vsync=9 DROPPED pending=2 skipped=1 at 1500.0µs\n"
        );
    }

    #[test]
    fn pretty_print_wait_reports_lateness() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_vsync_wait(&VsyncWaitEvent {
            predicted: HostTime(10_000),
            woke_at: HostTime(12_500),
            interrupted: true,
        });
        let output = String::from_utf8(sink.into_writer()).unwrap();
        assert!(output.contains("late=2.5µs"), "got: {output}");
        assert!(output.ends_with("INTERRUPTED\n"), "got: {output}");
    }
}
