// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][format] JSON to the given writer.
//!
//! Every event becomes an instant. Vsyncs and power transitions are global
//! (`"s": "g"`); wake-ups, layer rebuilds and frames are thread scoped.
//!
//! [format]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use hwpost_core::time::HostTime;
use serde_json::{Value, json};

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
///
/// # Errors
///
/// Returns any error from `writer`.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::VsyncWait(e) => {
                let late_ns = e.woke_at.nanos().saturating_sub(e.predicted.nanos());
                let name = if e.interrupted {
                    "WaitInterrupted"
                } else {
                    "VsyncWake"
                };
                events.push(json!({
                    "ph": "i",
                    "name": name,
                    "cat": "Vsync",
                    "ts": to_us(e.woke_at),
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "predicted_us": to_us(e.predicted),
                        "late_us": late_ns as f64 / 1000.0,
                    }
                }));
            }
            RecordedEvent::Vsync(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "Vsync",
                    "cat": "Vsync",
                    "ts": to_us(e.timestamp),
                    "pid": 0,
                    "tid": 0,
                    "s": "g",
                    "args": {
                        "vsync_count": e.vsync_count,
                        "delayed": e.delayed,
                        "prediction_interval": e.prediction_interval,
                    }
                }));
            }
            RecordedEvent::LayerConfig(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "LayerConfig",
                    "cat": "Layers",
                    "ts": to_us(e.timestamp),
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "layer_count": e.layer_count,
                    }
                }));
            }
            RecordedEvent::Frame(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": format!("{:?}", e.outcome),
                    "cat": "Frame",
                    "ts": to_us(e.timestamp),
                    "pid": 0,
                    "tid": 0,
                    "s": "t",
                    "args": {
                        "vsync_count": e.vsync_count,
                        "pending_fences": e.pending_fences,
                        "frame_skip_count": e.frame_skip_count,
                    }
                }));
            }
            RecordedEvent::Power(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": format!("{:?}", e.transition),
                    "cat": "Power",
                    "ts": to_us(e.timestamp),
                    "pid": 0,
                    "tid": 0,
                    "s": "g",
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn to_us(t: HostTime) -> f64 {
    t.nanos() as f64 / 1000.0
}
