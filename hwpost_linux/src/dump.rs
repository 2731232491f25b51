// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Text dumps for bug reports.

use core::fmt::Write as _;

use hwpost_core::display::DisplayMetrics;
use hwpost_core::layer::LayerSummary;

/// Everything [`format_dump`] prints.
#[derive(Clone, Debug)]
pub(crate) struct DumpSnapshot {
    pub(crate) metrics: DisplayMetrics,
    pub(crate) resumed: bool,
    pub(crate) frame_skip_count: u64,
    pub(crate) layers: Vec<LayerSummary>,
    pub(crate) composer_dump: Option<String>,
}

fn refresh_rate_hz(vsync_period_ns: i64) -> f64 {
    if vsync_period_ns <= 0 {
        return 0.0;
    }
    1e9 / vsync_period_ns as f64
}

pub(crate) fn format_dump(snapshot: &DumpSnapshot) -> String {
    let m = &snapshot.metrics;
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(
        out,
        "Display metrics:     {}x{} {}x{} dpi @ {:.2} Hz",
        m.width,
        m.height,
        f64::from(m.dpi.x) / 1000.0,
        f64::from(m.dpi.y) / 1000.0,
        refresh_rate_hz(m.vsync_period_ns),
    );
    let _ = writeln!(out, "Post thread resumed: {}", snapshot.resumed);
    let _ = writeln!(out, "Frame skip count:    {}", snapshot.frame_skip_count);
    let _ = writeln!(out, "Active layers:       {}", snapshot.layers.len());
    out.push('\n');

    for (i, layer) in snapshot.layers.iter().enumerate() {
        let _ = writeln!(
            out,
            "Layer {i}: type={} surface_id={} buffer_id={}",
            layer.composition.name(),
            layer.surface_id,
            layer.buffer_id,
        );
    }
    out.push('\n');

    if let Some(composer_dump) = &snapshot.composer_dump {
        out.push_str("Hardware Composer Debug Info:\n");
        out.push_str(composer_dump);
    }
    out
}
