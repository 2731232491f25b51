// Copyright 2026 the Hwpost Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The composer HAL callback.

use std::path::PathBuf;

use hwpost_core::display::DisplayId;
use hwpost_core::hwc::{Connection, HwcCallback};
use parking_lot::Mutex;
use rustix::io::Errno;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::sysfs::{VsyncEventNode, vsync_event_path};

/// Errors reading the newest vsync timestamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum VsyncError {
    /// The display is not a physical display.
    #[error("invalid physical display {0}")]
    InvalidDisplay(DisplayId),
    /// Rewinding the vsync event node failed.
    #[error("failed to seek vsync event node: {0}")]
    Seek(#[source] Errno),
    /// Reading the vsync event node failed.
    #[error("failed to read vsync event node: {0}")]
    Read(#[source] Errno),
    /// The vsync event node did not contain `VSYNC=<ns>`.
    #[error("malformed vsync event")]
    Parse,
}

impl VsyncError {
    /// Returns `true` for the `EAGAIN` a driver reports when no new vsync
    /// arrived. Not worth logging.
    #[must_use]
    pub fn is_would_block(&self) -> bool {
        matches!(self, Self::Read(Errno::AGAIN))
    }
}

const NUM_PHYSICAL: usize = DisplayId::NUM_PHYSICAL;

/// Receives hotplug and vsync notifications from the composer HAL and
/// answers "when was the newest vsync" for the posting thread.
#[derive(Debug)]
pub struct ComposerCallback {
    graphics_root: PathBuf,
    timestamps: Mutex<[i64; NUM_PHYSICAL]>,
    nodes: Mutex<[Option<VsyncEventNode>; NUM_PHYSICAL]>,
}

impl ComposerCallback {
    /// Creates a callback probing vsync event nodes under `graphics_root`.
    #[must_use]
    pub fn new(graphics_root: impl Into<PathBuf>) -> Self {
        Self {
            graphics_root: graphics_root.into(),
            timestamps: Mutex::new([0; NUM_PHYSICAL]),
            nodes: Mutex::new([const { None }; NUM_PHYSICAL]),
        }
    }

    /// Returns `true` if a vsync event node was found for `display_id`.
    #[must_use]
    pub fn has_vsync_event_node(&self, display_id: DisplayId) -> bool {
        display_id
            .index()
            .is_some_and(|i| self.nodes.lock()[i].is_some())
    }

    /// Newest vsync timestamp of `display_id`, in `CLOCK_MONOTONIC` nanoseconds.
    ///
    /// Reads the driver's vsync event node when one exists, otherwise returns
    /// the timestamp of the last [`on_vsync`](HwcCallback::on_vsync).
    ///
    /// # Errors
    ///
    /// [`VsyncError::InvalidDisplay`] for non-physical displays, or the node
    /// read error.
    pub fn vsync_time(&self, display_id: DisplayId) -> Result<i64, VsyncError> {
        let Some(index) = display_id.index() else {
            error!(display = %display_id, "vsync time requested for invalid physical display");
            return Err(VsyncError::InvalidDisplay(display_id));
        };

        {
            let nodes = self.nodes.lock();
            if let Some(node) = &nodes[index] {
                return node.read_timestamp().inspect_err(|err| {
                    if !err.is_would_block() {
                        error!(%err, display = %display_id, "failed to read vsync timestamp");
                    }
                });
            }
        }
        Ok(self.timestamps.lock()[index])
    }
}

impl HwcCallback for ComposerCallback {
    fn on_hotplug(&self, display_id: DisplayId, _connection: Connection) {
        let Some(index) = display_id.index() else {
            return;
        };
        let mut nodes = self.nodes.lock();
        if nodes[index].is_some() {
            return;
        }
        match VsyncEventNode::open(vsync_event_path(&self.graphics_root, index)) {
            Ok(node) => {
                info!(
                    display = %display_id,
                    path = %node.path().display(),
                    "driver supports vsync_event node"
                );
                nodes[index] = Some(node);
            }
            Err(_) => info!(display = %display_id, "driver does not support vsync_event node"),
        }
    }

    fn on_refresh(&self, _display: DisplayId) {}

    fn on_vsync(&self, display_id: DisplayId, timestamp: i64) {
        match display_id.index() {
            Some(index) => self.timestamps.lock()[index] = timestamp,
            None => warn!(display = %display_id, timestamp, "vsync on non-physical display"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    fn callback_without_nodes() -> (tempfile::TempDir, ComposerCallback) {
        let dir = tempfile::tempdir().unwrap();
        let callback = ComposerCallback::new(dir.path());
        (dir, callback)
    }

    #[test]
    fn falls_back_to_callback_timestamp() {
        let (_dir, callback) = callback_without_nodes();
        callback.on_hotplug(DisplayId::PRIMARY, Connection::Connected);
        assert!(!callback.has_vsync_event_node(DisplayId::PRIMARY));
        assert_eq!(callback.vsync_time(DisplayId::PRIMARY), Ok(0));

        callback.on_vsync(DisplayId::PRIMARY, 1_234);
        assert_eq!(callback.vsync_time(DisplayId::PRIMARY), Ok(1_234));
        assert_eq!(callback.vsync_time(DisplayId(1)), Ok(0), "per display");
    }

    #[derive(Clone, Default)]
    struct LogCapture(std::sync::Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn rejected_display_is_logged_with_its_id() {
        let (_dir, callback) = callback_without_nodes();
        let capture = LogCapture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            assert!(callback.vsync_time(DisplayId(9)).is_err());
            callback.on_vsync(DisplayId(9), 5);
        });

        let logs = String::from_utf8(capture.0.lock().clone()).unwrap();
        assert!(
            logs.contains("invalid physical display display=9"),
            "got: {logs}"
        );
        assert!(
            logs.contains("vsync on non-physical display display=9 timestamp=5"),
            "got: {logs}"
        );
    }

    #[test]
    fn non_physical_displays_are_rejected() {
        let (_dir, callback) = callback_without_nodes();
        callback.on_vsync(DisplayId(7), 99);
        callback.on_hotplug(DisplayId(7), Connection::Connected);
        assert_eq!(
            callback.vsync_time(DisplayId(7)),
            Err(VsyncError::InvalidDisplay(DisplayId(7)))
        );
    }

    #[test]
    fn hotplug_discovers_vsync_event_node() {
        let dir = tempfile::tempdir().unwrap();
        let fb = dir.path().join("fb0");
        std::fs::create_dir(&fb).unwrap();
        let mut node = std::fs::File::create(fb.join("vsync_event")).unwrap();
        node.write_all(b"VSYNC=777").unwrap();

        let callback = ComposerCallback::new(dir.path());
        callback.on_hotplug(DisplayId::PRIMARY, Connection::Connected);
        assert!(callback.has_vsync_event_node(DisplayId::PRIMARY));

        callback.on_vsync(DisplayId::PRIMARY, 1);
        assert_eq!(
            callback.vsync_time(DisplayId::PRIMARY),
            Ok(777),
            "driver node wins over the callback"
        );
    }

    #[test]
    fn would_block_is_recognized() {
        assert!(VsyncError::Read(Errno::AGAIN).is_would_block());
        assert!(!VsyncError::Read(Errno::IO).is_would_block());
        assert!(!VsyncError::Parse.is_would_block());
    }
}
