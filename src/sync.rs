//! Color/depth frame pairing.
//!
//! The camera delivers color and depth on independent callback threads. Depth
//! updates a single newest-wins slot; each color frame takes a snapshot of that
//! slot and is emitted at most once. No queueing, no blocking on the other stream.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::frame::{ColorFrame, DepthFrame, DepthMode, SynchronizedFrame};

/// Pairs color frames with the latest depth frame.
pub struct FrameSynchronizer {
    mode: DepthMode,
    latest_depth: Mutex<Option<Arc<DepthFrame>>>,
    color_received: AtomicU64,
    depth_received: AtomicU64,
    emitted: AtomicU64,
    dropped_before_depth: AtomicU64,
}

/// Snapshot of synchronizer counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub color_received: u64,
    pub depth_received: u64,
    pub emitted: u64,
    pub dropped_before_depth: u64,
}

impl FrameSynchronizer {
    pub fn new(mode: DepthMode) -> Self {
        Self {
            mode,
            latest_depth: Mutex::new(None),
            color_received: AtomicU64::new(0),
            depth_received: AtomicU64::new(0),
            emitted: AtomicU64::new(0),
            dropped_before_depth: AtomicU64::new(0),
        }
    }

    pub fn mode(&self) -> DepthMode {
        self.mode
    }

    /// Replace the latest depth frame. Ignored when the session has no depth sensor.
    pub fn on_depth_frame(&self, frame: DepthFrame) {
        if !self.mode.is_enabled() {
            log::debug!("depth frame ignored: session has no depth sensor");
            return;
        }
        let frame = Arc::new(frame);
        *self.latest_depth.lock() = Some(frame);
        self.depth_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Pair a color frame with the current depth snapshot.
    ///
    /// Returns `None` when depth is enabled but no depth frame has arrived yet;
    /// the color frame is dropped in that case.
    pub fn on_color_frame(&self, frame: ColorFrame) -> Option<SynchronizedFrame> {
        self.color_received.fetch_add(1, Ordering::Relaxed);

        let depth = match self.mode {
            DepthMode::Disabled => None,
            DepthMode::Enabled => {
                // Clone the Arc under the lock; the frame behind it is never mutated.
                let snapshot = self.latest_depth.lock().clone();
                match snapshot {
                    Some(depth) => Some(depth),
                    None => {
                        self.dropped_before_depth.fetch_add(1, Ordering::Relaxed);
                        log::debug!(
                            "color frame #{} dropped: no depth frame received yet",
                            frame.sequence
                        );
                        return None;
                    }
                }
            }
        };

        self.emitted.fetch_add(1, Ordering::Relaxed);
        Some(SynchronizedFrame {
            color: frame,
            depth,
        })
    }

    pub fn stats(&self) -> SyncStats {
        SyncStats {
            color_received: self.color_received.load(Ordering::Relaxed),
            depth_received: self.depth_received.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
            dropped_before_depth: self.dropped_before_depth.load(Ordering::Relaxed),
        }
    }
}
