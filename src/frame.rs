//! Sensor frame types.
//!
//! - `ColorFrame`: Opaque camera pixel buffer. Moved through the pipeline, never cloned.
//! - `DepthFrame`: Grid of distances in meters. Shared behind `Arc` so a snapshot is immutable.
//! - `SynchronizedFrame`: A color frame paired with the depth snapshot current at pairing time.
//!
//! Timestamps are monotonic offsets from session start (see `SessionClock`).

use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};

// ----------------------------------------------------------------------------
// SessionClock
// ----------------------------------------------------------------------------

/// Monotonic clock anchored at session start.
#[derive(Clone, Copy, Debug)]
pub struct SessionClock {
    start: Instant,
}

impl SessionClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Time elapsed since the session started.
    pub fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::start()
    }
}

// ----------------------------------------------------------------------------
// ColorFrame
// ----------------------------------------------------------------------------

/// Camera frame. There is no `Clone`: ownership is handed from the camera
/// callback to the synchronizer and from there to the detection worker.
pub struct ColorFrame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Capture time relative to session start.
    pub timestamp: Duration,
    /// Per-stream sequence number assigned by the capture source.
    pub sequence: u64,
}

impl ColorFrame {
    pub fn new(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        timestamp: Duration,
        sequence: u64,
    ) -> Self {
        Self {
            pixels,
            width,
            height,
            timestamp,
            sequence,
        }
    }

    /// Borrowed pixel bytes for inference. Backends must not retain the slice.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

impl std::fmt::Debug for ColorFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColorFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("timestamp", &self.timestamp)
            .field("sequence", &self.sequence)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// DepthFrame
// ----------------------------------------------------------------------------

/// Depth sample grid, row-major, distances in meters.
#[derive(Clone, Debug)]
pub struct DepthFrame {
    data: Vec<f32>,
    width: usize,
    height: usize,
    pub timestamp: Duration,
}

impl DepthFrame {
    pub fn new(data: Vec<f32>, width: usize, height: usize, timestamp: Duration) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("depth frame dimensions must be non-zero"));
        }
        let expected = width
            .checked_mul(height)
            .ok_or_else(|| anyhow!("depth frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "depth frame expected {} samples for {}x{}, received {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            timestamp,
        })
    }

    /// Uniform depth grid, mostly useful for tests and synthetic sources.
    pub fn filled(width: usize, height: usize, meters: f32, timestamp: Duration) -> Result<Self> {
        let len = width
            .checked_mul(height)
            .ok_or_else(|| anyhow!("depth frame dimensions overflow"))?;
        Self::new(vec![meters; len], width, height, timestamp)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Distance at pixel `(x, y)`, or `None` outside the grid.
    pub fn sample(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y * self.width + x).copied()
    }
}

/// Whether the session has a depth sensor. Fixed for the lifetime of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthMode {
    Enabled,
    Disabled,
}

impl DepthMode {
    pub fn from_enabled(enabled: bool) -> Self {
        if enabled {
            DepthMode::Enabled
        } else {
            DepthMode::Disabled
        }
    }

    pub fn is_enabled(self) -> bool {
        matches!(self, DepthMode::Enabled)
    }
}

// ----------------------------------------------------------------------------
// SynchronizedFrame
// ----------------------------------------------------------------------------

/// A color frame plus the most recent depth frame at pairing time (if any).
#[derive(Debug)]
pub struct SynchronizedFrame {
    pub color: ColorFrame,
    pub depth: Option<Arc<DepthFrame>>,
}

impl SynchronizedFrame {
    /// Capture time of the color frame; used as "now" for alert decisions.
    pub fn timestamp(&self) -> Duration {
        self.color.timestamp
    }
}
