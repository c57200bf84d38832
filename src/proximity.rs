//! Depth-based proximity estimation.
//!
//! A detection's box center is scaled onto the depth grid and truncated to a
//! pixel index. Out-of-grid indices and unusable samples yield `Unavailable`,
//! which is never treated as near or far.

use crate::detect::Detection;
use crate::frame::DepthFrame;

/// Objects closer than this many meters are "near".
pub const PROXIMITY_THRESHOLD_M: f32 = 1.0;

/// Result of sampling depth for a detection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Proximity {
    /// Distance in meters at the box center.
    Distance(f32),
    /// No usable depth signal for this detection.
    Unavailable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProximityClass {
    Near,
    Far,
    Unavailable,
}

impl Proximity {
    pub fn classify(self) -> ProximityClass {
        match self {
            Proximity::Distance(d) if d < PROXIMITY_THRESHOLD_M => ProximityClass::Near,
            Proximity::Distance(_) => ProximityClass::Far,
            Proximity::Unavailable => ProximityClass::Unavailable,
        }
    }

    pub fn is_near(self) -> bool {
        self.classify() == ProximityClass::Near
    }
}

/// Maps a normalized coordinate onto a grid axis of `len` cells.
/// Truncates toward zero; returns `None` outside `[0, len)`.
fn grid_index(normalized: f32, len: usize) -> Option<usize> {
    if !normalized.is_finite() {
        return None;
    }
    let scaled = (normalized * len as f32).trunc();
    if scaled < 0.0 || scaled >= len as f32 {
        return None;
    }
    Some(scaled as usize)
}

/// Sample the depth grid at the detection's bounding-box center.
pub fn estimate(detection: &Detection, depth: &DepthFrame) -> Proximity {
    let bbox = detection.bbox();
    let (Some(x), Some(y)) = (
        grid_index(bbox.mid_x(), depth.width()),
        grid_index(bbox.mid_y(), depth.height()),
    ) else {
        log::debug!(
            "proximity unavailable for {}: center ({:.3}, {:.3}) outside {}x{} depth grid",
            detection.label(),
            bbox.mid_x(),
            bbox.mid_y(),
            depth.width(),
            depth.height()
        );
        return Proximity::Unavailable;
    };

    match depth.sample(x, y) {
        Some(d) if d.is_finite() && d >= 0.0 => Proximity::Distance(d),
        _ => Proximity::Unavailable,
    }
}
