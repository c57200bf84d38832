//! Per-frame perception-to-alert processing.
//!
//! For one synchronized frame:
//! 1. Detect objects (bounded, ranked set).
//! 2. Present summary and boxes to the display layer.
//! 3. If depth is present, estimate proximity per detection; any near
//!    detection triggers one proximity decision for the frame.
//! 4. Ask the policy which labels may be spoken and dispatch them.

use std::sync::Arc;
use std::time::Duration;

use crate::alert::AlertPolicy;
use crate::detect::{DetectionPipeline, DetectionSet, DetectionStats};
use crate::dispatch::OutputDispatcher;
use crate::frame::SynchronizedFrame;
use crate::proximity::{self, ProximityClass};

/// What happened for one processed frame.
#[derive(Clone, Debug)]
pub struct FrameReport {
    pub sequence: u64,
    pub timestamp: Duration,
    pub detections: DetectionSet,
    /// Labels approved and dispatched for speech.
    pub announced: Vec<String>,
    pub near: usize,
    pub unavailable: usize,
    pub haptic: bool,
    pub warning_spoken: bool,
}

/// Owns the detection stage and dispatches to collaborators.
pub struct AlertPipeline {
    detector: DetectionPipeline,
    policy: Arc<AlertPolicy>,
    dispatcher: OutputDispatcher,
}

impl AlertPipeline {
    pub fn new(
        detector: DetectionPipeline,
        policy: Arc<AlertPolicy>,
        dispatcher: OutputDispatcher,
    ) -> Self {
        Self {
            detector,
            policy,
            dispatcher,
        }
    }

    pub fn detection_stats(&self) -> DetectionStats {
        self.detector.stats()
    }

    /// Process one frame. The frame is consumed.
    pub fn process(&mut self, frame: SynchronizedFrame) -> FrameReport {
        let now = frame.timestamp();
        let detections = self.detector.detect(&frame);

        self.dispatcher.present(&detections);

        let mut near = 0;
        let mut unavailable = 0;
        if let Some(depth) = frame.depth.as_deref() {
            for detection in &detections {
                match proximity::estimate(detection, depth).classify() {
                    ProximityClass::Near => near += 1,
                    ProximityClass::Unavailable => unavailable += 1,
                    ProximityClass::Far => {}
                }
            }
        }

        let mut haptic = false;
        let mut warning_spoken = false;
        if near > 0 {
            let decision = self.policy.should_alert_proximity(now);
            haptic = decision.haptic;
            warning_spoken = self.dispatcher.proximity_alert(decision).is_some();
            log::debug!(
                "frame #{}: {} near object(s), warning spoken={}",
                frame.color.sequence,
                near,
                warning_spoken
            );
        }

        let announced = self.policy.evaluate(detections.labels(), now);
        if !announced.is_empty() {
            self.dispatcher.announce(&announced);
        }

        FrameReport {
            sequence: frame.color.sequence,
            timestamp: now,
            detections,
            announced,
            near,
            unavailable,
            haptic,
            warning_spoken,
        }
    }
}
