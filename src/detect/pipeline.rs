use crate::detect::backend::DetectorBackend;
use crate::detect::result::{Detection, DetectionSet, RawDetection};
use crate::frame::SynchronizedFrame;

/// Detections at or below this confidence are discarded.
pub const MIN_CONFIDENCE: f32 = 0.6;
/// Maximum detections kept per frame.
pub const MAX_DETECTIONS: usize = 3;

/// Counters for the detection stage.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DetectionStats {
    pub frames_processed: u64,
    pub inference_failures: u64,
}

/// Runs the detector backend on synchronized frames and produces bounded,
/// ranked detection sets with canonical labels.
///
/// A pipeline without a backend is disabled: `detect` always returns an empty
/// set. The reason is logged once at construction, never per frame.
pub struct DetectionPipeline {
    backend: Option<Box<dyn DetectorBackend>>,
    stats: DetectionStats,
}

impl DetectionPipeline {
    /// Build a pipeline around a backend. A failed warm-up disables the pipeline.
    pub fn new(mut backend: Box<dyn DetectorBackend>) -> Self {
        match backend.warm_up() {
            Ok(()) => {
                log::info!("detection pipeline ready (backend={})", backend.name());
                Self {
                    backend: Some(backend),
                    stats: DetectionStats::default(),
                }
            }
            Err(e) => Self::disabled(&format!("backend {} warm-up failed: {}", backend.name(), e)),
        }
    }

    /// Build from a backend constructor result (e.g. model loading).
    pub fn from_result(backend: anyhow::Result<Box<dyn DetectorBackend>>) -> Self {
        match backend {
            Ok(backend) => Self::new(backend),
            Err(e) => Self::disabled(&format!("{:#}", e)),
        }
    }

    /// A pipeline that never detects anything.
    pub fn disabled(reason: &str) -> Self {
        log::error!("detection disabled: {}", reason);
        Self {
            backend: None,
            stats: DetectionStats::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    pub fn backend_name(&self) -> Option<&'static str> {
        self.backend.as_ref().map(|b| b.name())
    }

    /// Detect objects in the frame's color image. Depth is not used for inference.
    ///
    /// Inference errors are logged and yield an empty set; the next frame is unaffected.
    pub fn detect(&mut self, frame: &SynchronizedFrame) -> DetectionSet {
        let Some(backend) = self.backend.as_mut() else {
            return DetectionSet::empty();
        };
        self.stats.frames_processed += 1;

        match backend.detect(&frame.color) {
            Ok(raw) => rank_detections(raw),
            Err(e) => {
                self.stats.inference_failures += 1;
                log::warn!(
                    "inference failed on frame #{} ({}): {:#}",
                    frame.color.sequence,
                    backend.name(),
                    e
                );
                DetectionSet::empty()
            }
        }
    }

    pub fn stats(&self) -> DetectionStats {
        self.stats.clone()
    }
}

/// Filter by confidence, canonicalize labels, order by descending confidence, cap.
pub(crate) fn rank_detections(raw: Vec<RawDetection>) -> DetectionSet {
    let mut kept: Vec<Detection> = raw
        .into_iter()
        .filter(|d| {
            d.confidence.is_finite() && d.confidence > MIN_CONFIDENCE && d.confidence <= 1.0
        })
        .filter_map(|d| {
            let label = canonical_label(&d.label);
            if label.is_empty() {
                None
            } else {
                Some(Detection::new(label, d.confidence, d.bbox))
            }
        })
        .collect();

    // Stable: equal confidences keep backend order.
    kept.sort_by(|a, b| b.confidence().total_cmp(&a.confidence()));
    kept.truncate(MAX_DETECTIONS);
    DetectionSet::from_sorted(kept)
}

/// Title-case each word: `"traffic LIGHT"` becomes `"Traffic Light"`.
pub fn canonical_label(label: &str) -> String {
    label
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
