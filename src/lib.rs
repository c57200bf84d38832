//! BlindGate navigation alert pipeline
//!
//! Turns a camera's color frames (and depth frames, when the device has a
//! depth sensor) into spoken and haptic alerts, and feeds detection boxes to
//! a display layer.
//!
//! # Architecture
//!
//! ```text
//! color cb ─┐
//!           ├─> FrameSynchronizer ─> hand-off (1 in flight) ─> worker
//! depth cb ─┘
//!
//! worker: DetectionPipeline
//!         ├─> presentation (summary, boxes)
//!         ├─> proximity ─> AlertPolicy ─> haptic / warning
//!         └─> AlertPolicy (debounce) ─> speech
//!
//! speech cb ─> AlertPolicy (speech state)
//! ```
//!
//! # Module Structure
//!
//! - `frame`: Color/depth/synchronized frame types and the session clock
//! - `sync`: Newest-wins color/depth pairing
//! - `detect`: Detector backends, registry, filtering and ranking
//! - `proximity`: Depth sampling at box centers
//! - `alert`: Debounce and speech-state policy
//! - `dispatch`: Collaborator traits and the output dispatcher
//! - `pipeline`: Per-frame processing
//! - `runtime`: Capture handle and detection worker thread
//! - `ingest`: Synthetic capture source
//! - `config`: File + env configuration

use std::sync::Arc;

pub mod alert;
pub mod config;
pub mod detect;
pub mod dispatch;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod proximity;
pub mod runtime;
pub mod sync;

pub use alert::{
    AlertPolicy, ProximityDecision, SpeechState, SpeechStatus, UtteranceEvent, UtteranceId,
    CLEANUP_INTERVAL, DEBOUNCE_INTERVAL,
};
pub use config::{CameraSettings, DetectorSettings, PipelineConfig};
pub use detect::{
    BackendRegistry, BoundingBox, Detection, DetectionPipeline, DetectionSet, DetectorBackend,
    RawDetection, ScriptStep, ScriptedBackend, MAX_DETECTIONS, MIN_CONFIDENCE,
};
pub use dispatch::{
    summary_text, HapticOutput, OutputDispatcher, OutputSettings, PresentationSink, SpeechOutput,
    Utterance, CLOSE_OBJECT_WARNING,
};
pub use frame::{ColorFrame, DepthFrame, DepthMode, SessionClock, SynchronizedFrame};
pub use ingest::{SyntheticCamera, SyntheticConfig};
pub use pipeline::{AlertPipeline, FrameReport};
pub use proximity::{Proximity, ProximityClass, PROXIMITY_THRESHOLD_M};
pub use runtime::{CaptureHandle, PipelineRunner, RunnerStats};
pub use sync::{FrameSynchronizer, SyncStats};

/// Build the detection stage named by `settings`.
///
/// Backends in `registry` are selectable by name. `"tract"` is constructed
/// from the configured model and labels when the `backend-tract` feature is
/// compiled in. Any failure yields a disabled pipeline, reported once.
pub fn build_detector(
    settings: &DetectorSettings,
    camera: &CameraSettings,
    mut registry: BackendRegistry,
) -> DetectionPipeline {
    if let Some(backend) = registry.take(&settings.backend) {
        return DetectionPipeline::new(backend);
    }
    if settings.backend == "tract" {
        return build_tract_detector(settings, camera);
    }
    DetectionPipeline::disabled(&format!(
        "unknown detector backend '{}' (registered: {})",
        settings.backend,
        registry.list().join(", ")
    ))
}

#[cfg(feature = "backend-tract")]
fn build_tract_detector(
    settings: &DetectorSettings,
    camera: &CameraSettings,
) -> DetectionPipeline {
    let (Some(model), Some(labels)) = (&settings.model_path, &settings.labels_path) else {
        return DetectionPipeline::disabled(
            "tract backend needs detector.model_path and detector.labels_path",
        );
    };
    DetectionPipeline::from_result(
        detect::backends::TractBackend::new(model, labels, camera.width, camera.height)
            .map(|backend| Box::new(backend) as Box<dyn DetectorBackend>),
    )
}

#[cfg(not(feature = "backend-tract"))]
fn build_tract_detector(
    _settings: &DetectorSettings,
    _camera: &CameraSettings,
) -> DetectionPipeline {
    DetectionPipeline::disabled("tract backend requires the backend-tract feature")
}

/// Wire a pipeline around shared policy and the given collaborators.
pub fn build_pipeline(
    detector: DetectionPipeline,
    policy: Arc<AlertPolicy>,
    speech: Arc<dyn SpeechOutput>,
    haptic: Arc<dyn HapticOutput>,
    presentation: Arc<dyn PresentationSink>,
    settings: OutputSettings,
) -> AlertPipeline {
    let dispatcher = OutputDispatcher::new(speech, haptic, presentation, settings);
    AlertPipeline::new(detector, policy, dispatcher)
}
