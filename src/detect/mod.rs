mod backend;
pub mod backends;
mod pipeline;
mod registry;
mod result;

pub use backend::DetectorBackend;
pub use backends::{ScriptStep, ScriptedBackend};
pub use pipeline::{
    canonical_label, DetectionPipeline, DetectionStats, MAX_DETECTIONS, MIN_CONFIDENCE,
};
#[cfg(test)]
pub(crate) use pipeline::rank_detections;
pub use registry::BackendRegistry;
pub use result::{BoundingBox, Detection, DetectionSet, RawDetection};
