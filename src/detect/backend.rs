use anyhow::Result;

use crate::detect::result::RawDetection;
use crate::frame::ColorFrame;

/// Object detector backend.
///
/// Backends receive the color frame by reference and return raw detections
/// with normalized boxes. Filtering, ranking, and label casing happen in
/// `DetectionPipeline`, not here.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run inference on a frame. Errors are recoverable; the pipeline keeps going.
    fn detect(&mut self, frame: &ColorFrame) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
