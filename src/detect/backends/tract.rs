#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, RawDetection};
use crate::frame::ColorFrame;

const DEFAULT_SCORE_THRESHOLD: f32 = 0.25;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

/// Tract-based backend for YOLO-style ONNX object detectors.
///
/// Expects a single output of shape `[1, N, 5 + classes]` with rows
/// `[cx, cy, w, h, objectness, class scores...]` in input pixel units, and
/// RGB frames matching the model input size.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    labels: Vec<String>,
    width: u32,
    height: u32,
    score_threshold: f32,
    iou_threshold: f32,
}

impl TractBackend {
    /// Load an ONNX model and its labels file (one label per line).
    pub fn new<P: AsRef<Path>, L: AsRef<Path>>(
        model_path: P,
        labels_path: L,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        let labels_path = labels_path.as_ref();
        let labels = std::fs::read_to_string(labels_path)
            .with_context(|| format!("failed to read labels from {}", labels_path.display()))?
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>();
        if labels.is_empty() {
            return Err(anyhow!("labels file {} is empty", labels_path.display()));
        }

        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            labels,
            width,
            height,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        })
    }

    /// Override the pre-filter score threshold applied before NMS.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = threshold;
        self
    }

    fn build_input(&self, frame: &ColorFrame) -> Result<Tensor> {
        if frame.width != self.width || frame.height != self.height {
            return Err(anyhow!(
                "frame size {}x{} does not match model input {}x{}",
                frame.width,
                frame.height,
                self.width,
                self.height
            ));
        }

        let expected_len = (frame.width as usize)
            .checked_mul(frame.height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;

        let pixels = frame.pixels();
        if pixels.len() != expected_len {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                expected_len,
                pixels.len()
            ));
        }

        let width = frame.width as usize;
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, frame.height as usize, width),
            |(_, channel, y, x)| {
                let idx = (y * width + x) * 3 + channel;
                pixels[idx] as f32 / 255.0
            },
        );

        Ok(input.into_tensor())
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &ColorFrame) -> Result<Vec<RawDetection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        if shape.len() != 3 || shape[2] < 6 {
            return Err(anyhow!("unexpected model output shape {:?}", shape));
        }
        let values: Vec<f32> = view.iter().copied().collect();
        Ok(decode_rows(
            &values,
            shape[2],
            &self.labels,
            (self.width as f32, self.height as f32),
            self.score_threshold,
            self.iou_threshold,
        ))
    }
}

/// Decode flattened YOLO rows into normalized detections, then apply greedy NMS per label.
fn decode_rows(
    values: &[f32],
    cols: usize,
    labels: &[String],
    input_size: (f32, f32),
    score_threshold: f32,
    iou_threshold: f32,
) -> Vec<RawDetection> {
    let (in_w, in_h) = input_size;
    let mut candidates = Vec::new();
    for row in values.chunks_exact(cols) {
        let objectness = row[4];
        let Some((class_idx, class_score)) = row[5..]
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
        else {
            continue;
        };
        let score = objectness * class_score;
        if !score.is_finite() || score < score_threshold {
            continue;
        }
        let Some(label) = labels.get(class_idx) else {
            continue;
        };
        let (cx, cy, w, h) = (row[0] / in_w, row[1] / in_h, row[2] / in_w, row[3] / in_h);
        candidates.push(RawDetection::new(
            label.clone(),
            score.min(1.0),
            BoundingBox::new(cx - w / 2.0, cy - h / 2.0, w, h),
        ));
    }

    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<RawDetection> = Vec::new();
    for candidate in candidates {
        let suppressed = kept.iter().any(|k| {
            k.label == candidate.label && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}
