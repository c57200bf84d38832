/// Axis-aligned rectangle in normalized [0,1] x [0,1] image coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn mid_x(&self) -> f32 {
        self.x + self.w / 2.0
    }

    pub fn mid_y(&self) -> f32 {
        self.y + self.h / 2.0
    }

    pub fn area(&self) -> f32 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = (self.x + self.w).min(other.x + other.w) - self.x.max(other.x);
        let iy = (self.y + self.h).min(other.y + other.h) - self.y.max(other.y);
        let intersect = ix.max(0.0) * iy.max(0.0);
        let union = self.area() + other.area() - intersect;
        if union <= 0.0 {
            0.0
        } else {
            intersect / union
        }
    }
}

/// Backend output before filtering and label canonicalization.
#[derive(Clone, Debug, PartialEq)]
pub struct RawDetection {
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl RawDetection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }
}

/// A filtered detection with a canonical label. Immutable once produced.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    label: String,
    confidence: f32,
    bbox: BoundingBox,
}

impl Detection {
    pub(crate) fn new(label: String, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label,
            confidence,
            bbox,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }
}

/// At most `MAX_DETECTIONS` detections above `MIN_CONFIDENCE`, highest confidence first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionSet {
    detections: Vec<Detection>,
}

impl DetectionSet {
    pub(crate) fn from_sorted(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }

    pub fn as_slice(&self) -> &[Detection] {
        &self.detections
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.detections.iter().map(|d| d.label())
    }
}

impl<'a> IntoIterator for &'a DetectionSet {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.detections.iter()
    }
}
