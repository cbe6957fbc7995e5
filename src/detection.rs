use nalgebra::{Point2, SVector};
use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};

/// A single person detection for one frame, box in (x1, y1, x2, y2) pixel format.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub tlbr: SVector<f32, 4>,
    pub confidence: f32,
}

impl Detection {
    pub fn new(tlbr: SVector<f32, 4>, confidence: f32) -> Self {
        Self { tlbr, confidence }
    }

    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> Self {
        Self::new(SVector::<f32, 4>::new(x1, y1, x2, y2), confidence)
    }

    pub fn tlbr(&self) -> &SVector<f32, 4> {
        &self.tlbr
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn centroid(&self) -> Point2<f32> {
        centroid(&self.tlbr)
    }

    /// Area with inclusive pixel coordinates, so never below 1 for a valid box.
    pub fn area(&self) -> f32 {
        (self.tlbr[2] - self.tlbr[0] + 1.0) * (self.tlbr[3] - self.tlbr[1] + 1.0)
    }

    /// Reject boxes the suppressor cannot reason about.
    pub fn validate(&self) -> Result<()> {
        let b = &self.tlbr;
        if b.iter().any(|v| !v.is_finite()) {
            return Err(MonitorError::DetectionInput(format!(
                "non-finite coordinates [{}, {}, {}, {}]",
                b[0], b[1], b[2], b[3]
            )));
        }
        if b.iter().any(|&v| v < 0.0) {
            return Err(MonitorError::DetectionInput(format!(
                "negative coordinates [{}, {}, {}, {}]",
                b[0], b[1], b[2], b[3]
            )));
        }
        if b[2] < b[0] || b[3] < b[1] {
            return Err(MonitorError::DetectionInput(format!(
                "inverted box [{}, {}, {}, {}]",
                b[0], b[1], b[2], b[3]
            )));
        }
        Ok(())
    }
}

/// Midpoint of a (x1, y1, x2, y2) box.
pub fn centroid(tlbr: &SVector<f32, 4>) -> Point2<f32> {
    Point2::new((tlbr[0] + tlbr[2]) / 2.0, (tlbr[1] + tlbr[3]) / 2.0)
}

/// A detection as emitted by the upstream detector, before class and confidence filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDetection {
    pub bbox: [f32; 4],
    pub confidence: f32,
    #[serde(default = "default_label")]
    pub label: String,
}

fn default_label() -> String {
    "person".to_string()
}

impl RawDetection {
    /// Keep only confident person boxes.
    pub fn into_person(self, confidence_threshold: f32) -> Option<Detection> {
        if self.label != "person" || self.confidence <= confidence_threshold {
            return None;
        }
        let [x1, y1, x2, y2] = self.bbox;
        Some(Detection::from_corners(x1, y1, x2, y2, self.confidence))
    }
}
