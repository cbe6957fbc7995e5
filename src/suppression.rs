//! Overlap suppression: collapse duplicate boxes of one person into a single box.
//!
//! The overlap ratio used here is asymmetric: the intersection is divided by the
//! area of the candidate being tested, not by the union. Candidates are visited
//! from the largest bottom edge (y2) downwards, so the box closest to the camera
//! wins.

use crate::detection::Detection;
use crate::error::{MonitorError, Result};

/// Intersection of `kept` and `candidate`, divided by the candidate's own area.
/// Coordinates are inclusive, so the candidate area is at least 1.
pub fn overlap_ratio(kept: &Detection, candidate: &Detection) -> f32 {
    let a = kept.tlbr();
    let b = candidate.tlbr();
    let xx1 = a[0].max(b[0]);
    let yy1 = a[1].max(b[1]);
    let xx2 = a[2].min(b[2]);
    let yy2 = a[3].min(b[3]);

    let w = (xx2 - xx1 + 1.0).max(0.0);
    let h = (yy2 - yy1 + 1.0).max(0.0);
    (w * h) / candidate.area()
}

/// Return indices of the boxes to keep, in the order they were picked.
pub fn suppress_indices(detections: &[Detection], overlap_thresh: f32) -> Result<Vec<usize>> {
    if !(0.0..=1.0).contains(&overlap_thresh) {
        return Err(MonitorError::DetectionInput(format!(
            "overlap threshold {} outside [0, 1]",
            overlap_thresh
        )));
    }
    for det in detections {
        det.validate()?;
    }

    let mut idxs: Vec<usize> = (0..detections.len()).collect();
    idxs.sort_by(|&i, &j| detections[i].tlbr[3].total_cmp(&detections[j].tlbr[3]));

    let mut keep = Vec::new();
    while let Some(i) = idxs.pop() {
        keep.push(i);
        let current = &detections[i];
        idxs.retain(|&j| overlap_ratio(current, &detections[j]) <= overlap_thresh);
    }
    Ok(keep)
}

/// Keep one box per physical object.
pub fn suppress(detections: &[Detection], overlap_thresh: f32) -> Result<Vec<Detection>> {
    let keep = suppress_indices(detections, overlap_thresh)?;
    Ok(keep.into_iter().map(|i| detections[i].clone()).collect())
}
