use nalgebra::{Point2, SVector};
use std::time::{Duration, Instant};

use crate::detection::{centroid, Detection};

/// Consecutive missed frames after which an object is dropped, unless configured otherwise.
pub const MAX_DISAPPEARED: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// Matched in the most recent frame.
    Active,
    /// Unmatched for this many consecutive frames, still live.
    Missing(u32),
    /// Terminal; the id is never handed out again.
    Deregistered,
}

/// A person followed across frames.
#[derive(Debug, Clone)]
pub struct TrackedObject {
    pub id: u64,
    /// Box of the last matched detection, (x1, y1, x2, y2).
    pub tlbr: SVector<f32, 4>,
    pub centroid: Point2<f32>,
    pub disappeared: u32,
    pub first_seen: Instant,
    pub last_update: Instant,
    pub dwell: Duration,
    pub state: TrackState,
    /// Registered in the current frame, dwell not yet started.
    pub(crate) fresh: bool,
}

impl TrackedObject {
    pub fn new(id: u64, detection: &Detection, now: Instant) -> Self {
        TrackedObject {
            id,
            tlbr: detection.tlbr,
            centroid: detection.centroid(),
            disappeared: 0,
            first_seen: now,
            last_update: now,
            dwell: Duration::ZERO,
            state: TrackState::Active,
            fresh: true,
        }
    }

    /// Bind to a detection in the current frame.
    pub fn update(&mut self, detection: &Detection) {
        self.tlbr = detection.tlbr;
        self.centroid = centroid(&self.tlbr);
        self.disappeared = 0;
        self.state = TrackState::Active;
    }

    /// Count a frame without a match. Returns true once the object must be dropped.
    pub fn mark_missed(&mut self, max_disappeared: u32) -> bool {
        self.disappeared += 1;
        if self.disappeared >= max_disappeared {
            self.state = TrackState::Deregistered;
            true
        } else {
            self.state = TrackState::Missing(self.disappeared);
            false
        }
    }

    pub fn is_new(&self) -> bool {
        self.fresh
    }

    pub fn dwell_seconds(&self) -> f64 {
        self.dwell.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f32, y: f32) -> Detection {
        Detection::from_corners(x, y, x + 50.0, y + 100.0, 0.9)
    }

    #[test]
    fn test_track_initialization() {
        let now = Instant::now();
        let track = TrackedObject::new(1, &det(100.0, 100.0), now);

        assert_eq!(track.id, 1);
        assert_eq!(track.disappeared, 0);
        assert_eq!(track.state, TrackState::Active);
        assert_eq!(track.first_seen, now);
        assert_eq!(track.last_update, now);
        assert_eq!(track.dwell, Duration::ZERO);
        assert_eq!(track.centroid, Point2::new(125.0, 150.0));
        assert!(track.is_new());
    }

    #[test]
    fn test_track_update_resets_misses() {
        let mut track = TrackedObject::new(1, &det(100.0, 100.0), Instant::now());
        track.mark_missed(MAX_DISAPPEARED);
        track.mark_missed(MAX_DISAPPEARED);
        assert_eq!(track.state, TrackState::Missing(2));

        track.update(&det(110.0, 105.0));
        assert_eq!(track.disappeared, 0);
        assert_eq!(track.state, TrackState::Active);
        assert_eq!(track.centroid, Point2::new(135.0, 155.0));
    }

    #[test]
    fn test_track_state_machine() {
        let mut track = TrackedObject::new(7, &det(0.0, 0.0), Instant::now());

        for k in 1..MAX_DISAPPEARED {
            assert!(!track.mark_missed(MAX_DISAPPEARED));
            assert_eq!(track.state, TrackState::Missing(k));
        }

        assert!(track.mark_missed(MAX_DISAPPEARED));
        assert_eq!(track.state, TrackState::Deregistered);
    }
}
