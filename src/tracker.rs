use nalgebra::Point2;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::debug;

use crate::detection::Detection;
use crate::matcher::{distance_matrix, GreedyMatcher, Matcher};
use crate::track::{TrackedObject, MAX_DISAPPEARED};

/// Ids touched by one call to [`CentroidTracker::update`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TrackerUpdate {
    pub registered: Vec<u64>,
    pub deregistered: Vec<u64>,
}

/// Nearest-centroid multi-object tracker.
///
/// Ids are assigned from a monotonic counter and never reused: an object that
/// comes back after being dropped is registered under a fresh id.
pub struct CentroidTracker {
    next_id: u64,
    /// Live objects keyed by id; iteration follows registration order.
    objects: BTreeMap<u64, TrackedObject>,
    max_disappeared: u32,
    matcher: Box<dyn Matcher>,
}

impl Default for CentroidTracker {
    fn default() -> Self {
        Self::new(MAX_DISAPPEARED)
    }
}

impl CentroidTracker {
    pub fn new(max_disappeared: u32) -> Self {
        Self::with_matcher(max_disappeared, Box::new(GreedyMatcher))
    }

    pub fn with_matcher(max_disappeared: u32, matcher: Box<dyn Matcher>) -> Self {
        CentroidTracker {
            next_id: 0,
            objects: BTreeMap::new(),
            max_disappeared: max_disappeared.max(1),
            matcher,
        }
    }

    pub fn max_disappeared(&self) -> u32 {
        self.max_disappeared
    }

    /// Live objects, including ones currently missing.
    pub fn objects(&self) -> &BTreeMap<u64, TrackedObject> {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> impl Iterator<Item = &mut TrackedObject> {
        self.objects.values_mut()
    }

    pub fn get(&self, id: u64) -> Option<&TrackedObject> {
        self.objects.get(&id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn register(&mut self, detection: &Detection, now: Instant) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.objects.insert(id, TrackedObject::new(id, detection, now));
        debug!(id = id, "registered object");
        id
    }

    /// Associate this frame's suppressed detections with the live objects.
    pub fn update(&mut self, detections: &[Detection], now: Instant) -> TrackerUpdate {
        let mut report = TrackerUpdate::default();
        for obj in self.objects.values_mut() {
            obj.fresh = false;
        }

        let ids: Vec<u64> = self.objects.keys().copied().collect();
        let object_centroids: Vec<Point2<f32>> =
            self.objects.values().map(|o| o.centroid).collect();
        let detection_centroids: Vec<Point2<f32>> =
            detections.iter().map(|d| d.centroid()).collect();

        let distances = distance_matrix(&object_centroids, &detection_centroids);
        let assignment = self.matcher.assign(&distances);

        for &(row, col) in &assignment.matches {
            if let Some(obj) = self.objects.get_mut(&ids[row]) {
                obj.update(&detections[col]);
            }
        }

        for &row in &assignment.unmatched_objects {
            let id = ids[row];
            let drop = match self.objects.get_mut(&id) {
                Some(obj) => obj.mark_missed(self.max_disappeared),
                None => false,
            };
            if drop {
                self.objects.remove(&id);
                debug!(id = id, "deregistered object");
                report.deregistered.push(id);
            }
        }

        for &col in &assignment.unmatched_detections {
            let id = self.register(&detections[col], now);
            report.registered.push(id);
        }

        report
    }
}
