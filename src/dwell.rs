use std::time::Instant;

use crate::track::TrackedObject;

/// Dwell value of one live object after a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DwellReading {
    pub id: u64,
    pub dwell_seconds: f64,
}

/// Accumulates per-object presence time.
///
/// Time only ever grows for a live id. A dropped id takes its accumulator with
/// it, so a person who reappears starts again from zero under a new id.
#[derive(Debug, Default)]
pub struct DwellEngine;

impl DwellEngine {
    pub fn new() -> Self {
        DwellEngine
    }

    /// Advance every live object to `now`. Objects registered this frame start at zero.
    pub fn update<'a, I>(&self, objects: I, now: Instant) -> Vec<DwellReading>
    where
        I: IntoIterator<Item = &'a mut TrackedObject>,
    {
        objects
            .into_iter()
            .map(|obj| {
                if obj.is_new() {
                    obj.dwell = std::time::Duration::ZERO;
                } else {
                    // saturates if the caller's clock steps backwards
                    obj.dwell += now.saturating_duration_since(obj.last_update);
                }
                obj.last_update = now;
                DwellReading { id: obj.id, dwell_seconds: obj.dwell_seconds() }
            })
            .collect()
    }
}
