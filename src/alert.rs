use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::dwell::DwellReading;

/// Frame image carried by occupancy alerts. Shared so dispatch never copies pixels.
pub type FrameSnapshot = Arc<RgbImage>;

/// How repeated occupancy alerts are suppressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyDedup {
    /// One alert per crowding episode: fires when the count first goes over the
    /// threshold and re-arms once it drops back to or below it.
    #[default]
    Transition,
    /// One alert per representative id, the most recently registered live id of
    /// the frame. Crowding that persists under the same newest id stays quiet;
    /// a newcomer while still crowded alerts again.
    RepresentativeId,
}

#[derive(Debug, Clone)]
pub enum AlertEvent {
    Dwell {
        id: u64,
        elapsed_seconds: f64,
    },
    Occupancy {
        count: usize,
        /// Dedup key the alert was recorded under.
        key: u64,
        snapshot: Option<FrameSnapshot>,
    },
}

impl AlertEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            AlertEvent::Dwell { .. } => "dwell",
            AlertEvent::Occupancy { .. } => "occupancy",
        }
    }
}

/// Keys that already produced an alert.
#[derive(Debug, Default, Clone)]
pub struct AlertState {
    pub dwell_alerted: HashSet<u64>,
    pub count_alerted: HashSet<u64>,
    episode: u64,
    crowded: bool,
}

/// Evaluates the dwell and occupancy rules once per frame.
///
/// All dedup bookkeeping happens here, on the frame thread, before anything is
/// handed to the dispatcher. A key recorded here is never alerted again even if
/// the side effect later fails.
#[derive(Debug)]
pub struct AlertEngine {
    dwell_threshold: f64,
    count_threshold: usize,
    dedup: OccupancyDedup,
    state: AlertState,
}

impl AlertEngine {
    pub fn new(dwell_threshold: f64, count_threshold: usize, dedup: OccupancyDedup) -> Self {
        AlertEngine {
            dwell_threshold,
            count_threshold,
            dedup,
            state: AlertState::default(),
        }
    }

    pub fn state(&self) -> &AlertState {
        &self.state
    }

    pub fn count_threshold(&self) -> usize {
        self.count_threshold
    }

    pub fn dedup(&self) -> OccupancyDedup {
        self.dedup
    }

    /// `readings` must hold every live object of the frame.
    pub fn evaluate(
        &mut self,
        readings: &[DwellReading],
        snapshot: Option<FrameSnapshot>,
    ) -> Vec<AlertEvent> {
        let mut events = Vec::new();

        for reading in readings {
            if reading.dwell_seconds > self.dwell_threshold
                && self.state.dwell_alerted.insert(reading.id)
            {
                events.push(AlertEvent::Dwell {
                    id: reading.id,
                    elapsed_seconds: reading.dwell_seconds,
                });
            }
        }

        let occupancy = readings.len();
        if occupancy > self.count_threshold {
            if let Some(key) = self.occupancy_key(readings) {
                if self.state.count_alerted.insert(key) {
                    events.push(AlertEvent::Occupancy { count: occupancy, key, snapshot });
                }
            }
        } else {
            self.state.crowded = false;
        }

        events
    }

    fn occupancy_key(&mut self, readings: &[DwellReading]) -> Option<u64> {
        match self.dedup {
            OccupancyDedup::RepresentativeId => readings.iter().map(|r| r.id).max(),
            OccupancyDedup::Transition => {
                if !self.state.crowded {
                    self.state.crowded = true;
                    self.state.episode += 1;
                }
                Some(self.state.episode)
            }
        }
    }

    /// Drop bookkeeping for ids that were deregistered. Ids are never reused, so
    /// this cannot re-enable an alert.
    pub fn forget(&mut self, ids: &[u64]) {
        for id in ids {
            self.state.dwell_alerted.remove(id);
            if self.dedup == OccupancyDedup::RepresentativeId {
                self.state.count_alerted.remove(id);
            }
        }
        if !ids.is_empty() {
            debug!(count = ids.len(), "released alert state for deregistered ids");
        }
    }
}
