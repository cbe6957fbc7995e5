use image::RgbImage;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::alert::{AlertEngine, AlertEvent, FrameSnapshot};
use crate::annotate::Annotation;
use crate::config::Config;
use crate::detection::Detection;
use crate::dispatch::{AlertDispatcher, AlertLogSink, AlertSink, DispatchStats, LogSink, SnapshotSink};
use crate::dwell::DwellEngine;
use crate::error::Result;
use crate::matcher::{CappedGreedyMatcher, GreedyMatcher, Matcher};
use crate::suppression::suppress;
use crate::tracker::CentroidTracker;

/// Outcome of one processed frame.
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    pub annotations: Vec<Annotation>,
    pub occupancy: usize,
    pub registered: Vec<u64>,
    pub deregistered: Vec<u64>,
    /// Alerts decided this frame; side effects run asynchronously.
    pub events: Vec<AlertEvent>,
}

/// Per-stream state: suppression, tracking, dwell and alerting.
///
/// Frames must be fed in order from a single thread; only the alert side
/// effects leave this thread.
pub struct Monitor {
    overlap_threshold: f32,
    tracker: CentroidTracker,
    dwell: DwellEngine,
    alerts: AlertEngine,
    dispatcher: AlertDispatcher,
}

impl Monitor {
    /// Build a monitor with the sinks the config asks for: console log,
    /// snapshot directory and optional alert log.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut sinks: Vec<Arc<dyn AlertSink>> =
            vec![Arc::new(LogSink), Arc::new(SnapshotSink::new(&config.alert_dir))];
        if let Some(path) = &config.alert_log {
            sinks.push(Arc::new(AlertLogSink::open(path)?));
        }
        Self::with_sinks(config, sinks)
    }

    pub fn with_sinks(config: &Config, sinks: Vec<Arc<dyn AlertSink>>) -> Result<Self> {
        let matcher: Box<dyn Matcher> = match config.max_match_distance {
            Some(d) => Box::new(CappedGreedyMatcher::new(d)),
            None => Box::new(GreedyMatcher),
        };
        let dispatcher =
            AlertDispatcher::new(sinks, config.alert_workers, config.alert_queue_capacity)?;

        info!(
            person_duration = config.person_duration,
            person_count_exceed = config.person_count_exceed,
            max_disappeared = config.max_disappeared,
            occupancy_dedup = ?config.occupancy_dedup,
            "monitor ready"
        );

        Ok(Monitor {
            overlap_threshold: config.overlap_threshold,
            tracker: CentroidTracker::with_matcher(config.max_disappeared, matcher),
            dwell: DwellEngine::new(),
            alerts: AlertEngine::new(
                config.person_duration,
                config.person_count_exceed,
                config.occupancy_dedup,
            ),
            dispatcher,
        })
    }

    pub fn tracker(&self) -> &CentroidTracker {
        &self.tracker
    }

    pub fn alerts(&self) -> &AlertEngine {
        &self.alerts
    }

    pub fn dispatch_stats(&self) -> Arc<DispatchStats> {
        self.dispatcher.stats()
    }

    /// Run one frame through the pipeline.
    ///
    /// A malformed detection fails the whole frame with `DetectionInput` before
    /// any state is touched, so the caller can skip it and carry on.
    pub fn process_frame(
        &mut self,
        detections: &[Detection],
        frame: Option<&RgbImage>,
        now: Instant,
    ) -> Result<FrameReport> {
        let boxes = suppress(detections, self.overlap_threshold)?;
        debug!(raw = detections.len(), kept = boxes.len(), "suppressed detections");

        let update = self.tracker.update(&boxes, now);
        let readings = self.dwell.update(self.tracker.objects_mut(), now);
        let occupancy = readings.len();

        // only clone the pixels when an occupancy alert is possible
        let snapshot: Option<FrameSnapshot> = if occupancy > self.alerts.count_threshold() {
            frame.map(|f| Arc::new(f.clone()))
        } else {
            None
        };
        let events = self.alerts.evaluate(&readings, snapshot);
        self.alerts.forget(&update.deregistered);

        for event in &events {
            self.dispatcher.dispatch(event.clone());
        }

        let annotations = self.tracker.objects().values().map(Annotation::from_object).collect();

        Ok(FrameReport {
            annotations,
            occupancy,
            registered: update.registered,
            deregistered: update.deregistered,
            events,
        })
    }

    /// Wait for queued alert side effects to finish.
    pub fn shutdown(&mut self) {
        self.dispatcher.shutdown();
    }
}
