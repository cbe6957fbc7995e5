//! Fire-and-forget delivery of alert side effects.
//!
//! The frame loop hands events to a bounded queue drained by a small pool of
//! worker threads. Submitting never blocks: when the queue is full the event is
//! dropped and counted, and it still counts as delivered for dedup purposes.

use chrono::{DateTime, Local};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde_json::json;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{error, info, warn};

use crate::alert::AlertEvent;
use crate::error::{MonitorError, Result};

/// Side effect performed for every dispatched alert.
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &'static str;
    fn deliver(&self, event: &AlertEvent) -> Result<()>;
}

/// Console output through `tracing`.
#[derive(Debug, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn deliver(&self, event: &AlertEvent) -> Result<()> {
        match event {
            AlertEvent::Dwell { id, elapsed_seconds } => {
                warn!(id = *id, elapsed_seconds = *elapsed_seconds, "ID:{} time exceeded", id);
            }
            AlertEvent::Occupancy { count, key, .. } => {
                warn!(total_count = *count, key = *key, "person count exceeded | Total Count: {}", count);
            }
        }
        Ok(())
    }
}

/// Persists the frame of an occupancy alert as a JPEG named after the local time.
#[derive(Debug, Clone)]
pub struct SnapshotSink {
    dir: PathBuf,
}

impl SnapshotSink {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Alerts within the same second share a name; the later one overwrites.
    pub fn file_name(at: &DateTime<Local>) -> String {
        format!("person_count_exceeded_{}.jpg", at.format("%H:%M:%S"))
    }
}

impl AlertSink for SnapshotSink {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    fn deliver(&self, event: &AlertEvent) -> Result<()> {
        let snapshot = match event {
            AlertEvent::Occupancy { snapshot: Some(s), .. } => s,
            _ => return Ok(()),
        };

        fs::create_dir_all(&self.dir).map_err(|e| {
            MonitorError::Persistence(format!("cannot create {}: {}", self.dir.display(), e))
        })?;
        let path = self.dir.join(Self::file_name(&Local::now()));
        snapshot
            .save(&path)
            .map_err(|e| MonitorError::Persistence(format!("cannot write {}: {}", path.display(), e)))?;
        info!(path = %path.display(), "saved occupancy snapshot");
        Ok(())
    }
}

/// Appends one JSON object per alert to a log file.
#[derive(Debug)]
pub struct AlertLogSink {
    file: Mutex<File>,
}

impl AlertLogSink {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                MonitorError::Persistence(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| MonitorError::Persistence(format!("cannot open {}: {}", path.display(), e)))?;
        Ok(Self { file: Mutex::new(file) })
    }
}

impl AlertSink for AlertLogSink {
    fn name(&self) -> &'static str {
        "alert_log"
    }

    fn deliver(&self, event: &AlertEvent) -> Result<()> {
        let timestamp = Local::now().to_rfc3339();
        let record = match event {
            AlertEvent::Dwell { id, elapsed_seconds } => json!({
                "kind": event.kind(),
                "id": id,
                "elapsed_seconds": elapsed_seconds,
                "timestamp": timestamp,
            }),
            AlertEvent::Occupancy { count, key, .. } => json!({
                "kind": event.kind(),
                "count": count,
                "key": key,
                "timestamp": timestamp,
            }),
        };

        let mut file = self
            .file
            .lock()
            .map_err(|_| MonitorError::Persistence("alert log lock poisoned".into()))?;
        writeln!(file, "{}", record)
            .map_err(|e| MonitorError::Persistence(format!("cannot append alert log: {}", e)))
    }
}

/// Counters shared between the dispatcher and its workers.
#[derive(Debug, Default)]
pub struct DispatchStats {
    pub delivered: AtomicU64,
    pub failed: AtomicU64,
    pub dropped: AtomicU64,
}

impl DispatchStats {
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

pub struct AlertDispatcher {
    tx: Option<Sender<AlertEvent>>,
    workers: Vec<JoinHandle<()>>,
    stats: Arc<DispatchStats>,
}

impl AlertDispatcher {
    pub fn new(sinks: Vec<Arc<dyn AlertSink>>, workers: usize, capacity: usize) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        let stats = Arc::new(DispatchStats::default());
        let sinks = Arc::new(sinks);

        let mut handles = Vec::with_capacity(workers.max(1));
        for n in 0..workers.max(1) {
            let rx = rx.clone();
            let sinks = Arc::clone(&sinks);
            let stats = Arc::clone(&stats);
            let handle = thread::Builder::new()
                .name(format!("alert-worker-{}", n))
                .spawn(move || worker_loop(rx, &sinks, &stats))
                .map_err(|e| MonitorError::Configuration(format!("cannot start alert worker: {}", e)))?;
            handles.push(handle);
        }

        Ok(AlertDispatcher { tx: Some(tx), workers: handles, stats })
    }

    /// Queue an event without blocking. Returns false if it had to be dropped.
    pub fn dispatch(&self, event: AlertEvent) -> bool {
        let tx = match &self.tx {
            Some(tx) => tx,
            None => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        };
        match tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(kind = event.kind(), "alert queue full, dropping alert");
                false
            }
            Err(TrySendError::Disconnected(event)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(kind = event.kind(), "alert workers gone, dropping alert");
                false
            }
        }
    }

    pub fn stats(&self) -> Arc<DispatchStats> {
        Arc::clone(&self.stats)
    }

    /// Close the queue and wait for the workers to drain it.
    pub fn shutdown(&mut self) {
        self.tx.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("alert worker panicked");
            }
        }
    }
}

impl Drop for AlertDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(rx: Receiver<AlertEvent>, sinks: &[Arc<dyn AlertSink>], stats: &DispatchStats) {
    for event in rx.iter() {
        let mut ok = true;
        for sink in sinks {
            if let Err(e) = sink.deliver(&event) {
                // no retry: the alert is already recorded as sent
                error!(sink = sink.name(), kind = event.kind(), error = %e, "alert side effect failed");
                ok = false;
            }
        }
        if ok {
            stats.delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            stats.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::FrameSnapshot;
    use chrono::TimeZone;
    use crossbeam_channel::bounded;
    use image::RgbImage;
    use std::time::Duration;

    struct RecordingSink {
        seen: Mutex<Vec<String>>,
    }

    impl AlertSink for RecordingSink {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn deliver(&self, event: &AlertEvent) -> Result<()> {
            self.seen.lock().unwrap().push(event.kind().to_string());
            Ok(())
        }
    }

    struct FailingSink;

    impl AlertSink for FailingSink {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn deliver(&self, _event: &AlertEvent) -> Result<()> {
            Err(MonitorError::Persistence("disk full".into()))
        }
    }

    /// Blocks until released, to hold a worker busy.
    struct GateSink {
        gate: Receiver<()>,
    }

    impl AlertSink for GateSink {
        fn name(&self) -> &'static str {
            "gate"
        }

        fn deliver(&self, _event: &AlertEvent) -> Result<()> {
            let _ = self.gate.recv_timeout(Duration::from_secs(5));
            Ok(())
        }
    }

    fn dwell(id: u64) -> AlertEvent {
        AlertEvent::Dwell { id, elapsed_seconds: 4.0 }
    }

    #[test]
    fn test_all_events_reach_sinks_before_shutdown_returns() {
        let sink = Arc::new(RecordingSink { seen: Mutex::new(Vec::new()) });
        let mut dispatcher = AlertDispatcher::new(vec![sink.clone()], 2, 16).unwrap();
        for id in 0..10 {
            assert!(dispatcher.dispatch(dwell(id)));
        }
        dispatcher.shutdown();

        assert_eq!(sink.seen.lock().unwrap().len(), 10);
        assert_eq!(dispatcher.stats().delivered(), 10);
    }

    #[test]
    fn test_failed_side_effect_is_counted_not_retried() {
        let mut dispatcher = AlertDispatcher::new(vec![Arc::new(FailingSink)], 1, 4).unwrap();
        dispatcher.dispatch(dwell(1));
        dispatcher.shutdown();

        let stats = dispatcher.stats();
        assert_eq!(stats.failed(), 1);
        assert_eq!(stats.delivered(), 0);
    }

    #[test]
    fn test_full_queue_drops_without_blocking() {
        let (release, gate) = bounded::<()>(0);
        let mut dispatcher =
            AlertDispatcher::new(vec![Arc::new(GateSink { gate })], 1, 1).unwrap();

        let accepted = (0..20).filter(|&id| dispatcher.dispatch(dwell(id))).count();
        // one event held by the worker, at most one waiting in the queue
        assert!(accepted <= 2);
        assert_eq!(dispatcher.stats().dropped(), (20 - accepted) as u64);

        drop(release);
        dispatcher.shutdown();
    }

    #[test]
    fn test_dispatch_after_shutdown_is_dropped() {
        let mut dispatcher = AlertDispatcher::new(vec![Arc::new(LogSink)], 1, 1).unwrap();
        dispatcher.shutdown();
        assert!(!dispatcher.dispatch(dwell(0)));
    }

    #[test]
    fn test_snapshot_file_name_uses_clock_time() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 42).unwrap();
        assert_eq!(SnapshotSink::file_name(&at), "person_count_exceeded_07:05:42.jpg");
    }

    #[test]
    fn test_snapshot_sink_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("person_count_alert");
        let sink = SnapshotSink::new(&dir);
        let frame: FrameSnapshot = Arc::new(RgbImage::new(8, 8));

        sink.deliver(&AlertEvent::Occupancy { count: 5, key: 1, snapshot: Some(frame) })
            .unwrap();
        let files: Vec<_> = fs::read_dir(&dir).unwrap().collect();
        assert_eq!(files.len(), 1);

        // dwell alerts carry no frame
        sink.deliver(&dwell(3)).unwrap();
    }

    #[test]
    fn test_snapshot_sink_reports_persistence_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not_a_dir");
        fs::write(&blocker, b"x").unwrap();
        let sink = SnapshotSink::new(&blocker);
        let frame: FrameSnapshot = Arc::new(RgbImage::new(8, 8));

        let err = sink
            .deliver(&AlertEvent::Occupancy { count: 5, key: 1, snapshot: Some(frame) })
            .unwrap_err();
        assert!(matches!(err, MonitorError::Persistence(_)));
    }

    #[test]
    fn test_alert_log_appends_json_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("logs").join("alerts.jsonl");
        let sink = AlertLogSink::open(&path).unwrap();
        sink.deliver(&dwell(2)).unwrap();
        sink.deliver(&AlertEvent::Occupancy { count: 6, key: 1, snapshot: None }).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> =
            text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["kind"], "dwell");
        assert_eq!(lines[0]["id"], 2);
        assert_eq!(lines[1]["count"], 6);
    }
}
