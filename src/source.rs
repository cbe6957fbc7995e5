use image::RgbImage;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::detection::{Detection, RawDetection};
use crate::error::{MonitorError, Result};

/// One frame as handed to the monitor.
#[derive(Debug, Clone)]
pub struct SourceFrame {
    pub index: u64,
    pub timestamp: Instant,
    /// Person detections, already class and confidence filtered.
    pub detections: Vec<Detection>,
    pub image: RgbImage,
}

/// Produces frames until the stream ends.
pub trait FrameSource {
    /// `Ok(None)` at end of stream. Errors are fatal to the frame loop.
    fn next_frame(&mut self) -> Result<Option<SourceFrame>>;
}

#[derive(Debug, Deserialize)]
struct FrameRecord {
    timestamp_ms: u64,
    #[serde(default)]
    detections: Vec<RawDetection>,
    #[serde(default)]
    image: Option<PathBuf>,
}

/// Replays a JSON-lines detection log written by an upstream detector.
///
/// Each line holds `timestamp_ms`, a `detections` array and an optional
/// `image` path. Frame times are laid out relative to the first record.
pub struct ReplaySource {
    lines: Lines<BufReader<File>>,
    path: PathBuf,
    confidence_threshold: f32,
    frame_size: (u32, u32),
    origin: Instant,
    first_ms: Option<u64>,
    index: u64,
}

impl ReplaySource {
    pub fn open<P: AsRef<Path>>(
        path: P,
        confidence_threshold: f32,
        frame_size: (u32, u32),
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| {
            MonitorError::SourceUnavailable(format!("cannot open {}: {}", path.display(), e))
        })?;
        info!(source = %path.display(), "opened replay source");
        Ok(ReplaySource {
            lines: BufReader::new(file).lines(),
            path,
            confidence_threshold,
            frame_size,
            origin: Instant::now(),
            first_ms: None,
            index: 0,
        })
    }

    fn load_image(&self, image: Option<&Path>) -> Result<RgbImage> {
        let (w, h) = self.frame_size;
        let Some(image_path) = image else {
            return Ok(RgbImage::new(w, h));
        };
        let path = match self.path.parent() {
            Some(dir) if image_path.is_relative() => dir.join(image_path),
            _ => image_path.to_path_buf(),
        };
        let img = image::open(&path).map_err(|e| {
            MonitorError::SourceUnavailable(format!("cannot read frame {}: {}", path.display(), e))
        })?;
        let img = img.to_rgb8();
        if img.dimensions() == (w, h) {
            Ok(img)
        } else {
            Ok(image::imageops::resize(&img, w, h, image::imageops::FilterType::Triangle))
        }
    }
}

impl FrameSource for ReplaySource {
    fn next_frame(&mut self) -> Result<Option<SourceFrame>> {
        let line = loop {
            match self.lines.next() {
                None => return Ok(None),
                Some(Err(e)) => {
                    return Err(MonitorError::SourceUnavailable(format!(
                        "cannot read {}: {}",
                        self.path.display(),
                        e
                    )))
                }
                Some(Ok(line)) if line.trim().is_empty() => continue,
                Some(Ok(line)) => break line,
            }
        };

        let record: FrameRecord = serde_json::from_str(&line).map_err(|e| {
            MonitorError::SourceUnavailable(format!("frame {} unreadable: {}", self.index, e))
        })?;

        let first_ms = *self.first_ms.get_or_insert(record.timestamp_ms);
        let offset = Duration::from_millis(record.timestamp_ms.saturating_sub(first_ms));
        let timestamp = self.origin + offset;

        let detections: Vec<Detection> = record
            .detections
            .into_iter()
            .filter_map(|d| d.into_person(self.confidence_threshold))
            .collect();
        let image = self.load_image(record.image.as_deref())?;

        let frame = SourceFrame { index: self.index, timestamp, detections, image };
        debug!(frame = self.index, detections = frame.detections.len(), "read frame");
        self.index += 1;
        Ok(Some(frame))
    }
}
