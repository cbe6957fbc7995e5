use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::alert::OccupancyDedup;
use crate::error::{MonitorError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Dwell threshold in seconds.
    pub person_duration: f64,
    /// Occupancy threshold; alerts fire when the live count exceeds it.
    #[serde(rename = "personCountExceed")]
    pub person_count_exceed: usize,
    /// Opaque source identifier handed to the frame source.
    pub vid_source: String,

    #[serde(default = "default_max_disappeared")]
    pub max_disappeared: u32,
    #[serde(default = "default_overlap_threshold")]
    pub overlap_threshold: f32,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    /// Directory for occupancy snapshots, created on first use.
    #[serde(default = "default_alert_dir")]
    pub alert_dir: PathBuf,
    /// Optional JSON-lines alert log.
    #[serde(default)]
    pub alert_log: Option<PathBuf>,
    #[serde(default = "default_alert_workers")]
    pub alert_workers: usize,
    #[serde(default = "default_alert_queue_capacity")]
    pub alert_queue_capacity: usize,
    #[serde(default)]
    pub occupancy_dedup: OccupancyDedup,
    /// Upper bound on centroid distance for a match. `None` keeps the uncapped greedy policy.
    #[serde(default)]
    pub max_match_distance: Option<f32>,
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,
    #[serde(default = "default_frame_height")]
    pub frame_height: u32,
}

fn default_max_disappeared() -> u32 {
    15
}

fn default_overlap_threshold() -> f32 {
    0.3
}

fn default_confidence_threshold() -> f32 {
    0.65
}

fn default_alert_dir() -> PathBuf {
    PathBuf::from("person_count_alert")
}

fn default_alert_workers() -> usize {
    2
}

fn default_alert_queue_capacity() -> usize {
    64
}

fn default_frame_width() -> u32 {
    640
}

fn default_frame_height() -> u32 {
    480
}

impl Config {
    /// Load from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|e| {
            MonitorError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&data)
    }

    /// Parse and validate a JSON document.
    pub fn from_json(data: &str) -> Result<Self> {
        let cfg: Config = serde_json::from_str(data)
            .map_err(|e| MonitorError::Configuration(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if !self.person_duration.is_finite() || self.person_duration < 0.0 {
            return Err(MonitorError::Configuration(format!(
                "person_duration must be a non-negative number of seconds, got {}",
                self.person_duration
            )));
        }
        if !(0.0..=1.0).contains(&self.overlap_threshold) {
            return Err(MonitorError::Configuration(format!(
                "overlap_threshold must lie in [0, 1], got {}",
                self.overlap_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(MonitorError::Configuration(format!(
                "confidence_threshold must lie in [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.max_disappeared == 0 {
            return Err(MonitorError::Configuration(
                "max_disappeared must be at least 1".into(),
            ));
        }
        if self.alert_workers == 0 || self.alert_queue_capacity == 0 {
            return Err(MonitorError::Configuration(
                "alert_workers and alert_queue_capacity must be at least 1".into(),
            ));
        }
        if let Some(d) = self.max_match_distance {
            if !d.is_finite() || d <= 0.0 {
                return Err(MonitorError::Configuration(format!(
                    "max_match_distance must be positive, got {}",
                    d
                )));
            }
        }
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(MonitorError::Configuration(
                "frame size must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = Config::from_json(
            r#"{"person_duration": 3, "personCountExceed": 4, "vid_source": "cam.jsonl"}"#,
        )
        .unwrap();

        assert_eq!(cfg.person_duration, 3.0);
        assert_eq!(cfg.person_count_exceed, 4);
        assert_eq!(cfg.vid_source, "cam.jsonl");
        assert_eq!(cfg.max_disappeared, 15);
        assert_eq!(cfg.overlap_threshold, 0.3);
        assert_eq!(cfg.alert_dir, PathBuf::from("person_count_alert"));
        assert_eq!(cfg.occupancy_dedup, OccupancyDedup::Transition);
        assert!(cfg.max_match_distance.is_none());
        assert_eq!((cfg.frame_width, cfg.frame_height), (640, 480));
    }

    #[test]
    fn test_missing_required_key_is_configuration_error() {
        let err = Config::from_json(r#"{"person_duration": 3, "vid_source": "x"}"#).unwrap_err();
        assert!(matches!(err, MonitorError::Configuration(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = Config::from_file("/nonexistent/dwellwatch/config.json").unwrap_err();
        assert!(matches!(err, MonitorError::Configuration(_)));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let bad_overlap = r#"{"person_duration": 3, "personCountExceed": 4, "vid_source": "x",
                              "overlap_threshold": 1.5}"#;
        assert!(Config::from_json(bad_overlap).is_err());

        let bad_duration = r#"{"person_duration": -1, "personCountExceed": 4, "vid_source": "x"}"#;
        assert!(Config::from_json(bad_duration).is_err());

        let zero_workers = r#"{"person_duration": 3, "personCountExceed": 4, "vid_source": "x",
                               "alert_workers": 0}"#;
        assert!(Config::from_json(zero_workers).is_err());
    }

    #[test]
    fn test_dedup_policy_parses() {
        let cfg = Config::from_json(
            r#"{"person_duration": 3, "personCountExceed": 4, "vid_source": "x",
                "occupancy_dedup": "representative_id", "max_match_distance": 80.0}"#,
        )
        .unwrap();
        assert_eq!(cfg.occupancy_dedup, OccupancyDedup::RepresentativeId);
        assert_eq!(cfg.max_match_distance, Some(80.0));
    }
}
