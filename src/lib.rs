pub mod alert;
pub mod annotate;
pub mod config;
pub mod detection;
pub mod dispatch;
pub mod dwell;
pub mod error;
pub mod matcher;
pub mod pipeline;
pub mod source;
pub mod suppression;
pub mod track;
pub mod tracker;

// Re-export main types
pub use crate::alert::{AlertEngine, AlertEvent, OccupancyDedup};
pub use crate::config::Config;
pub use crate::detection::Detection;
pub use crate::error::MonitorError;
pub use crate::pipeline::{FrameReport, Monitor};
pub use crate::tracker::CentroidTracker;
