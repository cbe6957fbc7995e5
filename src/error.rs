use thiserror::Error;

/// Everything that can go wrong while monitoring a stream.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Configuration file or a required key is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The video source cannot be opened or a frame cannot be read.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// A raw detection handed to the suppressor was malformed.
    #[error("invalid detection input: {0}")]
    DetectionInput(String),

    /// An alert side effect (snapshot, alert log) could not be written.
    #[error("failed to persist alert: {0}")]
    Persistence(String),
}

impl MonitorError {
    /// Fatal errors abort the frame loop; the rest only cost the current frame or alert.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MonitorError::Configuration(_) | MonitorError::SourceUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(MonitorError::Configuration("missing".into()).is_fatal());
        assert!(MonitorError::SourceUnavailable("eof".into()).is_fatal());
        assert!(!MonitorError::DetectionInput("nan".into()).is_fatal());
        assert!(!MonitorError::Persistence("disk full".into()).is_fatal());
    }

    #[test]
    fn test_display_names_the_kind() {
        let err = MonitorError::Persistence("disk full".into());
        assert_eq!(err.to_string(), "failed to persist alert: disk full");
    }
}
