use thiserror::Error;

/// Step detection error types
#[derive(Error, Debug)]
pub enum StepError {
    #[error("Invalid sampling rate: {0} Hz")]
    InvalidSamplingRate(f64),

    #[error("Invalid filter order: {0}")]
    InvalidOrder(usize),

    #[error("Invalid cutoff: {cutoff_hz} Hz (Nyquist {nyquist_hz} Hz)")]
    InvalidCutoff { cutoff_hz: f64, nyquist_hz: f64 },

    #[error("Invalid band [{low_hz}, {high_hz}] Hz (limit {limit_hz} Hz)")]
    InvalidBand {
        low_hz: f64,
        high_hz: f64,
        limit_hz: f64,
    },

    #[error("Malformed sample {key}: {reason}")]
    MalformedSample { key: String, reason: String },

    #[error("Insufficient samples: needed {needed}, got {got}")]
    InsufficientSamples { needed: usize, got: usize },

    #[error("No dominant frequency in [{low_hz}, {high_hz}] Hz")]
    NoDominantFrequency { low_hz: f64, high_hz: f64 },

    #[error("Replay cancelled")]
    Cancelled,

    #[error("Replay worker panicked")]
    WorkerPanicked,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for step detection operations
pub type Result<T> = std::result::Result<T, StepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = StepError::InvalidBand {
            low_hz: 1.0,
            high_hz: 30.0,
            limit_hz: 22.5,
        };
        assert_eq!(err.to_string(), "Invalid band [1, 30] Hz (limit 22.5 Hz)");
        assert_eq!(StepError::Cancelled.to_string(), "Replay cancelled");
    }
}
