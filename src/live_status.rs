use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::processor::ProcessorSnapshot;

/// Status file polled by the UI layer while a live session runs.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LiveStatus {
    pub timestamp: f64,
    pub accel_samples: u64,
    pub other_samples: u64,
    pub steps: u64,
    pub rejected_steps: u64,
    #[serde(with = "crate::decimal")]
    pub sampling_rate_hz: f64,
    #[serde(with = "crate::decimal")]
    pub detection_threshold: f64,
    #[serde(default, with = "crate::decimal::option")]
    pub cutoff_hz: Option<f64>,
    pub filter_label: String,
    pub uptime_seconds: u64,
    pub input_closed: bool,
}

impl Default for LiveStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveStatus {
    pub fn new() -> Self {
        Self {
            timestamp: current_timestamp(),
            accel_samples: 0,
            other_samples: 0,
            steps: 0,
            rejected_steps: 0,
            sampling_rate_hz: 0.0,
            detection_threshold: 0.0,
            cutoff_hz: None,
            filter_label: String::new(),
            uptime_seconds: 0,
            input_closed: false,
        }
    }

    pub fn update(&mut self, snapshot: &ProcessorSnapshot, uptime_seconds: u64) {
        self.timestamp = current_timestamp();
        self.accel_samples = snapshot.samples;
        self.steps = snapshot.steps;
        self.rejected_steps = snapshot.rejected_steps;
        self.sampling_rate_hz = snapshot.sampling_rate_hz;
        self.detection_threshold = snapshot.detection_threshold;
        self.cutoff_hz = snapshot.cutoff_hz;
        self.filter_label = snapshot.filter_label.clone();
        self.uptime_seconds = uptime_seconds;
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
