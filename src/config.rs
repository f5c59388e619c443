//! Session context for one detection run.
//!
//! Strategy selections are fixed for the life of a session. The mutable field
//! groups each have a single writer: [`AdaptiveThreshold`] is only updated by
//! the decision engine, [`ExtremaRecord`] by the extrema detectors, and
//! [`Orientation`] by the rotation-projected filter path.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::decision::AdaptiveThreshold;
use crate::error::{Result, StepError};
use crate::extrema::ExtremaRecord;
use crate::filters::butterworth::MAX_NYQUIST_FRACTION;
use crate::resultant::{Orientation, STANDARD_GRAVITY};

/// Lowest cutoff a rate-derived setting may produce.
pub const MIN_CUTOFF_HZ: f64 = 1.0;

/// Lowest sampling rate an estimate may report.
pub const MIN_SAMPLING_RATE_HZ: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Bagilevi,
    LowPass,
    PassThrough,
    RotationProjected,
    Butterworth,
}

impl FilterKind {
    /// Strategies whose coefficients follow the sampling-rate estimate.
    pub fn tracks_sampling_rate(&self) -> bool {
        matches!(self, FilterKind::LowPass | FilterKind::Butterworth)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionAlgorithm {
    PeakDifference,
    CrossingCorrection,
    Bagilevi,
    TimeFiltering,
}

/// Sensor delivery bucket; the nominal rate seeds estimation until the first
/// full second has been observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingFrequency {
    Fastest,
    Game,
    Ui,
    Normal,
}

impl SamplingFrequency {
    pub fn nominal_hz(&self) -> f64 {
        match self {
            SamplingFrequency::Fastest => 100.0,
            SamplingFrequency::Game => 50.0,
            SamplingFrequency::Ui => 16.0,
            SamplingFrequency::Normal => 5.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutoffFrequency {
    /// 2% of the current sampling rate.
    TwoPercent,
    Hz1,
    Hz2,
    Hz3,
    Hz5,
    Hz10,
}

impl CutoffFrequency {
    /// Cutoff for the given sampling rate, floored at 1 Hz and capped at the
    /// highest edge an IIR design accepts.
    pub fn resolve(&self, sample_rate: f64) -> f64 {
        let raw = match self {
            CutoffFrequency::TwoPercent => sample_rate * 0.02,
            CutoffFrequency::Hz1 => 1.0,
            CutoffFrequency::Hz2 => 2.0,
            CutoffFrequency::Hz3 => 3.0,
            CutoffFrequency::Hz5 => 5.0,
            CutoffFrequency::Hz10 => 10.0,
        };
        clamp_cutoff(raw, sample_rate)
    }
}

pub fn clamp_cutoff(cutoff_hz: f64, sample_rate: f64) -> f64 {
    let ceiling = MAX_NYQUIST_FRACTION * sample_rate / 2.0;
    cutoff_hz.max(MIN_CUTOFF_HZ).min(ceiling)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    RealTime,
    Batch,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AutocorrelationSettings {
    pub filter_order: usize,
    pub zero_phase: bool,
    pub decimate: bool,
    pub moving_std_window: usize,
    pub min_segment_len: usize,
    #[serde(with = "crate::decimal")]
    pub peak_threshold: f64,
}

impl Default for AutocorrelationSettings {
    fn default() -> Self {
        Self {
            filter_order: 2,
            zero_phase: true,
            decimate: true,
            moving_std_window: 10,
            min_segment_len: 30,
            peak_threshold: 0.6,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    // ── Strategy selection ──
    pub filter: FilterKind,
    pub recognition: RecognitionAlgorithm,
    pub sampling_frequency: SamplingFrequency,
    pub cutoff_frequency: CutoffFrequency,
    pub mode: ProcessingMode,
    pub false_step_detection: bool,
    pub autocorrelation: bool,

    // ── Tunables ──
    #[serde(with = "crate::decimal")]
    pub gravity: f64,
    pub butterworth_order: usize,
    #[serde(default, with = "crate::decimal::option")]
    pub pinned_sampling_rate_hz: Option<f64>,
    pub history_capacity: usize,
    #[serde(default)]
    pub autocorrelation_settings: AutocorrelationSettings,

    // ── Session state ──
    #[serde(default)]
    pub threshold: AdaptiveThreshold,
    #[serde(default)]
    pub extrema: ExtremaRecord,
    #[serde(default)]
    pub orientation: Orientation,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            filter: FilterKind::Butterworth,
            recognition: RecognitionAlgorithm::PeakDifference,
            sampling_frequency: SamplingFrequency::Fastest,
            cutoff_frequency: CutoffFrequency::Hz3,
            mode: ProcessingMode::RealTime,
            false_step_detection: false,
            autocorrelation: false,
            gravity: STANDARD_GRAVITY,
            butterworth_order: 2,
            pinned_sampling_rate_hz: None,
            history_capacity: 512,
            autocorrelation_settings: AutocorrelationSettings::default(),
            threshold: AdaptiveThreshold::default(),
            extrema: ExtremaRecord::default(),
            orientation: Orientation::default(),
        }
    }
}

impl Configuration {
    pub fn new(filter: FilterKind, recognition: RecognitionAlgorithm) -> Self {
        Self { filter, recognition, ..Self::default() }
    }

    /// Batch replay with a fixed rate: no live estimation.
    pub fn pinned(mut self, sample_rate: f64) -> Self {
        self.pinned_sampling_rate_hz = Some(sample_rate);
        self.mode = ProcessingMode::Batch;
        self
    }

    /// Rate used before (or instead of) live estimation.
    pub fn initial_sampling_rate(&self) -> f64 {
        self.pinned_sampling_rate_hz
            .unwrap_or_else(|| self.sampling_frequency.nominal_hz())
    }

    /// Fail-fast validation of everything the caller configured directly.
    pub fn validate(&self) -> Result<()> {
        if self.butterworth_order == 0 || self.butterworth_order > 20 {
            return Err(StepError::InvalidOrder(self.butterworth_order));
        }
        if let Some(rate) = self.pinned_sampling_rate_hz {
            if !(rate.is_finite() && rate > 0.0) {
                return Err(StepError::InvalidSamplingRate(rate));
            }
        }
        if !(self.gravity.is_finite() && self.gravity > 0.0) {
            return Err(StepError::MalformedSample {
                key: "gravity".to_string(),
                reason: format!("gravity constant must be positive, got {}", self.gravity),
            });
        }
        let ac = &self.autocorrelation_settings;
        if ac.filter_order == 0 || ac.filter_order > 20 {
            return Err(StepError::InvalidOrder(ac.filter_order));
        }
        if ac.moving_std_window < 2 || ac.min_segment_len < 2 {
            return Err(StepError::InsufficientSamples {
                needed: 2,
                got: ac.moving_std_window.min(ac.min_segment_len),
            });
        }
        if !(ac.peak_threshold > 0.0 && ac.peak_threshold <= 1.0) {
            return Err(StepError::MalformedSample {
                key: "peak_threshold".to_string(),
                reason: format!("must lie in (0, 1], got {}", ac.peak_threshold),
            });
        }
        Ok(())
    }

    /// Clear threshold, extrema and orientation state. Required before
    /// switching recognition algorithm.
    pub fn reset_session_state(&mut self) {
        self.threshold = AdaptiveThreshold::default();
        self.extrema = ExtremaRecord::default();
        self.orientation = Orientation::default();
    }

    pub fn switch_recognition(&mut self, recognition: RecognitionAlgorithm) {
        self.reset_session_state();
        self.recognition = recognition;
    }

    pub fn detection_threshold(&self) -> f64 {
        self.threshold.value()
    }
}

/// Serialize snapshots as the JSON array the storage layer persists.
pub fn to_snapshot_json(configs: &[Configuration]) -> Result<String> {
    Ok(serde_json::to_string_pretty(configs)?)
}

pub fn from_snapshot_json(json: &str) -> Result<Vec<Configuration>> {
    let configs: Vec<Configuration> = serde_json::from_str(json)?;
    for config in &configs {
        config.validate()?;
    }
    Ok(configs)
}

pub fn load_snapshot_file(path: &Path) -> Result<Vec<Configuration>> {
    let json = fs::read_to_string(path)?;
    from_snapshot_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vec3;

    #[test]
    fn test_cutoff_resolution() {
        assert_eq!(CutoffFrequency::Hz3.resolve(50.0), 3.0);
        assert_eq!(CutoffFrequency::TwoPercent.resolve(200.0), 4.0);
        // 2% of 20 Hz is 0.4 Hz: floored.
        assert_eq!(CutoffFrequency::TwoPercent.resolve(20.0), MIN_CUTOFF_HZ);
        // Capped below Nyquist for very low rates.
        assert_eq!(CutoffFrequency::Hz10.resolve(5.0), 0.9 * 2.5);
    }

    #[test]
    fn test_validation() {
        assert!(Configuration::default().validate().is_ok());

        let mut bad = Configuration::default();
        bad.butterworth_order = 0;
        assert!(matches!(bad.validate(), Err(StepError::InvalidOrder(0))));

        let bad = Configuration::default().pinned(-5.0);
        assert!(matches!(bad.validate(), Err(StepError::InvalidSamplingRate(_))));
    }

    #[test]
    fn test_initial_sampling_rate() {
        let config = Configuration::default();
        assert_eq!(config.initial_sampling_rate(), 100.0);
        let config = config.pinned(120.0);
        assert_eq!(config.initial_sampling_rate(), 120.0);
        assert_eq!(config.mode, ProcessingMode::Batch);
    }

    #[test]
    fn test_snapshot_round_trip_preserves_every_field() {
        let mut config = Configuration::new(FilterKind::LowPass, RecognitionAlgorithm::CrossingCorrection);
        config.false_step_detection = true;
        config.cutoff_frequency = CutoffFrequency::TwoPercent;
        config.pinned_sampling_rate_hz = Some(49.999_999_999_7);
        config.threshold.fold(2.718_281_828_459_045);
        config.threshold.fold(0.1 + 0.2);
        config.extrema.record_max(10.934_567_890_123_4, 1_700_000_000_123);
        config.extrema.record_min(0.1 + 0.2, 1_700_000_000_456);
        config.extrema.record_zero_crossing(1_700_000_000_300);
        config
            .orientation
            .update_rotation_matrix(&Vec3::new(0.3, 4.1, 8.9), &Vec3::new(12.0, -20.0, -35.0));

        let json = to_snapshot_json(&[config.clone(), Configuration::default()]).unwrap();
        assert!(json.contains("\"0.30000000000000004\""));
        assert!(json.contains(&format!("\"{}\"", config.threshold.sum())));

        let back = from_snapshot_json(&json).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0], config);
        assert_eq!(back[0].detection_threshold().to_bits(), config.detection_threshold().to_bits());
        assert_eq!(back[1], Configuration::default());
    }

    #[test]
    fn test_switch_recognition_resets_state() {
        let mut config = Configuration::default();
        config.threshold.fold(4.0);
        config.extrema.record_max(11.0, 5);
        config.switch_recognition(RecognitionAlgorithm::Bagilevi);
        assert_eq!(config.detection_threshold(), 0.0);
        assert_eq!(config.extrema, ExtremaRecord::default());
        assert_eq!(config.recognition, RecognitionAlgorithm::Bagilevi);
    }
}
