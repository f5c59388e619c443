//! Offline step estimate from the autocorrelation of movement segments.
//!
//! Single pass over a finished recording:
//! DC removal → band-pass around the dominant frequency → optional
//! decimation → moving-std segmentation → per-segment autocorrelation lag.
//! Any failure degrades to `samples / 25`.

use log::{debug, warn};
use ndarray::{s, Array1, ArrayView1};
use serde::Serialize;

use crate::config::AutocorrelationSettings;
use crate::error::{Result, StepError};
use crate::filters::BandPass;
use crate::resultant::{dominant_frequency, remove_dc};
use crate::types::Vec3;

/// Physiological step-frequency band searched in the spectrum (Hz).
pub const STEP_BAND_HZ: (f64, f64) = (0.5, 3.0);

/// Effective sampling rate floor (Hz).
pub const MIN_BATCH_RATE_HZ: f64 = 10.0;

/// Decimate above this rate...
pub const DECIMATION_TRIGGER_HZ: f64 = 120.0;
/// ...down to roughly this one.
pub const DECIMATION_TARGET_HZ: f64 = 50.0;

/// Samples per step assumed by the crude fallback.
pub const FALLBACK_SAMPLES_PER_STEP: usize = 25;

/// Peak threshold of the standalone estimator.
pub const SIMPLE_PEAK_THRESHOLD: f64 = 0.7;

/// Accelerometer vectors and their timestamps for one finished recording.
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    vectors: Vec<Vec3>,
    timestamps_s: Vec<f64>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, accel: Vec3, timestamp_ms: i64) {
        self.vectors.push(accel);
        self.timestamps_s.push(timestamp_ms as f64 / 1000.0);
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// `(N - 1) / span`, floored at 10 Hz.
    pub fn effective_rate(&self) -> f64 {
        let rate = match (self.timestamps_s.first(), self.timestamps_s.last()) {
            (Some(first), Some(last)) if last > first => (self.len() - 1) as f64 / (last - first),
            _ => 0.0,
        };
        rate.max(MIN_BATCH_RATE_HZ)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentEstimate {
    /// Start index in the (possibly decimated) signal.
    pub start: usize,
    pub len: usize,
    pub lag: usize,
    pub steps: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartPoint {
    pub sample_index: usize,
    #[serde(with = "crate::decimal")]
    pub filtered_magnitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutocorrelationReport {
    pub steps: usize,
    pub samples: usize,
    pub sample_rate_hz: f64,
    pub dominant_frequency_hz: Option<f64>,
    pub decimation: usize,
    pub segments: Vec<SegmentEstimate>,
    pub chart_points: Vec<ChartPoint>,
    pub fallback: bool,
    pub fallback_reason: Option<String>,
    /// Whole-recording estimate with the stricter peak threshold.
    pub simple_steps: usize,
}

impl AutocorrelationReport {
    fn fallback(buffer: &SampleBuffer, reason: String) -> Self {
        let samples = buffer.len();
        Self {
            steps: samples / FALLBACK_SAMPLES_PER_STEP,
            samples,
            sample_rate_hz: buffer.effective_rate(),
            dominant_frequency_hz: None,
            decimation: 1,
            segments: Vec::new(),
            chart_points: Vec::new(),
            fallback: true,
            fallback_reason: Some(reason),
            simple_steps: simple_estimate(buffer),
        }
    }
}

pub struct AutocorrelationCounter {
    settings: AutocorrelationSettings,
}

impl AutocorrelationCounter {
    pub fn new(settings: AutocorrelationSettings) -> Self {
        Self { settings }
    }

    /// Never fails: internal errors produce the fallback estimate.
    pub fn count(&self, buffer: &SampleBuffer) -> AutocorrelationReport {
        match self.try_count(buffer) {
            Ok(report) => report,
            Err(e) => {
                warn!("autocorrelation failed ({}), using {} samples/step fallback", e, FALLBACK_SAMPLES_PER_STEP);
                AutocorrelationReport::fallback(buffer, e.to_string())
            }
        }
    }

    pub fn try_count(&self, buffer: &SampleBuffer) -> Result<AutocorrelationReport> {
        let n = buffer.len();
        if n < self.settings.min_segment_len {
            return Err(StepError::InsufficientSamples {
                needed: self.settings.min_segment_len,
                got: n,
            });
        }

        let signal = remove_dc(&buffer.vectors);
        let fs = buffer.effective_rate();
        let (low, high) = STEP_BAND_HZ;
        let no_peak = StepError::NoDominantFrequency { low_hz: low, high_hz: high };
        // A motionless recording leaves only rounding noise after DC removal.
        if signal.iter().all(|v| v.abs() < 1e-9) {
            return Err(no_peak);
        }
        let f0 = dominant_frequency(&signal, fs, low, high).ok_or(no_peak)?;

        let mut band = BandPass::new(self.settings.filter_order, 0.5 * f0, 1.5 * f0, fs)?;
        let filtered = if self.settings.zero_phase {
            band.filter_zero_phase(&signal)
        } else {
            band.filter(&signal)
        };

        let decimation = if self.settings.decimate && fs > DECIMATION_TRIGGER_HZ {
            ((fs / DECIMATION_TARGET_HZ).round() as usize).max(2)
        } else {
            1
        };
        let x: Array1<f64> = filtered.iter().step_by(decimation).copied().collect();
        debug!(
            "autocorrelation: n={} fs={:.1} Hz f0={:.2} Hz decimation={} len={}",
            n,
            fs,
            f0,
            decimation,
            x.len()
        );

        let mstd = moving_std(x.view(), self.settings.moving_std_window);
        let threshold = mstd.std(0.0);

        let mut segments = Vec::new();
        let mut chart_points = Vec::new();
        for (start, end) in active_runs(mstd.view(), threshold) {
            let len = end - start;
            if len < self.settings.min_segment_len {
                continue;
            }
            let segment = x.slice(s![start..end]);
            let acf = normalized_autocorrelation(segment);
            let Some(lag) = first_peak_lag(acf.view(), self.settings.peak_threshold) else {
                continue;
            };
            segments.push(SegmentEstimate { start, len, lag, steps: len / lag });
            chart_points.extend(step_markers(segment, start, lag, decimation));
        }

        Ok(AutocorrelationReport {
            steps: segments.iter().map(|s| s.steps).sum(),
            samples: n,
            sample_rate_hz: fs,
            dominant_frequency_hz: Some(f0),
            decimation,
            segments,
            chart_points,
            fallback: false,
            fallback_reason: None,
            simple_steps: simple_estimate(buffer),
        })
    }
}

/// Centered moving standard deviation, window clipped at the edges.
pub fn moving_std(x: ArrayView1<f64>, window: usize) -> Array1<f64> {
    let n = x.len();
    let half = window / 2;
    Array1::from_iter((0..n).map(|i| {
        let lo = i.saturating_sub(half);
        let hi = (i + window - half).min(n);
        x.slice(s![lo..hi]).std(0.0)
    }))
}

/// Contiguous `[start, end)` runs where `values > threshold`.
pub fn active_runs(values: ArrayView1<f64>, threshold: f64) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, &v) in values.iter().enumerate() {
        match (v > threshold, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push((s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, values.len()));
    }
    runs
}

/// Biased autocorrelation of the mean-removed signal, normalized so lag 0 is 1.
pub fn normalized_autocorrelation(x: ArrayView1<f64>) -> Array1<f64> {
    let n = x.len();
    let mean = x.mean().unwrap_or(0.0);
    let centered = x.mapv(|v| v - mean);
    let energy = centered.dot(&centered);
    if n == 0 || energy <= 0.0 {
        return Array1::zeros(n);
    }
    Array1::from_iter((0..n).map(|k| {
        centered.slice(s![..n - k]).dot(&centered.slice(s![k..])) / energy
    }))
}

/// First lag ≥ 1 that is a strict local maximum with value ≥ `threshold`.
pub fn first_peak_lag(acf: ArrayView1<f64>, threshold: f64) -> Option<usize> {
    (1..acf.len().saturating_sub(1)).find(|&k| {
        acf[k] >= threshold && acf[k] > acf[k - 1] && acf[k] > acf[k + 1]
    })
}

/// Largest filtered value in each lag-long window, indexed in the full-rate
/// (undecimated) signal.
fn step_markers(segment: ArrayView1<f64>, start: usize, lag: usize, decimation: usize) -> Vec<ChartPoint> {
    segment
        .axis_chunks_iter(ndarray::Axis(0), lag)
        .enumerate()
        .filter_map(|(chunk_idx, chunk)| {
            chunk
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                .map(|(offset, &value)| ChartPoint {
                    sample_index: (start + chunk_idx * lag + offset) * decimation,
                    filtered_magnitude: value,
                })
        })
        .collect()
}

/// Standalone estimate over the whole recording: DC removal and a single
/// autocorrelation with the stricter 0.7 peak threshold.
pub fn simple_estimate(buffer: &SampleBuffer) -> usize {
    let signal = Array1::from(remove_dc(&buffer.vectors));
    let acf = normalized_autocorrelation(signal.view());
    match first_peak_lag(acf.view(), SIMPLE_PEAK_THRESHOLD) {
        Some(lag) => signal.len() / lag,
        None => {
            warn!("simple estimate found no periodic peak in {} samples", buffer.len());
            buffer.len() / FALLBACK_SAMPLES_PER_STEP
        }
    }
}
