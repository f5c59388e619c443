use std::f64::consts::PI;

use crate::types::Vec3;

/// Smoothing factor of a first-order RC low-pass, clamped to [0, 1].
pub fn smoothing_factor(sample_rate: f64, cutoff_hz: f64) -> f64 {
    let dt = 1.0 / sample_rate;
    let rc = 1.0 / (2.0 * PI * cutoff_hz);
    (dt / (rc + dt)).clamp(0.0, 1.0)
}

/// Per-axis exponential low-pass: `y += alpha * (x - y)`.
#[derive(Clone, Debug, PartialEq)]
pub struct ExponentialLowPass {
    alpha: f64,
    last_output: Vec3,
    initialized: bool,
}

impl ExponentialLowPass {
    pub fn new(sample_rate: f64, cutoff_hz: f64) -> Self {
        Self {
            alpha: smoothing_factor(sample_rate, cutoff_hz),
            last_output: Vec3::zeros(),
            initialized: false,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Recompute alpha. A changed coefficient drops the accumulator so the
    /// next sample re-seeds it. Returns true when the state was reset.
    pub fn retune(&mut self, sample_rate: f64, cutoff_hz: f64) -> bool {
        let alpha = smoothing_factor(sample_rate, cutoff_hz);
        if alpha == self.alpha {
            return false;
        }
        self.alpha = alpha;
        self.reset();
        true
    }

    pub fn reset(&mut self) {
        self.last_output = Vec3::zeros();
        self.initialized = false;
    }

    pub fn update(&mut self, input: &Vec3) -> Vec3 {
        if !self.initialized {
            self.last_output = *input;
            self.initialized = true;
            return *input;
        }
        self.last_output += (input - self.last_output) * self.alpha;
        self.last_output
    }
}
