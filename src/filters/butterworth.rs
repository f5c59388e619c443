//! Butterworth IIR filters as cascaded biquads.
//!
//! Sections are designed with the bilinear transform (cutoff pre-warped) and
//! run in Direct Form II Transposed. A cascade can be primed to the steady
//! state of its first input so a freshly built filter does not ring up from
//! zero; a rebuilt filter and a brand-new one therefore produce identical
//! output for the same next sample.

use std::f64::consts::PI;

use crate::error::{Result, StepError};
use crate::types::Vec3;

/// Highest usable edge as a fraction of Nyquist.
pub const MAX_NYQUIST_FRACTION: f64 = 0.9;

const MAX_ORDER: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    LowPass,
    HighPass,
}

/// Second-order section: H(z) = (b0 + b1 z^-1 + b2 z^-2) / (1 + a1 z^-1 + a2 z^-2)
#[derive(Debug, Clone, PartialEq)]
pub struct Biquad {
    b: [f64; 3],
    a: [f64; 2],
    state: [f64; 2],
}

impl Biquad {
    pub fn new(b: [f64; 3], a: [f64; 2]) -> Self {
        Self { b, a, state: [0.0; 2] }
    }

    pub fn process(&mut self, input: f64) -> f64 {
        let output = self.b[0] * input + self.state[0];
        self.state[0] = self.b[1] * input - self.a[0] * output + self.state[1];
        self.state[1] = self.b[2] * input - self.a[1] * output;
        output
    }

    pub fn reset(&mut self) {
        self.state = [0.0; 2];
    }

    pub fn dc_gain(&self) -> f64 {
        (self.b[0] + self.b[1] + self.b[2]) / (1.0 + self.a[0] + self.a[1])
    }

    /// Load the delay line with the steady state for a constant input `x`.
    /// Returns the steady-state output.
    pub fn prime(&mut self, x: f64) -> f64 {
        let y = self.dc_gain() * x;
        self.state[1] = self.b[2] * x - self.a[1] * y;
        self.state[0] = self.b[1] * x - self.a[0] * y + self.state[1];
        y
    }
}

fn validate_sample_rate(sample_rate: f64) -> Result<f64> {
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(StepError::InvalidSamplingRate(sample_rate));
    }
    Ok(sample_rate / 2.0)
}

/// Design the biquad cascade of an order-`order` Butterworth low/high-pass.
pub fn design(order: usize, cutoff_hz: f64, sample_rate: f64, response: Response) -> Result<Vec<Biquad>> {
    if order == 0 || order > MAX_ORDER {
        return Err(StepError::InvalidOrder(order));
    }
    let nyquist = validate_sample_rate(sample_rate)?;
    if !(cutoff_hz > 0.0 && cutoff_hz <= MAX_NYQUIST_FRACTION * nyquist) {
        return Err(StepError::InvalidCutoff { cutoff_hz, nyquist_hz: nyquist });
    }

    let k = (PI * cutoff_hz / sample_rate).tan();
    let k2 = k * k;
    let mut sections = Vec::with_capacity(order / 2 + 1);

    for i in 0..order / 2 {
        // Analog pole pair: s^2 + 2 sin(phi) s + 1
        let phi = PI * (2 * i + 1) as f64 / (2 * order) as f64;
        let damping = 2.0 * phi.sin();
        let norm = 1.0 / (1.0 + damping * k + k2);
        let a = [2.0 * (k2 - 1.0) * norm, (1.0 - damping * k + k2) * norm];
        let b = match response {
            Response::LowPass => [k2 * norm, 2.0 * k2 * norm, k2 * norm],
            Response::HighPass => [norm, -2.0 * norm, norm],
        };
        sections.push(Biquad::new(b, a));
    }

    if order % 2 == 1 {
        let norm = 1.0 / (1.0 + k);
        let a = [(k - 1.0) * norm, 0.0];
        let b = match response {
            Response::LowPass => [k * norm, k * norm, 0.0],
            Response::HighPass => [norm, -norm, 0.0],
        };
        sections.push(Biquad::new(b, a));
    }

    Ok(sections)
}

#[derive(Debug, Clone, PartialEq)]
pub struct IirCascade {
    sections: Vec<Biquad>,
}

impl IirCascade {
    pub fn new(sections: Vec<Biquad>) -> Self {
        Self { sections }
    }

    pub fn process(&mut self, input: f64) -> f64 {
        self.sections.iter_mut().fold(input, |x, s| s.process(x))
    }

    pub fn prime(&mut self, input: f64) -> f64 {
        self.sections.iter_mut().fold(input, |x, s| s.prime(x))
    }

    pub fn reset(&mut self) {
        self.sections.iter_mut().for_each(Biquad::reset);
    }
}

/// Per-axis low-pass used by the live Butterworth strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct ButterworthLowPass {
    order: usize,
    cutoff_hz: f64,
    sample_rate: f64,
    axes: [IirCascade; 3],
    primed: bool,
}

impl ButterworthLowPass {
    pub fn new(order: usize, cutoff_hz: f64, sample_rate: f64) -> Result<Self> {
        let sections = design(order, cutoff_hz, sample_rate, Response::LowPass)?;
        let cascade = IirCascade::new(sections);
        Ok(Self {
            order,
            cutoff_hz,
            sample_rate,
            axes: [cascade.clone(), cascade.clone(), cascade],
            primed: false,
        })
    }

    pub fn matches(&self, order: usize, cutoff_hz: f64, sample_rate: f64) -> bool {
        self.order == order && self.cutoff_hz == cutoff_hz && self.sample_rate == sample_rate
    }

    pub fn cutoff_hz(&self) -> f64 {
        self.cutoff_hz
    }

    pub fn process(&mut self, input: &Vec3) -> Vec3 {
        if !self.primed {
            self.primed = true;
            return Vec3::new(
                self.axes[0].prime(input.x),
                self.axes[1].prime(input.y),
                self.axes[2].prime(input.z),
            );
        }
        Vec3::new(
            self.axes[0].process(input.x),
            self.axes[1].process(input.y),
            self.axes[2].process(input.z),
        )
    }
}

/// High-pass → low-pass chain on a single (magnitude) channel.
/// A low edge of 0 Hz drops the high-pass stage.
#[derive(Debug, Clone, PartialEq)]
pub struct BandPass {
    high_pass: Option<IirCascade>,
    low_pass: IirCascade,
    low_hz: f64,
    high_hz: f64,
}

impl BandPass {
    pub fn new(order: usize, low_hz: f64, high_hz: f64, sample_rate: f64) -> Result<Self> {
        if order == 0 || order > MAX_ORDER {
            return Err(StepError::InvalidOrder(order));
        }
        let nyquist = validate_sample_rate(sample_rate)?;
        let limit = MAX_NYQUIST_FRACTION * nyquist;
        if !(low_hz >= 0.0 && low_hz < high_hz && high_hz <= limit) {
            return Err(StepError::InvalidBand { low_hz, high_hz, limit_hz: limit });
        }

        let high_pass = if low_hz > 0.0 {
            Some(IirCascade::new(design(order, low_hz, sample_rate, Response::HighPass)?))
        } else {
            None
        };
        let low_pass = IirCascade::new(design(order, high_hz, sample_rate, Response::LowPass)?);

        Ok(Self { high_pass, low_pass, low_hz, high_hz })
    }

    /// Center/bandwidth form: edges at `center ± bandwidth / 2`, low edge floored at 0.
    pub fn from_center(order: usize, center_hz: f64, bandwidth_hz: f64, sample_rate: f64) -> Result<Self> {
        let low = (center_hz - bandwidth_hz / 2.0).max(0.0);
        let high = center_hz + bandwidth_hz / 2.0;
        Self::new(order, low, high, sample_rate)
    }

    pub fn edges(&self) -> (f64, f64) {
        (self.low_hz, self.high_hz)
    }

    pub fn reset(&mut self) {
        if let Some(hp) = self.high_pass.as_mut() {
            hp.reset();
        }
        self.low_pass.reset();
    }

    pub fn process(&mut self, input: f64) -> f64 {
        let x = match self.high_pass.as_mut() {
            Some(hp) => hp.process(input),
            None => input,
        };
        self.low_pass.process(x)
    }

    /// Causal pass from a zeroed state.
    pub fn filter(&mut self, signal: &[f64]) -> Vec<f64> {
        self.reset();
        signal.iter().map(|&x| self.process(x)).collect()
    }

    /// Forward pass, then a fresh pass over the time-reversed result.
    pub fn filter_zero_phase(&mut self, signal: &[f64]) -> Vec<f64> {
        let mut forward = self.filter(signal);
        forward.reverse();
        let mut backward = self.filter(&forward);
        backward.reverse();
        backward
    }
}
