//! Magnitude / resultant calculations shared by the live and batch paths.
//!
//! Also owns the device→world orientation. The matrix is only written through
//! [`Orientation`] methods, which the rotation-projected filter drives.

use nalgebra::{Quaternion, UnitQuaternion};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};

use crate::types::{matrix_from_rows, matrix_to_rows, RotationMatrix, Vec3};

/// Standard gravity (m/s²).
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// Android's free-fall gate: |a|² below 1% of g² cannot define "down".
const FREE_FALL_GRAVITY_SQUARED: f64 = 0.01 * 9.81 * 9.81;

/// Minimum |E × A| before the east axis is considered degenerate.
const MIN_EAST_NORM: f64 = 0.1;

/// Euclidean norm of a 3-vector.
pub fn resultant(x: f64, y: f64, z: f64) -> f64 {
    (x * x + y * y + z * z).sqrt()
}

pub fn linear_acceleration(magnitude: f64, gravity: f64) -> f64 {
    magnitude - gravity
}

/// Magnitudes minus their batch mean. Non-causal: batch path only.
pub fn remove_dc(vectors: &[Vec3]) -> Vec<f64> {
    let magnitudes: Vec<f64> = vectors.iter().map(|v| v.norm()).collect();
    remove_mean(&magnitudes)
}

pub fn remove_mean(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    values.iter().map(|v| v - mean).collect()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    #[serde(with = "crate::decimal::rows")]
    rotation_matrix: [f64; 9],
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            rotation_matrix: matrix_to_rows(&RotationMatrix::identity()),
        }
    }
}

impl Orientation {
    pub fn matrix(&self) -> RotationMatrix {
        matrix_from_rows(&self.rotation_matrix)
    }

    /// Align Z with gravity and Y with magnetic north projected on the
    /// horizontal plane. Returns false and keeps the previous matrix when the
    /// inputs are degenerate (free fall, parallel or zero-length vectors).
    pub fn update_rotation_matrix(&mut self, gravity: &Vec3, geomagnetic: &Vec3) -> bool {
        let norm_sq_a = gravity.norm_squared();
        if norm_sq_a < FREE_FALL_GRAVITY_SQUARED {
            return false;
        }

        let east = geomagnetic.cross(gravity);
        let norm_h = east.norm();
        if norm_h < MIN_EAST_NORM {
            return false;
        }

        let h = east / norm_h;
        let a = gravity / norm_sq_a.sqrt();
        let m = a.cross(&h);

        self.rotation_matrix = [h.x, h.y, h.z, m.x, m.y, m.z, a.x, a.y, a.z];
        true
    }

    /// Orientation from a rotation-vector reading (quaternion vector part).
    pub fn update_from_rotation_vector(&mut self, rotation: &Vec3) -> bool {
        let w_sq = 1.0 - rotation.norm_squared();
        let w = if w_sq > 0.0 { w_sq.sqrt() } else { 0.0 };
        let q = Quaternion::new(w, rotation.x, rotation.y, rotation.z);
        if q.norm() < f64::EPSILON {
            return false;
        }
        let unit = UnitQuaternion::from_quaternion(q);
        self.rotation_matrix = matrix_to_rows(unit.to_rotation_matrix().matrix());
        true
    }

    /// Device-frame acceleration expressed in the world frame.
    pub fn world_acceleration(&self, accel: &Vec3) -> Vec3 {
        self.matrix() * accel
    }
}

/// Magnitude spectrum of a real signal zero-padded to the next power of two.
/// Returns bins `0..=n/2` and the padded length.
pub fn magnitude_spectrum(signal: &[f64]) -> (Vec<f64>, usize) {
    if signal.is_empty() {
        return (Vec::new(), 0);
    }
    let n = signal.len().next_power_of_two();
    let mut buffer: Vec<Complex<f64>> = signal
        .iter()
        .map(|&v| Complex { re: v, im: 0.0 })
        .chain(std::iter::repeat(Complex { re: 0.0, im: 0.0 }))
        .take(n)
        .collect();

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    let spectrum = buffer[..=n / 2].iter().map(|c| c.norm()).collect();
    (spectrum, n)
}

/// Frequency of the strongest spectral bin inside `[low_hz, high_hz]`.
pub fn dominant_frequency(signal: &[f64], sample_rate: f64, low_hz: f64, high_hz: f64) -> Option<f64> {
    let (spectrum, n) = magnitude_spectrum(signal);
    if n < 2 || sample_rate <= 0.0 {
        return None;
    }
    let bin_hz = sample_rate / n as f64;
    spectrum
        .iter()
        .enumerate()
        .skip(1)
        .map(|(k, &mag)| (k as f64 * bin_hz, mag))
        .filter(|&(f, mag)| f >= low_hz && f <= high_hz && mag > 0.0)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(f, _)| f)
}
