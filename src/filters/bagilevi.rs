//! Legacy difference filter from the Bagilevi pedometer.
//!
//! Each component is mapped onto a 480-pixel-high chart as
//! `v = 240 + c * -(240 / MAGNETIC_FIELD_EARTH_MAX)`; averaging the three
//! mapped axes collapses to `(4/3) * Σ(60 - c)`.

use crate::types::Vec3;

/// Android `SensorManager.MAGNETIC_FIELD_EARTH_MAX` (µT).
pub const MAGNETIC_FIELD_EARTH_MAX: f64 = 60.0;

pub const BAGILEVI_SCALE: f64 = 4.0 / 3.0;

pub fn bagilevi_value(v: &Vec3) -> f64 {
    let sum = (MAGNETIC_FIELD_EARTH_MAX - v.x) + (MAGNETIC_FIELD_EARTH_MAX - v.y) + (MAGNETIC_FIELD_EARTH_MAX - v.z);
    sum * BAGILEVI_SCALE
}
