pub mod linalg;

pub use linalg::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Accelerometer,
    Magnetometer,
    Gravity,
    Rotation,
}

impl SensorKind {
    /// Field prefix used by the recorded-session format (`acceleration_x`, ...).
    pub fn field_prefix(&self) -> &'static str {
        match self {
            SensorKind::Accelerometer => "acceleration",
            SensorKind::Magnetometer => "magnetometer",
            SensorKind::Gravity => "gravity",
            SensorKind::Rotation => "rotation",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorKind::Accelerometer => "accelerometer",
            SensorKind::Magnetometer => "magnetometer",
            SensorKind::Gravity => "gravity",
            SensorKind::Rotation => "rotation",
        };
        f.write_str(name)
    }
}

impl FromStr for SensorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accelerometer" | "accel" | "acceleration" => Ok(SensorKind::Accelerometer),
            "magnetometer" | "mag" => Ok(SensorKind::Magnetometer),
            "gravity" => Ok(SensorKind::Gravity),
            "rotation" | "rotation_vector" => Ok(SensorKind::Rotation),
            other => Err(format!("unknown sensor kind '{}'", other)),
        }
    }
}

/// One typed vector reading as delivered by the acquisition layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    pub kind: SensorKind,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub timestamp_ms: i64,
}

impl SensorSample {
    pub fn new(kind: SensorKind, x: f64, y: f64, z: f64, timestamp_ms: i64) -> Self {
        Self { kind, x, y, z, timestamp_ms }
    }

    pub fn accel(x: f64, y: f64, z: f64, timestamp_ms: i64) -> Self {
        Self::new(SensorKind::Accelerometer, x, y, z, timestamp_ms)
    }

    pub fn vector(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

/// Values the pipeline derives from the latest accelerometer sample.
/// Overwritten in place on every event.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DerivedSignal {
    pub magnitude: f64,
    pub filtered_magnitude: f64,
    pub linear_acceleration: f64,
}
