//! Filter bank: exactly one strategy is active per session, each variant
//! carrying its own state.

pub mod bagilevi;
pub mod butterworth;
pub mod low_pass;

pub use bagilevi::bagilevi_value;
pub use butterworth::{BandPass, Biquad, ButterworthLowPass, IirCascade};
pub use low_pass::ExponentialLowPass;

use crate::config::{Configuration, FilterKind};
use crate::error::Result;
use crate::resultant::{linear_acceleration, resultant, Orientation};
use crate::types::{DerivedSignal, Vec3};

/// Live per-axis Butterworth. Any change of order, cutoff or rate swaps in a
/// freshly designed filter; its delay lines prime on the next sample.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveButterworth {
    order: usize,
    inner: ButterworthLowPass,
}

impl LiveButterworth {
    pub fn new(order: usize, cutoff_hz: f64, sample_rate: f64) -> Result<Self> {
        Ok(Self {
            order,
            inner: ButterworthLowPass::new(order, cutoff_hz, sample_rate)?,
        })
    }

    /// Returns true when a new filter replaced the old one.
    pub fn retune(&mut self, sample_rate: f64, cutoff_hz: f64) -> Result<bool> {
        if self.inner.matches(self.order, cutoff_hz, sample_rate) {
            return Ok(false);
        }
        self.inner = ButterworthLowPass::new(self.order, cutoff_hz, sample_rate)?;
        Ok(true)
    }

    pub fn cutoff_hz(&self) -> f64 {
        self.inner.cutoff_hz()
    }

    pub fn process(&mut self, input: &Vec3) -> Vec3 {
        self.inner.process(input)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterBank {
    Bagilevi,
    LowPass { filter: ExponentialLowPass, cutoff_hz: f64 },
    PassThrough,
    RotationProjected,
    Butterworth(LiveButterworth),
}

impl FilterBank {
    pub fn new(kind: FilterKind, order: usize, sample_rate: f64, cutoff_hz: f64) -> Result<Self> {
        Ok(match kind {
            FilterKind::Bagilevi => FilterBank::Bagilevi,
            FilterKind::LowPass => FilterBank::LowPass {
                filter: ExponentialLowPass::new(sample_rate, cutoff_hz),
                cutoff_hz,
            },
            FilterKind::PassThrough => FilterBank::PassThrough,
            FilterKind::RotationProjected => FilterBank::RotationProjected,
            FilterKind::Butterworth => {
                FilterBank::Butterworth(LiveButterworth::new(order, cutoff_hz, sample_rate)?)
            }
        })
    }

    pub fn from_config(config: &Configuration, sample_rate: f64) -> Result<Self> {
        let cutoff = config.cutoff_frequency.resolve(sample_rate);
        Self::new(config.filter, config.butterworth_order, sample_rate, cutoff)
    }

    pub fn kind(&self) -> FilterKind {
        match self {
            FilterBank::Bagilevi => FilterKind::Bagilevi,
            FilterBank::LowPass { .. } => FilterKind::LowPass,
            FilterBank::PassThrough => FilterKind::PassThrough,
            FilterBank::RotationProjected => FilterKind::RotationProjected,
            FilterBank::Butterworth(_) => FilterKind::Butterworth,
        }
    }

    pub fn cutoff_hz(&self) -> Option<f64> {
        match self {
            FilterBank::LowPass { cutoff_hz, .. } => Some(*cutoff_hz),
            FilterBank::Butterworth(bw) => Some(bw.cutoff_hz()),
            _ => None,
        }
    }

    /// Chart label of the active strategy.
    pub fn label(&self) -> String {
        match self {
            FilterBank::Bagilevi => "Bagilevi".to_string(),
            FilterBank::LowPass { cutoff_hz, .. } => format!("Low-pass {:.1} Hz", cutoff_hz),
            FilterBank::PassThrough => "No filter".to_string(),
            FilterBank::RotationProjected => "Rotation (world Z)".to_string(),
            FilterBank::Butterworth(bw) => format!("Butterworth {:.1} Hz", bw.cutoff_hz()),
        }
    }

    /// Push new rate/cutoff into rate-tracking strategies. Returns true when
    /// filter state was discarded.
    pub fn retune(&mut self, sample_rate: f64, cutoff: f64) -> Result<bool> {
        match self {
            FilterBank::LowPass { filter, cutoff_hz } => {
                *cutoff_hz = cutoff;
                Ok(filter.retune(sample_rate, cutoff))
            }
            FilterBank::Butterworth(bw) => bw.retune(sample_rate, cutoff),
            _ => Ok(false),
        }
    }

    /// Derive the detection signal for one accelerometer sample.
    pub fn apply(&mut self, accel: &Vec3, orientation: &Orientation, gravity: f64) -> DerivedSignal {
        let magnitude = resultant(accel.x, accel.y, accel.z);
        let filtered_magnitude = match self {
            FilterBank::Bagilevi => bagilevi_value(accel),
            FilterBank::LowPass { filter, .. } => filter.update(accel).norm(),
            FilterBank::PassThrough => magnitude,
            FilterBank::RotationProjected => orientation.world_acceleration(accel).z,
            FilterBank::Butterworth(bw) => bw.process(accel).norm(),
        };
        // The Bagilevi value is not in m/s², so crossings use the raw magnitude.
        let reference = match self {
            FilterBank::Bagilevi => magnitude,
            _ => filtered_magnitude,
        };
        DerivedSignal {
            magnitude,
            filtered_magnitude,
            linear_acceleration: linear_acceleration(reference, gravity),
        }
    }
}
