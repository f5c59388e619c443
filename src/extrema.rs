//! Extrema and zero-crossing detection over the detection signal.
//!
//! Three detectors share one [`ExtremaRecord`]:
//! - [`PeakValleyDetector`]: absolute peak/valley bookkeeping, one
//!   [`ExtremaSignal::PairReady`] per completed max→min pair.
//! - [`DirectionDetector`]: reversals of `sign(Δ)` for the Bagilevi and
//!   time-filtering modes.
//! - [`ZeroCrossingTracker`]: sign changes of linear acceleration.

use serde::{Deserialize, Serialize};

/// Last extrema and crossing seen in this session. Written only by the
/// detectors in this module.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtremaRecord {
    #[serde(with = "crate::decimal")]
    last_max: f64,
    last_max_timestamp_ms: i64,
    #[serde(with = "crate::decimal")]
    last_min: f64,
    last_min_timestamp_ms: i64,
    #[serde(default)]
    last_zero_crossing_ms: Option<i64>,
}

impl ExtremaRecord {
    pub fn last_max(&self) -> Extremum {
        Extremum { value: self.last_max, timestamp_ms: self.last_max_timestamp_ms }
    }

    pub fn last_min(&self) -> Extremum {
        Extremum { value: self.last_min, timestamp_ms: self.last_min_timestamp_ms }
    }

    pub fn last_zero_crossing_ms(&self) -> Option<i64> {
        self.last_zero_crossing_ms
    }

    pub(crate) fn record_max(&mut self, value: f64, timestamp_ms: i64) {
        self.last_max = value;
        self.last_max_timestamp_ms = timestamp_ms;
    }

    pub(crate) fn record_min(&mut self, value: f64, timestamp_ms: i64) {
        self.last_min = value;
        self.last_min_timestamp_ms = timestamp_ms;
    }

    pub(crate) fn record_zero_crossing(&mut self, timestamp_ms: i64) {
        self.last_zero_crossing_ms = Some(timestamp_ms);
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extremum {
    pub value: f64,
    pub timestamp_ms: i64,
}

/// A local maximum followed by a local minimum: one half-step cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExtremaPair {
    pub max: Extremum,
    pub min: Extremum,
}

impl ExtremaPair {
    pub fn difference(&self) -> f64 {
        (self.max.value - self.min.value).abs()
    }

    /// Time between the two phases.
    pub fn duration_ms(&self) -> i64 {
        (self.min.timestamp_ms - self.max.timestamp_ms).abs()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ExtremaSignal {
    Peak(Extremum),
    PairReady(ExtremaPair),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PeakValleyDetector {
    previous: Option<Extremum>,
    peak_detected: bool,
    valley_detected: bool,
}

impl PeakValleyDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peak_pending(&self) -> bool {
        self.peak_detected
    }

    pub fn update(&mut self, value: f64, timestamp_ms: i64, record: &mut ExtremaRecord) -> Option<ExtremaSignal> {
        let signal = match self.previous {
            Some(prev) if value <= prev.value && (!self.peak_detected || prev.value > record.last_max) => {
                record.record_max(prev.value, prev.timestamp_ms);
                self.peak_detected = true;
                self.valley_detected = false;
                Some(ExtremaSignal::Peak(prev))
            }
            Some(prev) if self.peak_detected && value >= prev.value => Some(self.complete_pair(prev, record)),
            _ => None,
        };
        self.previous = Some(Extremum { value, timestamp_ms });
        signal
    }

    /// End of stream: the last sample after a pending peak is the valley.
    pub fn finish(&mut self, record: &mut ExtremaRecord) -> Option<ExtremaSignal> {
        match self.previous {
            Some(prev) if self.peak_detected => Some(self.complete_pair(prev, record)),
            _ => None,
        }
    }

    fn complete_pair(&mut self, valley: Extremum, record: &mut ExtremaRecord) -> ExtremaSignal {
        record.record_min(valley.value, valley.timestamp_ms);
        self.valley_detected = true;
        let pair = ExtremaPair { max: record.last_max(), min: record.last_min() };
        self.peak_detected = false;
        self.valley_detected = false;
        ExtremaSignal::PairReady(pair)
    }
}

/// Which side of a reversal an extreme sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parity {
    Max,
    Min,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reversal {
    pub parity: Parity,
    pub extreme: Extremum,
    /// |this extreme - last extreme of the opposite parity|
    pub difference: f64,
    /// Set when this reversal closes a max→min pair.
    pub pair: Option<ExtremaPair>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DirectionDetector {
    previous: Option<Extremum>,
    direction: i8,
    seen_max: bool,
    seen_min: bool,
    max_since_pair: bool,
}

impl DirectionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raised once both a maximum and a minimum have been observed, so
    /// reversal differences are meaningful.
    pub fn continuous_detection(&self) -> bool {
        self.seen_max && self.seen_min
    }

    pub fn update(&mut self, value: f64, timestamp_ms: i64, record: &mut ExtremaRecord) -> Option<Reversal> {
        let prev = match self.previous.replace(Extremum { value, timestamp_ms }) {
            Some(prev) => prev,
            None => return None,
        };
        let direction = match value.partial_cmp(&prev.value) {
            Some(std::cmp::Ordering::Greater) => 1,
            Some(std::cmp::Ordering::Less) => -1,
            _ => return None,
        };
        let last = std::mem::replace(&mut self.direction, direction);
        if last == 0 || last == direction {
            return None;
        }

        // Rising after falling: prev was a minimum.
        let parity = if direction > 0 { Parity::Min } else { Parity::Max };
        let mut pair = None;
        let difference = match parity {
            Parity::Max => {
                record.record_max(prev.value, prev.timestamp_ms);
                self.seen_max = true;
                self.max_since_pair = true;
                (prev.value - record.last_min).abs()
            }
            Parity::Min => {
                record.record_min(prev.value, prev.timestamp_ms);
                self.seen_min = true;
                if std::mem::take(&mut self.max_since_pair) {
                    pair = Some(ExtremaPair { max: record.last_max(), min: record.last_min() });
                }
                (prev.value - record.last_max).abs()
            }
        };
        Some(Reversal { parity, extreme: prev, difference, pair })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ZeroCrossingTracker {
    last_sign: i8,
}

impl ZeroCrossingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when `linear_acceleration` changed sign at this sample.
    /// Exact zeros keep the previous sign.
    pub fn update(&mut self, linear_acceleration: f64, timestamp_ms: i64, record: &mut ExtremaRecord) -> bool {
        let sign = if linear_acceleration > 0.0 {
            1
        } else if linear_acceleration < 0.0 {
            -1
        } else {
            return false;
        };
        let crossed = self.last_sign != 0 && sign != self.last_sign;
        if crossed {
            record.record_zero_crossing(timestamp_ms);
        }
        self.last_sign = sign;
        crossed
    }
}
