//! Online sampling-rate estimate from wall-clock second boundaries.

use crate::config::{Configuration, MIN_SAMPLING_RATE_HZ};

#[derive(Debug, Clone, PartialEq)]
pub struct SamplingRateEstimator {
    pinned: Option<f64>,
    rate_hz: f64,
    current_second: Option<i64>,
    events_this_second: u32,
}

impl SamplingRateEstimator {
    pub fn new(initial_rate_hz: f64, pinned: Option<f64>) -> Self {
        Self {
            pinned,
            rate_hz: pinned.unwrap_or(initial_rate_hz).max(MIN_SAMPLING_RATE_HZ),
            current_second: None,
            events_this_second: 0,
        }
    }

    pub fn from_config(config: &Configuration) -> Self {
        Self::new(config.initial_sampling_rate(), config.pinned_sampling_rate_hz)
    }

    pub fn rate_hz(&self) -> f64 {
        self.rate_hz
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned.is_some()
    }

    /// Count one event. On the first event of a new second the count of the
    /// completed second becomes the estimate and is returned.
    pub fn observe(&mut self, timestamp_ms: i64) -> Option<f64> {
        if self.pinned.is_some() {
            return None;
        }
        let second = (timestamp_ms / 1000).rem_euclid(60);
        match self.current_second {
            Some(current) if current == second => {
                self.events_this_second += 1;
                None
            }
            Some(_) => {
                self.rate_hz = (self.events_this_second as f64).max(MIN_SAMPLING_RATE_HZ);
                self.current_second = Some(second);
                self.events_this_second = 1;
                Some(self.rate_hz)
            }
            None => {
                self.current_second = Some(second);
                self.events_this_second = 1;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_on_second_boundary() {
        let mut est = SamplingRateEstimator::new(100.0, None);
        // 25 events in second 0 at 40 ms spacing.
        for i in 0..25 {
            assert_eq!(est.observe(i * 40), None);
        }
        assert_eq!(est.rate_hz(), 100.0);
        assert_eq!(est.observe(1000), Some(25.0));
        assert_eq!(est.rate_hz(), 25.0);
    }

    #[test]
    fn test_pinned_rate_bypasses_estimation() {
        let mut est = SamplingRateEstimator::new(100.0, Some(48.0));
        for i in 0..200 {
            assert_eq!(est.observe(i * 10), None);
        }
        assert_eq!(est.rate_hz(), 48.0);
        assert!(est.is_pinned());
    }

    #[test]
    fn test_window_keys_wrap_every_minute() {
        let mut est = SamplingRateEstimator::new(50.0, None);
        est.observe(59_500);
        est.observe(59_900);
        // Second 60 maps back to key 0, a new key relative to 59.
        assert_eq!(est.observe(60_100), Some(2.0));
    }

    #[test]
    fn test_single_event_second_reports_floor() {
        let mut est = SamplingRateEstimator::new(50.0, None);
        est.observe(0);
        assert_eq!(est.observe(5_000), Some(1.0));
    }
}
