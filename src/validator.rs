//! False-step validator: secondary plausibility checks that may veto a step
//! the decision engine accepted.

use std::collections::VecDeque;

use crate::decision::{RejectReason, StepCandidate};
use crate::extrema::ExtremaPair;

/// Rolling magnetometer averages kept for the general heuristic.
pub const MAGNETIC_HISTORY_LEN: usize = 4;

/// Absolute gate used until the magnetic history is full.
pub const MAGNETIC_GATE: f64 = 3.6;

pub const MAX_PHASE_MS: i64 = 5000;
pub const MIN_PHASE_MS: i64 = 10;
pub const MAX_PHASE_CHANGE: f64 = 0.4;

/// Minimum change of the extrema difference between consecutive steps.
pub const MIN_DIFFERENCE_CHANGE: f64 = 0.3;

/// Cadence limits in steps per minute.
pub const MAX_CADENCE: f64 = 183.0;
pub const FAST_CADENCE: f64 = 180.0;
pub const FAST_CADENCE_JITTER_MS: f64 = 81.0;
pub const MIN_ADJUST_CADENCE: f64 = 81.0;

pub const MIN_ADJUSTED_CUTOFF_HZ: f64 = 2.0;
pub const CUTOFF_HYSTERESIS_HZ: f64 = 1.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ButterworthCheck {
    pub verdict: Result<(), RejectReason>,
    /// New cutoff to apply to the live filter.
    pub cutoff_adjustment: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FalseStepValidator {
    magnetic_sum: f64,
    magnetic_count: u32,
    magnetic_history: VecDeque<f64>,
    previous_phase_ms: i64,
    previous_difference: Option<f64>,
    last_step_ms: Option<i64>,
    previous_period_ms: Option<f64>,
}

impl FalseStepValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe_magnetometer(&mut self, magnitude: f64) {
        self.magnetic_sum += magnitude;
        self.magnetic_count += 1;
    }

    pub fn magnetic_history(&self) -> &VecDeque<f64> {
        &self.magnetic_history
    }

    /// Compare the magnetometer average since the last check with the
    /// averages recorded at previous confirmed steps.
    pub fn check_magnetic(&mut self) -> Result<(), RejectReason> {
        if self.magnetic_count == 0 {
            return Ok(());
        }
        let average = self.magnetic_sum / self.magnetic_count as f64;
        self.magnetic_sum = 0.0;
        self.magnetic_count = 0;

        let plausible = if self.magnetic_history.len() < MAGNETIC_HISTORY_LEN {
            self.magnetic_history
                .back()
                .map_or(true, |last| (average - last).abs() <= MAGNETIC_GATE)
        } else {
            let n = self.magnetic_history.len() as f64;
            let mean = self.magnetic_history.iter().sum::<f64>() / n;
            let max_jump = self
                .magnetic_history
                .iter()
                .zip(self.magnetic_history.iter().skip(1))
                .map(|(a, b)| (b - a).abs())
                .fold(0.0, f64::max);
            let bound = MAGNETIC_GATE.max(2.0 * max_jump);
            (average - mean).abs() <= bound
        };

        if !plausible {
            return Err(RejectReason::MagneticOutlier);
        }
        self.magnetic_history.push_back(average);
        while self.magnetic_history.len() > MAGNETIC_HISTORY_LEN {
            self.magnetic_history.pop_front();
        }
        Ok(())
    }

    /// Phase-pair duration against the previous one.
    pub fn check_timing(&mut self, pair: &ExtremaPair) -> Result<(), RejectReason> {
        let current = pair.duration_ms();
        let previous = std::mem::replace(&mut self.previous_phase_ms, current);

        if previous == 0 || current < MIN_PHASE_MS {
            return Ok(());
        }
        if current > MAX_PHASE_MS || previous > MAX_PHASE_MS {
            return Err(RejectReason::InconsistentTiming);
        }
        let change = (current - previous).abs() as f64 / previous as f64;
        if change > MAX_PHASE_CHANGE {
            return Err(RejectReason::InconsistentTiming);
        }
        Ok(())
    }

    /// Flatness and cadence checks for the Butterworth strategy, plus a cutoff
    /// nudge toward twice the current step frequency.
    pub fn check_butterworth(&mut self, candidate: &StepCandidate, sample_rate: f64, cutoff_hz: f64) -> ButterworthCheck {
        let rejected = |reason| ButterworthCheck { verdict: Err(reason), cutoff_adjustment: None };

        let previous = self.previous_difference.replace(candidate.difference);
        if let Some(previous) = previous {
            if (candidate.difference - previous).abs() < MIN_DIFFERENCE_CHANGE {
                return rejected(RejectReason::TooFlat);
            }
        }

        let mut cutoff_adjustment = None;
        let mut period = None;
        if let Some(last) = self.last_step_ms {
            let period_ms = (candidate.timestamp_ms - last) as f64;
            if period_ms > 0.0 {
                let cadence = 60_000.0 / period_ms;
                let jitter = self.previous_period_ms.map_or(0.0, |p| (period_ms - p).abs());
                if cadence > MAX_CADENCE || (cadence > FAST_CADENCE && jitter > FAST_CADENCE_JITTER_MS) {
                    return rejected(RejectReason::ImplausibleCadence);
                }

                let step_hz = cadence / 60.0;
                let target = (2.0 * step_hz).max(MIN_ADJUSTED_CUTOFF_HZ).min(sample_rate / 3.0);
                if cadence >= MIN_ADJUST_CADENCE && (target - cutoff_hz).abs() > CUTOFF_HYSTERESIS_HZ {
                    cutoff_adjustment = Some(target);
                }
                period = Some(period_ms);
            }
        }

        self.last_step_ms = Some(candidate.timestamp_ms);
        if period.is_some() {
            self.previous_period_ms = period;
        }
        ButterworthCheck { verdict: Ok(()), cutoff_adjustment }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extrema::Extremum;

    fn phase(duration_ms: i64) -> ExtremaPair {
        ExtremaPair {
            max: Extremum { value: 12.0, timestamp_ms: 1000 },
            min: Extremum { value: 8.0, timestamp_ms: 1000 + duration_ms },
        }
    }

    fn candidate(difference: f64, timestamp_ms: i64) -> StepCandidate {
        StepCandidate { difference, timestamp_ms, pair: None }
    }

    #[test]
    fn test_timing_heuristic() {
        let mut v = FalseStepValidator::new();
        assert!(v.check_timing(&phase(300)).is_ok()); // no previous interval
        assert!(v.check_timing(&phase(330)).is_ok()); // +10%
        assert_eq!(v.check_timing(&phase(500)), Err(RejectReason::InconsistentTiming)); // +51%
        assert!(v.check_timing(&phase(5)).is_ok()); // too short to judge
        assert_eq!(v.check_timing(&phase(6000)), Err(RejectReason::InconsistentTiming));
        assert_eq!(v.check_timing(&phase(300)), Err(RejectReason::InconsistentTiming)); // previous > 5 s
    }

    #[test]
    fn test_magnetic_gate_before_history_is_full() {
        let mut v = FalseStepValidator::new();
        assert!(v.check_magnetic().is_ok()); // no data

        v.observe_magnetometer(40.0);
        v.observe_magnetometer(42.0);
        assert!(v.check_magnetic().is_ok());

        v.observe_magnetometer(45.0);
        assert_eq!(v.check_magnetic(), Err(RejectReason::MagneticOutlier));
        assert_eq!(v.magnetic_history().len(), 1);

        v.observe_magnetometer(43.0);
        assert!(v.check_magnetic().is_ok());
    }

    #[test]
    fn test_magnetic_learned_bound() {
        let mut v = FalseStepValidator::new();
        for avg in [40.0, 41.0, 40.0, 41.0] {
            v.observe_magnetometer(avg);
            assert!(v.check_magnetic().is_ok());
        }
        // Mean 40.5, bound max(3.6, 2 * 1.0) = 3.6.
        v.observe_magnetometer(44.0);
        assert!(v.check_magnetic().is_ok());
        assert_eq!(v.magnetic_history().len(), MAGNETIC_HISTORY_LEN);

        v.observe_magnetometer(50.0);
        assert_eq!(v.check_magnetic(), Err(RejectReason::MagneticOutlier));
    }

    #[test]
    fn test_butterworth_flatness() {
        let mut v = FalseStepValidator::new();
        assert!(v.check_butterworth(&candidate(4.0, 0), 50.0, 3.0).verdict.is_ok());
        let check = v.check_butterworth(&candidate(4.2, 600), 50.0, 3.0);
        assert_eq!(check.verdict, Err(RejectReason::TooFlat));
    }

    #[test]
    fn test_butterworth_cadence_limit() {
        let mut v = FalseStepValidator::new();
        v.check_butterworth(&candidate(4.0, 0), 50.0, 3.0);
        // 300 ms period: 200 steps/min.
        let check = v.check_butterworth(&candidate(5.0, 300), 50.0, 3.0);
        assert_eq!(check.verdict, Err(RejectReason::ImplausibleCadence));
    }

    #[test]
    fn test_butterworth_cutoff_nudge_with_hysteresis() {
        let mut v = FalseStepValidator::new();
        v.check_butterworth(&candidate(4.0, 0), 50.0, 3.0);
        // 500 ms period: 120 steps/min, 2 Hz steps, target 4 Hz. Change of 1 Hz: held.
        let check = v.check_butterworth(&candidate(5.0, 500), 50.0, 3.0);
        assert!(check.verdict.is_ok());
        assert_eq!(check.cutoff_adjustment, None);

        // 400 ms: 150 steps/min, target 5 Hz against 3 Hz.
        let check = v.check_butterworth(&candidate(6.0, 900), 50.0, 3.0);
        assert!(check.verdict.is_ok());
        let target = check.cutoff_adjustment.unwrap();
        assert!((target - 5.0).abs() < 1e-9);

        // Slow sampling caps the target at fs / 3.
        let check = v.check_butterworth(&candidate(7.0, 1300), 9.0, 1.0);
        assert_eq!(check.cutoff_adjustment, Some(3.0));
    }
}
