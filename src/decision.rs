//! Step decision engine.
//!
//! Which detector feeds which rule is a two-axis table over
//! (filter, recognition); see [`strategy`]. Every rule shares one
//! [`AdaptiveThreshold`], which nothing outside this module updates.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{FilterKind, RecognitionAlgorithm};
use crate::extrema::{ExtremaPair, ExtremaRecord, Parity, Reversal};

/// Physiological floor the last maximum must clear (m/s²).
pub const PEAK_FLOOR: f64 = 10.5;

/// Fraction of the running threshold an extrema difference must exceed.
pub const THRESHOLD_RATIO: f64 = 3.0 / 5.0;

/// Minimum reversal difference the Bagilevi matcher considers.
pub const BAGILEVI_LIMIT: f64 = 10.0;

/// Running mean of extrema differences: `threshold_sum / event_count`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveThreshold {
    #[serde(with = "crate::decimal")]
    detection_threshold: f64,
    #[serde(with = "crate::decimal")]
    threshold_sum: f64,
    event_count: u64,
}

impl AdaptiveThreshold {
    pub fn value(&self) -> f64 {
        self.detection_threshold
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    pub fn sum(&self) -> f64 {
        self.threshold_sum
    }

    pub(crate) fn fold(&mut self, value: f64) {
        self.threshold_sum += value;
        self.event_count += 1;
        self.detection_threshold = self.threshold_sum / self.event_count as f64;
    }
}

/// Which detector drives the decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionMode {
    PeakValley,
    Direction,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecisionRule {
    PeakDifference,
    /// Peak difference confirmed by a zero crossing inside the phase pair.
    CrossingCorrection,
    BagileviMatch,
    /// Peak difference on direction pairs, gated by phase timing.
    TimeFiltering,
}

/// Plausibility heuristic applied when false-step detection is enabled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationHeuristic {
    General,
    Butterworth,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Strategy {
    pub mode: DetectionMode,
    pub rule: DecisionRule,
    pub heuristic: ValidationHeuristic,
    /// Timing gate applied regardless of the false-step flag.
    pub timing_gate: bool,
}

pub fn strategy(filter: FilterKind, recognition: RecognitionAlgorithm) -> Strategy {
    let (mode, rule) = match recognition {
        RecognitionAlgorithm::PeakDifference => (DetectionMode::PeakValley, DecisionRule::PeakDifference),
        RecognitionAlgorithm::CrossingCorrection => (DetectionMode::PeakValley, DecisionRule::CrossingCorrection),
        RecognitionAlgorithm::Bagilevi => (DetectionMode::Direction, DecisionRule::BagileviMatch),
        RecognitionAlgorithm::TimeFiltering => (DetectionMode::Direction, DecisionRule::TimeFiltering),
    };
    let heuristic = match filter {
        FilterKind::Butterworth => ValidationHeuristic::Butterworth,
        _ => ValidationHeuristic::General,
    };
    Strategy {
        mode,
        rule,
        heuristic,
        timing_gate: rule == DecisionRule::TimeFiltering,
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepCandidate {
    pub difference: f64,
    pub timestamp_ms: i64,
    pub pair: Option<ExtremaPair>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NoZeroCrossing,
    InconsistentTiming,
    MagneticOutlier,
    TooFlat,
    ImplausibleCadence,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::NoZeroCrossing => "no zero crossing inside the phase pair",
            RejectReason::InconsistentTiming => "phase duration inconsistent with previous step",
            RejectReason::MagneticOutlier => "magnetometer average outside learned bound",
            RejectReason::TooFlat => "extrema difference barely changed",
            RejectReason::ImplausibleCadence => "implausible cadence",
        };
        f.write_str(text)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Decision {
    NoStep,
    Step(StepCandidate),
    Vetoed(RejectReason),
}

/// Adaptive peak-difference rule. Rejected candidates fold the current
/// threshold itself into the running mean.
pub fn peak_difference(pair: &ExtremaPair, threshold: &mut AdaptiveThreshold) -> bool {
    if pair.max.value <= PEAK_FLOOR {
        return false;
    }
    let diff = pair.difference();
    if diff > threshold.value() * THRESHOLD_RATIO {
        threshold.fold(diff);
        true
    } else {
        let current = threshold.value();
        threshold.fold(current);
        false
    }
}

/// Whether the crossing lies strictly inside the phase interval, in
/// whichever order the two phases arrived.
pub fn crossing_inside(first_ms: i64, second_ms: i64, crossing_ms: Option<i64>) -> bool {
    let Some(crossing) = crossing_ms else {
        return false;
    };
    if first_ms < second_ms {
        first_ms < crossing && crossing < second_ms
    } else {
        second_ms < crossing && crossing < first_ms
    }
}

/// Legacy reversal matcher: a qualifying difference must be comparable to the
/// previous one and its parity must differ from the last accepted extreme.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BagileviMatcher {
    previous_diff: f64,
    last_match: Option<Parity>,
}

impl BagileviMatcher {
    pub fn evaluate(&mut self, reversal: &Reversal, continuous_detection: bool) -> bool {
        let diff = reversal.difference;
        let mut matched = false;
        if continuous_detection && diff > BAGILEVI_LIMIT {
            let almost_as_large = diff > self.previous_diff * 2.0 / 3.0;
            let previous_large_enough = self.previous_diff > diff / 3.0;
            let alternates = self.last_match != Some(reversal.parity);
            if almost_as_large && previous_large_enough && alternates {
                self.last_match = Some(reversal.parity);
                matched = true;
            } else {
                self.last_match = None;
            }
        }
        self.previous_diff = diff;
        matched
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DecisionEngine {
    strategy: Strategy,
    bagilevi: BagileviMatcher,
}

impl DecisionEngine {
    pub fn new(strategy: Strategy) -> Self {
        Self { strategy, bagilevi: BagileviMatcher::default() }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// A completed peak/valley pair.
    pub fn on_pair(&mut self, pair: &ExtremaPair, threshold: &mut AdaptiveThreshold, record: &ExtremaRecord) -> Decision {
        if !peak_difference(pair, threshold) {
            return Decision::NoStep;
        }
        if self.strategy.rule == DecisionRule::CrossingCorrection
            && !crossing_inside(pair.max.timestamp_ms, pair.min.timestamp_ms, record.last_zero_crossing_ms())
        {
            return Decision::Vetoed(RejectReason::NoZeroCrossing);
        }
        Decision::Step(StepCandidate {
            difference: pair.difference(),
            timestamp_ms: pair.min.timestamp_ms,
            pair: Some(*pair),
        })
    }

    /// A direction reversal.
    pub fn on_reversal(&mut self, reversal: &Reversal, continuous_detection: bool, threshold: &mut AdaptiveThreshold) -> Decision {
        match self.strategy.rule {
            DecisionRule::BagileviMatch => {
                if self.bagilevi.evaluate(reversal, continuous_detection) {
                    Decision::Step(StepCandidate {
                        difference: reversal.difference,
                        timestamp_ms: reversal.extreme.timestamp_ms,
                        pair: reversal.pair,
                    })
                } else {
                    Decision::NoStep
                }
            }
            _ => match reversal.pair {
                Some(pair) if peak_difference(&pair, threshold) => Decision::Step(StepCandidate {
                    difference: pair.difference(),
                    timestamp_ms: pair.min.timestamp_ms,
                    pair: Some(pair),
                }),
                _ => Decision::NoStep,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extrema::Extremum;

    fn pair(max: f64, max_ts: i64, min: f64, min_ts: i64) -> ExtremaPair {
        ExtremaPair {
            max: Extremum { value: max, timestamp_ms: max_ts },
            min: Extremum { value: min, timestamp_ms: min_ts },
        }
    }

    fn reversal(parity: Parity, difference: f64) -> Reversal {
        Reversal {
            parity,
            extreme: Extremum { value: 0.0, timestamp_ms: 0 },
            difference,
            pair: None,
        }
    }

    #[test]
    fn test_threshold_is_running_mean_of_folds() {
        let mut threshold = AdaptiveThreshold::default();
        let pairs = [
            pair(12.0, 0, 8.0, 100),  // accept: 4.0
            pair(11.0, 200, 9.5, 300), // 1.5 <= 2.4, reject: fold 4.0
            pair(13.0, 400, 6.0, 500), // accept: 7.0
            pair(10.0, 600, 2.0, 700), // below floor: untouched
        ];
        let results: Vec<bool> = pairs.iter().map(|p| peak_difference(p, &mut threshold)).collect();
        assert_eq!(results, vec![true, false, true, false]);

        let folded = [4.0, 4.0, 7.0];
        let expected = folded.iter().sum::<f64>() / folded.len() as f64;
        assert_eq!(threshold.event_count(), 3);
        assert_eq!(threshold.value().to_bits(), expected.to_bits());
        assert_eq!(threshold.value(), threshold.sum() / threshold.event_count() as f64);
    }

    #[test]
    fn test_threshold_never_negative() {
        let mut threshold = AdaptiveThreshold::default();
        for i in 0..50 {
            let depth = (i % 7) as f64 * 0.9;
            peak_difference(&pair(11.0 + depth, i, 11.0 - depth, i + 1), &mut threshold);
            assert!(threshold.value() >= 0.0);
        }
    }

    #[test]
    fn test_crossing_containment_is_order_sensitive() {
        assert!(crossing_inside(100, 200, Some(150)));
        assert!(!crossing_inside(100, 200, Some(200)));
        assert!(!crossing_inside(100, 200, Some(250)));
        // Reversed phase order.
        assert!(crossing_inside(200, 100, Some(150)));
        assert!(!crossing_inside(200, 100, Some(50)));
        assert!(!crossing_inside(100, 200, None));
    }

    #[test]
    fn test_crossing_correction_vetoes_without_crossing() {
        let mut engine = DecisionEngine::new(strategy(FilterKind::PassThrough, RecognitionAlgorithm::CrossingCorrection));
        let mut threshold = AdaptiveThreshold::default();
        let mut record = ExtremaRecord::default();

        let p = pair(12.0, 100, 8.0, 200);
        assert_eq!(
            engine.on_pair(&p, &mut threshold, &record),
            Decision::Vetoed(RejectReason::NoZeroCrossing)
        );

        record.record_zero_crossing(150);
        assert!(matches!(engine.on_pair(&p, &mut threshold, &record), Decision::Step(_)));
    }

    #[test]
    fn test_bagilevi_accepts_alternating_parity() {
        let mut matcher = BagileviMatcher::default();
        assert!(!matcher.evaluate(&reversal(Parity::Max, 20.0), true)); // no previous diff yet
        assert!(matcher.evaluate(&reversal(Parity::Min, 20.0), true));
        assert!(matcher.evaluate(&reversal(Parity::Max, 20.0), true));
        // Same parity as the last accepted extreme: rejected, parity cleared.
        assert!(!matcher.evaluate(&reversal(Parity::Max, 20.0), true));
        // Nothing remembered, so either parity may match next.
        assert!(matcher.evaluate(&reversal(Parity::Max, 20.0), true));
        assert!(matcher.evaluate(&reversal(Parity::Min, 20.0), true));
    }

    #[test]
    fn test_bagilevi_requires_comparable_differences() {
        let mut matcher = BagileviMatcher::default();
        matcher.evaluate(&reversal(Parity::Max, 20.0), true);
        // Far larger than the previous difference: previous not large enough.
        assert!(!matcher.evaluate(&reversal(Parity::Min, 70.0), true));
        // Small differences are ignored entirely.
        assert!(!matcher.evaluate(&reversal(Parity::Min, 9.0), true));
        // Without continuous detection nothing matches.
        let mut idle = BagileviMatcher::default();
        idle.evaluate(&reversal(Parity::Max, 20.0), false);
        assert!(!idle.evaluate(&reversal(Parity::Min, 20.0), false));
    }

    #[test]
    fn test_strategy_table() {
        let filters = [
            FilterKind::Bagilevi,
            FilterKind::LowPass,
            FilterKind::PassThrough,
            FilterKind::RotationProjected,
            FilterKind::Butterworth,
        ];
        for filter in filters {
            let s = strategy(filter, RecognitionAlgorithm::PeakDifference);
            assert_eq!(s.mode, DetectionMode::PeakValley);
            assert!(!s.timing_gate);

            let s = strategy(filter, RecognitionAlgorithm::TimeFiltering);
            assert_eq!(s.mode, DetectionMode::Direction);
            assert!(s.timing_gate);

            let s = strategy(filter, RecognitionAlgorithm::Bagilevi);
            assert_eq!(s.rule, DecisionRule::BagileviMatch);

            let expected = if filter == FilterKind::Butterworth {
                ValidationHeuristic::Butterworth
            } else {
                ValidationHeuristic::General
            };
            assert_eq!(strategy(filter, RecognitionAlgorithm::CrossingCorrection).heuristic, expected);
        }
    }

    #[test]
    fn test_time_filtering_uses_direction_pairs() {
        let mut engine = DecisionEngine::new(strategy(FilterKind::LowPass, RecognitionAlgorithm::TimeFiltering));
        let mut threshold = AdaptiveThreshold::default();
        let mut r = reversal(Parity::Min, 5.0);
        assert_eq!(engine.on_reversal(&r, true, &mut threshold), Decision::NoStep);
        r.pair = Some(pair(12.0, 0, 7.0, 250));
        match engine.on_reversal(&r, true, &mut threshold) {
            Decision::Step(c) => assert_eq!(c.timestamp_ms, 250),
            other => panic!("expected step, got {:?}", other),
        }
    }
}
