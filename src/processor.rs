// processor.rs — real-time step-detection pipeline
//
// One sample in, one result out. No I/O and no async: the live CLI and the
// batch replay drive the same StepProcessor, so both produce identical output
// for identical input.
//
//   sample → FilterBank → extrema / crossings → DecisionEngine → validator
//          → StepEvent (+ StepReport on the reporting channel)

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use log::{debug, warn};
use serde::Serialize;

use crate::autocorrelation::{AutocorrelationCounter, AutocorrelationReport, SampleBuffer};
use crate::config::{clamp_cutoff, Configuration, FilterKind, ProcessingMode, RecognitionAlgorithm};
use crate::decision::{strategy, Decision, DecisionEngine, DetectionMode, RejectReason, StepCandidate, Strategy, ValidationHeuristic};
use crate::error::Result;
use crate::extrema::{DirectionDetector, ExtremaSignal, PeakValleyDetector, ZeroCrossingTracker};
use crate::filters::FilterBank;
use crate::history::{ChartHistory, ChartSample};
use crate::sampling::SamplingRateEstimator;
use crate::types::{DerivedSignal, SensorKind, SensorSample, Vec3};
use crate::validator::FalseStepValidator;

// ─── Outputs ─────────────────────────────────────────────────────────────────

/// Per accelerometer sample result for the UI layer.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepEvent {
    pub step_detected: bool,
    #[serde(with = "crate::decimal")]
    pub filtered_value: f64,
    pub chart_label: String,
}

/// Sent on every subscriber channel when a step is accepted.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StepReport {
    pub step_count: u64,
    pub timestamp_ms: i64,
    #[serde(with = "crate::decimal")]
    pub filtered_value: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ProcessorEvent {
    SamplingRateEstimated { rate_hz: f64 },
    FilterReinitialised { sample_rate_hz: f64, cutoff_hz: f64 },
    CutoffAdjusted { from_hz: f64, to_hz: f64 },
    StepRejected { timestamp_ms: i64, reason: RejectReason },
    OrientationUpdated,
    OrientationDegenerate,
    OutOfOrderSample { timestamp_ms: i64, last_timestamp_ms: i64 },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Processed {
    /// Present for accelerometer samples.
    pub step_event: Option<StepEvent>,
    pub events: Vec<ProcessorEvent>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ProcessorSnapshot {
    pub steps: u64,
    pub rejected_steps: u64,
    pub samples: u64,
    #[serde(with = "crate::decimal")]
    pub detection_threshold: f64,
    #[serde(with = "crate::decimal")]
    pub sampling_rate_hz: f64,
    #[serde(with = "crate::decimal::option")]
    pub cutoff_hz: Option<f64>,
    pub filter_label: String,
    pub recognition: RecognitionAlgorithm,
    pub mode: ProcessingMode,
}

// ─── Processor ───────────────────────────────────────────────────────────────

pub struct StepProcessor {
    initial: Configuration,
    config: Configuration,
    strategy: Strategy,
    filter: FilterBank,
    estimator: SamplingRateEstimator,
    sample_rate: f64,
    cutoff_override: Option<f64>,

    peaks: PeakValleyDetector,
    directions: DirectionDetector,
    crossings: ZeroCrossingTracker,
    engine: DecisionEngine,
    validator: FalseStepValidator,

    history: ChartHistory,
    buffer: Option<SampleBuffer>,

    last_accel: Option<Vec3>,
    last_gravity: Option<Vec3>,
    last_magnetometer: Option<Vec3>,
    rotation_vector_seen: bool,
    last_accel_ts: Option<i64>,
    last_signal: DerivedSignal,

    step_count: u64,
    rejected_steps: u64,
    samples: u64,
    subscribers: Vec<Sender<StepReport>>,
}

impl StepProcessor {
    pub fn new(config: Configuration) -> Result<Self> {
        config.validate()?;
        let estimator = SamplingRateEstimator::from_config(&config);
        let sample_rate = estimator.rate_hz();
        let filter = FilterBank::from_config(&config, sample_rate)?;
        let strategy = strategy(config.filter, config.recognition);
        debug!(
            "step processor: filter={} recognition={:?} rate={} Hz",
            filter.label(),
            config.recognition,
            sample_rate
        );

        Ok(Self {
            initial: config.clone(),
            strategy,
            filter,
            estimator,
            sample_rate,
            cutoff_override: None,
            peaks: PeakValleyDetector::new(),
            directions: DirectionDetector::new(),
            crossings: ZeroCrossingTracker::new(),
            engine: DecisionEngine::new(strategy),
            validator: FalseStepValidator::new(),
            history: ChartHistory::new(config.history_capacity),
            buffer: config.autocorrelation.then(SampleBuffer::new),
            last_accel: None,
            last_gravity: None,
            last_magnetometer: None,
            rotation_vector_seen: false,
            last_accel_ts: None,
            last_signal: DerivedSignal::default(),
            step_count: 0,
            rejected_steps: 0,
            samples: 0,
            subscribers: Vec::new(),
            config,
        })
    }

    /// Bounded reporting channel. Reports are dropped while it is full.
    pub fn subscribe(&mut self, capacity: usize) -> Receiver<StepReport> {
        let (tx, rx) = channel::bounded(capacity.max(1));
        self.subscribers.push(tx);
        rx
    }

    /// Discard all session state and start over from the initial configuration.
    pub fn reset(&mut self) -> Result<()> {
        let subscribers = std::mem::take(&mut self.subscribers);
        *self = Self::new(self.initial.clone())?;
        self.subscribers = subscribers;
        Ok(())
    }

    // ── Sensor feed ──────────────────────────────────────────────────────

    pub fn process(&mut self, sample: &SensorSample) -> Processed {
        let mut events = Vec::new();
        let v = sample.vector();
        let step_event = match sample.kind {
            SensorKind::Accelerometer => {
                self.last_accel = Some(v);
                if self.last_gravity.is_none() {
                    self.refresh_orientation(&mut events);
                }
                self.on_accelerometer(&v, sample.timestamp_ms, &mut events)
            }
            SensorKind::Magnetometer => {
                self.last_magnetometer = Some(v);
                self.validator.observe_magnetometer(v.norm());
                self.refresh_orientation(&mut events);
                None
            }
            SensorKind::Gravity => {
                self.last_gravity = Some(v);
                self.refresh_orientation(&mut events);
                None
            }
            SensorKind::Rotation => {
                if self.config.filter == FilterKind::RotationProjected {
                    self.rotation_vector_seen = true;
                    let updated = self.config.orientation.update_from_rotation_vector(&v);
                    events.push(orientation_event(updated));
                }
                None
            }
        };
        Processed { step_event, events }
    }

    /// End of stream: evaluate a pair whose valley is the final sample.
    pub fn finish(&mut self) -> Processed {
        let mut events = Vec::new();
        if self.strategy.mode != DetectionMode::PeakValley {
            return Processed::default();
        }
        let Some(ExtremaSignal::PairReady(pair)) = self.peaks.finish(&mut self.config.extrema) else {
            return Processed::default();
        };
        let decision = self.engine.on_pair(&pair, &mut self.config.threshold, &self.config.extrema);
        let detected = self.resolve(decision, self.last_signal.filtered_magnitude, &mut events);
        Processed {
            step_event: Some(StepEvent {
                step_detected: detected,
                filtered_value: self.last_signal.filtered_magnitude,
                chart_label: self.filter.label(),
            }),
            events,
        }
    }

    fn on_accelerometer(&mut self, accel: &Vec3, timestamp_ms: i64, events: &mut Vec<ProcessorEvent>) -> Option<StepEvent> {
        if let Some(last) = self.last_accel_ts {
            if timestamp_ms < last {
                warn!("dropping out-of-order accelerometer sample {} < {}", timestamp_ms, last);
                events.push(ProcessorEvent::OutOfOrderSample { timestamp_ms, last_timestamp_ms: last });
                return None;
            }
        }
        self.last_accel_ts = Some(timestamp_ms);
        self.samples += 1;

        if let Some(rate) = self.estimator.observe(timestamp_ms) {
            if rate != self.sample_rate {
                debug!("sampling rate estimate {} Hz (was {} Hz)", rate, self.sample_rate);
                self.sample_rate = rate;
                events.push(ProcessorEvent::SamplingRateEstimated { rate_hz: rate });
                if self.filter.kind().tracks_sampling_rate() {
                    self.retune(events);
                }
            }
        }

        if let Some(buffer) = self.buffer.as_mut() {
            buffer.push(*accel, timestamp_ms);
        }

        let signal = self.filter.apply(accel, &self.config.orientation, self.config.gravity);
        self.last_signal = signal;
        self.crossings.update(signal.linear_acceleration, timestamp_ms, &mut self.config.extrema);

        let value = signal.filtered_magnitude;
        let decision = match self.strategy.mode {
            DetectionMode::PeakValley => match self.peaks.update(value, timestamp_ms, &mut self.config.extrema) {
                Some(ExtremaSignal::PairReady(pair)) => {
                    self.engine.on_pair(&pair, &mut self.config.threshold, &self.config.extrema)
                }
                _ => Decision::NoStep,
            },
            DetectionMode::Direction => match self.directions.update(value, timestamp_ms, &mut self.config.extrema) {
                Some(reversal) => self.engine.on_reversal(
                    &reversal,
                    self.directions.continuous_detection(),
                    &mut self.config.threshold,
                ),
                None => Decision::NoStep,
            },
        };

        let detected = self.resolve(decision, value, events);
        self.history.push(ChartSample { timestamp_ms, value, step: detected });

        Some(StepEvent {
            step_detected: detected,
            filtered_value: value,
            chart_label: self.filter.label(),
        })
    }

    // ── Decision → count ─────────────────────────────────────────────────

    fn resolve(&mut self, decision: Decision, value: f64, events: &mut Vec<ProcessorEvent>) -> bool {
        match decision {
            Decision::NoStep => false,
            Decision::Vetoed(reason) => {
                self.reject(reason, self.last_accel_ts.unwrap_or_default(), events);
                false
            }
            Decision::Step(candidate) => match self.validate(&candidate, events) {
                Ok(()) => {
                    self.accept(&candidate, value);
                    true
                }
                Err(reason) => {
                    self.reject(reason, candidate.timestamp_ms, events);
                    false
                }
            },
        }
    }

    fn validate(&mut self, candidate: &StepCandidate, events: &mut Vec<ProcessorEvent>) -> std::result::Result<(), RejectReason> {
        if self.strategy.timing_gate {
            if let Some(pair) = candidate.pair.as_ref() {
                self.validator.check_timing(pair)?;
            }
        }
        if !self.config.false_step_detection {
            return Ok(());
        }
        match self.strategy.heuristic {
            ValidationHeuristic::General => self.validator.check_magnetic(),
            ValidationHeuristic::Butterworth => {
                let cutoff = self.filter.cutoff_hz().unwrap_or_default();
                let check = self.validator.check_butterworth(candidate, self.sample_rate, cutoff);
                if let Some(target) = check.cutoff_adjustment {
                    self.adjust_cutoff(cutoff, target, events);
                }
                check.verdict
            }
        }
    }

    fn accept(&mut self, candidate: &StepCandidate, value: f64) {
        self.step_count += 1;
        debug!(
            "step {} at {} ms (diff {:.3}, threshold {:.3})",
            self.step_count,
            candidate.timestamp_ms,
            candidate.difference,
            self.config.threshold.value()
        );
        let report = StepReport {
            step_count: self.step_count,
            timestamp_ms: candidate.timestamp_ms,
            filtered_value: value,
        };
        self.subscribers.retain(|tx| match tx.try_send(report.clone()) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    fn reject(&mut self, reason: RejectReason, timestamp_ms: i64, events: &mut Vec<ProcessorEvent>) {
        self.rejected_steps += 1;
        debug!("step rejected at {} ms: {}", timestamp_ms, reason);
        events.push(ProcessorEvent::StepRejected { timestamp_ms, reason });
    }

    // ── Filter parameters ────────────────────────────────────────────────

    fn current_cutoff(&self) -> f64 {
        match self.cutoff_override {
            Some(cutoff) => clamp_cutoff(cutoff, self.sample_rate),
            None => self.config.cutoff_frequency.resolve(self.sample_rate),
        }
    }

    fn retune(&mut self, events: &mut Vec<ProcessorEvent>) {
        let cutoff = self.current_cutoff();
        match self.filter.retune(self.sample_rate, cutoff) {
            Ok(true) => {
                debug!("filter reinitialised: {} Hz cutoff at {} Hz", cutoff, self.sample_rate);
                events.push(ProcessorEvent::FilterReinitialised {
                    sample_rate_hz: self.sample_rate,
                    cutoff_hz: cutoff,
                });
            }
            Ok(false) => {}
            Err(e) => warn!("keeping previous filter: {}", e),
        }
    }

    fn adjust_cutoff(&mut self, from_hz: f64, target_hz: f64, events: &mut Vec<ProcessorEvent>) {
        let to_hz = clamp_cutoff(target_hz, self.sample_rate);
        self.cutoff_override = Some(to_hz);
        events.push(ProcessorEvent::CutoffAdjusted { from_hz, to_hz });
        self.retune(events);
    }

    // ── Orientation ──────────────────────────────────────────────────────

    fn refresh_orientation(&mut self, events: &mut Vec<ProcessorEvent>) {
        if self.config.filter != FilterKind::RotationProjected || self.rotation_vector_seen {
            return;
        }
        let (Some(down), Some(mag)) = (self.last_gravity.or(self.last_accel), self.last_magnetometer) else {
            return;
        };
        let updated = self.config.orientation.update_rotation_matrix(&down, &mag);
        events.push(orientation_event(updated));
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn rejected_steps(&self) -> u64 {
        self.rejected_steps
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn history(&self) -> &ChartHistory {
        &self.history
    }

    pub fn filter_label(&self) -> String {
        self.filter.label()
    }

    /// Whole-session estimate, when the autocorrelation flag buffered samples.
    pub fn autocorrelation_report(&self) -> Option<AutocorrelationReport> {
        let buffer = self.buffer.as_ref()?;
        let counter = AutocorrelationCounter::new(self.config.autocorrelation_settings.clone());
        Some(counter.count(buffer))
    }

    pub fn snapshot(&self) -> ProcessorSnapshot {
        ProcessorSnapshot {
            steps: self.step_count,
            rejected_steps: self.rejected_steps,
            samples: self.samples,
            detection_threshold: self.config.threshold.value(),
            sampling_rate_hz: self.sample_rate,
            cutoff_hz: self.filter.cutoff_hz(),
            filter_label: self.filter.label(),
            recognition: self.config.recognition,
            mode: self.config.mode,
        }
    }
}

fn orientation_event(updated: bool) -> ProcessorEvent {
    if updated {
        ProcessorEvent::OrientationUpdated
    } else {
        ProcessorEvent::OrientationDegenerate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resultant::Orientation;
    use std::f64::consts::PI;

    /// Vertical walking signal: `9.8 + amplitude * sin(2π·step_hz·t)` on z.
    fn walk(seconds: f64, fs: f64, step_hz: f64, amplitude: f64) -> Vec<SensorSample> {
        let n = (seconds * fs) as usize;
        (0..n)
            .map(|i| {
                let t = i as f64 / fs;
                let z = 9.8 + amplitude * (2.0 * PI * step_hz * t).sin();
                SensorSample::accel(0.0, 0.0, z, (t * 1000.0).round() as i64)
            })
            .collect()
    }

    fn run(processor: &mut StepProcessor, samples: &[SensorSample]) -> (Vec<bool>, Vec<ProcessorEvent>) {
        let mut flags = Vec::new();
        let mut events = Vec::new();
        for s in samples {
            let out = processor.process(s);
            flags.extend(out.step_event.map(|e| e.step_detected));
            events.extend(out.events);
        }
        let out = processor.finish();
        flags.extend(out.step_event.map(|e| e.step_detected));
        events.extend(out.events);
        (flags, events)
    }

    fn pass_through(recognition: RecognitionAlgorithm) -> Configuration {
        Configuration::new(FilterKind::PassThrough, recognition).pinned(50.0)
    }

    #[test]
    fn test_peak_difference_counts_walking_steps() {
        let mut p = StepProcessor::new(pass_through(RecognitionAlgorithm::PeakDifference)).unwrap();
        run(&mut p, &walk(10.0, 50.0, 2.0, 3.0));
        assert_eq!(p.step_count(), 20);
        assert!(p.config().detection_threshold() > 0.0);
    }

    #[test]
    fn test_determinism_across_fresh_sessions() {
        let samples = walk(8.0, 50.0, 1.8, 3.0);
        let mut a = StepProcessor::new(Configuration::default()).unwrap();
        let mut b = StepProcessor::new(Configuration::default()).unwrap();
        let (flags_a, _) = run(&mut a, &samples);
        let (flags_b, _) = run(&mut b, &samples);
        assert_eq!(flags_a, flags_b);
        assert_eq!(a.step_count(), b.step_count());
        assert!(a.step_count() > 0);
    }

    #[test]
    fn test_reset_reproduces_first_run() {
        let samples = walk(6.0, 50.0, 2.0, 3.0);
        let mut p = StepProcessor::new(Configuration::default()).unwrap();
        let (first, _) = run(&mut p, &samples);
        let first_count = p.step_count();
        let first_config = p.config().clone();

        p.reset().unwrap();
        assert_eq!(p.step_count(), 0);
        let (second, _) = run(&mut p, &samples);
        assert_eq!(first, second);
        assert_eq!(p.step_count(), first_count);
        assert_eq!(p.config(), &first_config);
    }

    #[test]
    fn test_estimated_rate_reinitialises_butterworth() {
        let mut p = StepProcessor::new(Configuration::default()).unwrap();
        assert_eq!(p.sample_rate(), 100.0);
        let (_, events) = run(&mut p, &walk(3.0, 50.0, 2.0, 3.0));
        assert!(events.contains(&ProcessorEvent::SamplingRateEstimated { rate_hz: 50.0 }));
        assert!(events.iter().any(|e| matches!(e, ProcessorEvent::FilterReinitialised { sample_rate_hz, .. } if *sample_rate_hz == 50.0)));
        assert_eq!(p.sample_rate(), 50.0);
    }

    #[test]
    fn test_crossing_correction_confirms_regular_walk() {
        let samples = walk(10.0, 50.0, 2.0, 3.0);
        let mut peak = StepProcessor::new(pass_through(RecognitionAlgorithm::PeakDifference)).unwrap();
        let mut crossing = StepProcessor::new(pass_through(RecognitionAlgorithm::CrossingCorrection)).unwrap();
        run(&mut peak, &samples);
        let (_, events) = run(&mut crossing, &samples);
        assert_eq!(crossing.step_count(), peak.step_count());
        assert!(!events.iter().any(|e| matches!(e, ProcessorEvent::StepRejected { .. })));
    }

    #[test]
    fn test_time_filtering_counts_regular_walk() {
        let mut p = StepProcessor::new(pass_through(RecognitionAlgorithm::TimeFiltering)).unwrap();
        run(&mut p, &walk(10.0, 50.0, 2.0, 3.0));
        assert!((19..=21).contains(&p.step_count()), "steps = {}", p.step_count());
        assert_eq!(p.rejected_steps(), 0);
    }

    #[test]
    fn test_bagilevi_counts_every_alternating_reversal() {
        let config = Configuration::new(FilterKind::Bagilevi, RecognitionAlgorithm::Bagilevi).pinned(50.0);
        let mut p = StepProcessor::new(config).unwrap();
        // 40 reversals; the first lacks continuous detection and the second is
        // far smaller than the start-up swing.
        run(&mut p, &walk(10.0, 50.0, 2.0, 8.0));
        assert!((36..=38).contains(&p.step_count()), "steps = {}", p.step_count());
    }

    #[test]
    fn test_butterworth_heuristic_rejects_flat_extrema() {
        let mut config = Configuration::default().pinned(50.0);
        config.false_step_detection = true;
        let mut p = StepProcessor::new(config).unwrap();
        let (_, events) = run(&mut p, &walk(10.0, 50.0, 2.0, 3.0));
        assert!(p.rejected_steps() > 0);
        assert!(events.iter().any(|e| matches!(
            e,
            ProcessorEvent::StepRejected { reason: RejectReason::TooFlat, .. }
        )));
    }

    #[test]
    fn test_reporting_channel_receives_each_step() {
        let mut p = StepProcessor::new(pass_through(RecognitionAlgorithm::PeakDifference)).unwrap();
        let rx = p.subscribe(64);
        run(&mut p, &walk(5.0, 50.0, 2.0, 3.0));
        let reports: Vec<StepReport> = rx.try_iter().collect();
        assert_eq!(reports.len() as u64, p.step_count());
        assert_eq!(reports.last().map(|r| r.step_count), Some(p.step_count()));
    }

    #[test]
    fn test_full_reporting_channel_drops_reports() {
        let mut p = StepProcessor::new(pass_through(RecognitionAlgorithm::PeakDifference)).unwrap();
        let rx = p.subscribe(2);
        run(&mut p, &walk(5.0, 50.0, 2.0, 3.0));
        assert_eq!(rx.try_iter().count(), 2);
        assert!(p.step_count() > 2);
    }

    #[test]
    fn test_rotation_projection_orientation_updates() {
        let config = Configuration::new(FilterKind::RotationProjected, RecognitionAlgorithm::PeakDifference);
        let mut p = StepProcessor::new(config).unwrap();

        let out = p.process(&SensorSample::new(SensorKind::Gravity, 0.0, 9.81, 0.0, 0));
        assert!(out.events.is_empty());
        let out = p.process(&SensorSample::new(SensorKind::Magnetometer, 0.0, -20.0, -40.0, 0));
        assert_eq!(out.events, vec![ProcessorEvent::OrientationUpdated]);
        let matrix = p.config().orientation.clone();

        // Magnetic field parallel to gravity: matrix kept.
        let out = p.process(&SensorSample::new(SensorKind::Magnetometer, 0.0, 30.0, 0.0, 10));
        assert_eq!(out.events, vec![ProcessorEvent::OrientationDegenerate]);
        assert_eq!(p.config().orientation, matrix);

        // World Z of a device-Y reading.
        let out = p.process(&SensorSample::accel(0.0, 9.81, 0.0, 20));
        let value = out.step_event.unwrap().filtered_value;
        assert!((value - 9.81).abs() < 1e-9);
    }

    #[test]
    fn test_orientation_untouched_by_other_filters() {
        let mut p = StepProcessor::new(Configuration::default()).unwrap();
        p.process(&SensorSample::new(SensorKind::Gravity, 0.0, 9.81, 0.0, 0));
        p.process(&SensorSample::new(SensorKind::Magnetometer, 0.0, -20.0, -40.0, 0));
        p.process(&SensorSample::new(SensorKind::Rotation, 0.0, 0.0, 0.5, 0));
        assert_eq!(p.config().orientation, Orientation::default());
    }

    #[test]
    fn test_out_of_order_accelerometer_sample_dropped() {
        let mut p = StepProcessor::new(Configuration::default()).unwrap();
        p.process(&SensorSample::accel(0.0, 0.0, 9.8, 100));
        let out = p.process(&SensorSample::accel(0.0, 0.0, 9.8, 50));
        assert!(out.step_event.is_none());
        assert_eq!(
            out.events,
            vec![ProcessorEvent::OutOfOrderSample { timestamp_ms: 50, last_timestamp_ms: 100 }]
        );
        assert_eq!(p.snapshot().samples, 1);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut config = pass_through(RecognitionAlgorithm::PeakDifference);
        config.history_capacity = 16;
        let mut p = StepProcessor::new(config).unwrap();
        run(&mut p, &walk(2.0, 50.0, 2.0, 3.0));
        assert_eq!(p.history().len(), 16);
        assert_eq!(p.history().latest().map(|s| s.timestamp_ms), Some(1980));
    }

    #[test]
    fn test_autocorrelation_buffer_only_when_enabled() {
        let p = StepProcessor::new(Configuration::default()).unwrap();
        assert!(p.autocorrelation_report().is_none());

        let mut config = pass_through(RecognitionAlgorithm::PeakDifference);
        config.autocorrelation = true;
        let mut p = StepProcessor::new(config).unwrap();
        run(&mut p, &walk(1.0, 50.0, 2.0, 3.0));
        let report = p.autocorrelation_report().unwrap();
        assert_eq!(report.samples, 50);
    }

    #[test]
    fn test_snapshot_reports_filter_state() {
        let p = StepProcessor::new(Configuration::default()).unwrap();
        let snap = p.snapshot();
        assert_eq!(snap.filter_label, "Butterworth 3.0 Hz");
        assert_eq!(snap.cutoff_hz, Some(3.0));
        assert_eq!(snap.steps, 0);
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["sampling_rate_hz"], "100");
    }
}
