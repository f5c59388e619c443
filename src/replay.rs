//! Batch replay of recorded sessions.
//!
//! A recording is a JSON object keyed by millisecond timestamps; each value
//! holds any subset of `acceleration_{x,y,z,magnitude}`, `magnetometer_*`,
//! `gravity_*` and `rotation_*` as decimal strings. Replays drive the same
//! [`StepProcessor`] as the live path, sample by sample.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use flate2::read::GzDecoder;
use log::{debug, warn};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::autocorrelation::AutocorrelationReport;
use crate::config::Configuration;
use crate::decimal;
use crate::error::{Result, StepError};
use crate::processor::{ProcessorEvent, ProcessorSnapshot, StepProcessor};
use crate::types::{SensorKind, SensorSample};

/// Within one timestamp key, orientation and magnetometer readings are applied
/// before the accelerometer sample that uses them.
const KIND_ORDER: [SensorKind; 4] = [
    SensorKind::Rotation,
    SensorKind::Gravity,
    SensorKind::Magnetometer,
    SensorKind::Accelerometer,
];

/// Samples per chunk between cooperative yields in [`replay_async`].
pub const DEFAULT_CHUNK_SIZE: usize = 500;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedLog {
    pub samples: Vec<SensorSample>,
    pub skipped_fields: usize,
    pub skipped_entries: usize,
}

impl RecordedLog {
    pub fn accelerometer_samples(&self) -> usize {
        self.samples.iter().filter(|s| s.kind == SensorKind::Accelerometer).count()
    }
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

pub fn load_log(path: &Path) -> Result<RecordedLog> {
    let file = File::open(path)?;
    let mut text = String::new();
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        BufReader::new(GzDecoder::new(file)).read_to_string(&mut text)?;
    } else {
        BufReader::new(file).read_to_string(&mut text)?;
    }
    parse_log(&text)
}

pub fn parse_log(json: &str) -> Result<RecordedLog> {
    let value: Value = serde_json::from_str(json)?;
    let Value::Object(entries) = value else {
        return Err(StepError::MalformedSample {
            key: "<root>".to_string(),
            reason: "expected an object keyed by timestamp".to_string(),
        });
    };

    let mut keyed = Vec::with_capacity(entries.len());
    let mut log = RecordedLog::default();
    for (key, entry) in entries {
        let Ok(timestamp_ms) = key.trim().parse::<i64>() else {
            warn!("skipping entry with non-numeric key '{}'", key);
            log.skipped_entries += 1;
            continue;
        };
        keyed.push((timestamp_ms, key, entry));
    }
    keyed.sort_by_key(|(ts, _, _)| *ts);

    for (timestamp_ms, key, entry) in keyed {
        match parse_entry(&key, timestamp_ms, &entry, &mut log.skipped_fields) {
            Ok(samples) => log.samples.extend(samples),
            Err(e) => {
                warn!("skipping sample: {}", e);
                log.skipped_entries += 1;
            }
        }
    }
    debug!(
        "parsed {} samples ({} skipped fields, {} skipped entries)",
        log.samples.len(),
        log.skipped_fields,
        log.skipped_entries
    );
    Ok(log)
}

fn parse_entry(key: &str, timestamp_ms: i64, entry: &Value, skipped: &mut usize) -> Result<Vec<SensorSample>> {
    let fields = entry.as_object().ok_or_else(|| StepError::MalformedSample {
        key: key.to_string(),
        reason: "expected an object".to_string(),
    })?;

    let mut samples = Vec::new();
    for kind in KIND_ORDER {
        let prefix = kind.field_prefix();
        let axes = ["x", "y", "z"].map(|axis| field(fields, key, &format!("{}_{}", prefix, axis), skipped));
        match axes {
            [Some(x), Some(y), Some(z)] => samples.push(SensorSample::new(kind, x, y, z, timestamp_ms)),
            [None, None, None] if kind == SensorKind::Accelerometer => {
                if let Some(magnitude) = field(fields, key, "acceleration_magnitude", skipped) {
                    samples.push(SensorSample::accel(0.0, 0.0, magnitude, timestamp_ms));
                }
            }
            [None, None, None] => {}
            _ => debug!("{}: incomplete {} axes, ignoring", key, kind),
        }
    }
    Ok(samples)
}

/// A numeric field, or None when absent or malformed.
fn field(fields: &Map<String, Value>, key: &str, name: &str, skipped: &mut usize) -> Option<f64> {
    let parsed = match fields.get(name)? {
        Value::String(text) => decimal::parse(text),
        Value::Number(n) => n.as_f64(),
        Value::Null => return None,
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Some(v),
        _ => {
            warn!("{}: malformed field {}", key, name);
            *skipped += 1;
            None
        }
    }
}

// ─── Replay ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ReplayOutcome {
    pub steps: u64,
    pub rejected_steps: u64,
    pub samples: usize,
    pub snapshot: ProcessorSnapshot,
    pub autocorrelation: Option<AutocorrelationReport>,
    pub final_config: Configuration,
    #[serde(skip)]
    pub step_flags: Vec<bool>,
    #[serde(skip)]
    pub events: Vec<ProcessorEvent>,
}

struct ReplaySession {
    processor: StepProcessor,
    step_flags: Vec<bool>,
    events: Vec<ProcessorEvent>,
    samples: usize,
}

impl ReplaySession {
    fn new(config: Configuration) -> Result<Self> {
        Ok(Self {
            processor: StepProcessor::new(config)?,
            step_flags: Vec::new(),
            events: Vec::new(),
            samples: 0,
        })
    }

    fn feed(&mut self, sample: &SensorSample) {
        let out = self.processor.process(sample);
        self.samples += 1;
        self.step_flags.extend(out.step_event.map(|e| e.step_detected));
        self.events.extend(out.events);
    }

    fn finish(mut self) -> ReplayOutcome {
        let out = self.processor.finish();
        self.step_flags.extend(out.step_event.map(|e| e.step_detected));
        self.events.extend(out.events);
        ReplayOutcome {
            steps: self.processor.step_count(),
            rejected_steps: self.processor.rejected_steps(),
            samples: self.samples,
            snapshot: self.processor.snapshot(),
            autocorrelation: self.processor.autocorrelation_report(),
            final_config: self.processor.config().clone(),
            step_flags: self.step_flags,
            events: self.events,
        }
    }
}

pub fn replay(config: Configuration, log: &RecordedLog) -> Result<ReplayOutcome> {
    let mut session = ReplaySession::new(config)?;
    for sample in &log.samples {
        session.feed(sample);
    }
    Ok(session.finish())
}

/// Replay that checks `cancel` between samples. A cancelled run leaves no
/// state behind; the next call starts a fresh session.
pub fn replay_cancellable(config: Configuration, log: &RecordedLog, cancel: &AtomicBool) -> Result<ReplayOutcome> {
    let mut session = ReplaySession::new(config)?;
    for sample in &log.samples {
        if cancel.load(Ordering::Relaxed) {
            return Err(StepError::Cancelled);
        }
        session.feed(sample);
    }
    Ok(session.finish())
}

/// Chunked replay yielding to the runtime between chunks. Output is identical
/// to [`replay`].
pub async fn replay_async(
    config: Configuration,
    log: &RecordedLog,
    chunk_size: usize,
    cancel: Option<&AtomicBool>,
) -> Result<ReplayOutcome> {
    let mut session = ReplaySession::new(config)?;
    for chunk in log.samples.chunks(chunk_size.max(1)) {
        if cancel.map(|c| c.load(Ordering::Relaxed)).unwrap_or(false) {
            return Err(StepError::Cancelled);
        }
        for sample in chunk {
            session.feed(sample);
        }
        tokio::task::yield_now().await;
    }
    Ok(session.finish())
}

/// Run several configurations against the same log in parallel. Each run owns
/// its configuration clone and processor.
pub fn compare(configs: &[Configuration], log: &RecordedLog) -> Vec<Result<ReplayOutcome>> {
    let scoped = crossbeam::thread::scope(|scope| {
        let handles: Vec<_> = configs
            .iter()
            .map(|config| scope.spawn(move |_| replay(config.clone(), log)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or(Err(StepError::WorkerPanicked)))
            .collect::<Vec<_>>()
    });
    scoped.unwrap_or_else(|_| configs.iter().map(|_| Err(StepError::WorkerPanicked)).collect())
}
