use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use log::info;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufRead, BufReader};
use tokio::sync::mpsc;

use step_tracker_rs::config::{self, Configuration, CutoffFrequency, FilterKind, RecognitionAlgorithm};
use step_tracker_rs::live_status::LiveStatus;
use step_tracker_rs::processor::{ProcessorEvent, StepProcessor};
use step_tracker_rs::sensors;
use step_tracker_rs::types::SensorKind;

#[derive(Parser, Debug)]
#[command(name = "step_counter")]
#[command(about = "Live step counter over a stream of sensor samples", long_about = None)]
struct Args {
    /// Sample stream (`kind,x,y,z,timestamp_ms` per line); stdin when omitted
    #[arg(long)]
    input: Option<PathBuf>,

    /// Configuration snapshot file (first element is used)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Filter (bagilevi, low-pass, none, rotation, butterworth)
    #[arg(long)]
    filter: Option<String>,

    /// Recognition algorithm (peak, crossing, bagilevi, timing)
    #[arg(long)]
    recognition: Option<String>,

    /// Cutoff (2%, 1, 2, 3, 5, 10)
    #[arg(long)]
    cutoff: Option<String>,

    /// Enable the false-step validator
    #[arg(long)]
    false_steps: bool,

    /// Buffer samples for an autocorrelation estimate at end of input
    #[arg(long)]
    autocorrelation: bool,

    /// Output directory for live_status.json
    #[arg(long, default_value = "step_sessions")]
    output_dir: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = build_config(&args)?;

    println!("[{}] Step Counter Starting", ts_now());
    println!("  Filter: {:?}", config.filter);
    println!("  Recognition: {:?}", config.recognition);
    println!("  Cutoff: {:?}", config.cutoff_frequency);
    println!("  False-step detection: {}", config.false_step_detection);
    println!("  Output Dir: {}", args.output_dir);

    std::fs::create_dir_all(&args.output_dir)?;
    let status_path = Path::new(&args.output_dir).join("live_status.json");

    let mut processor = StepProcessor::new(config)?;
    let reports = processor.subscribe(256);

    let (tx, mut rx) = mpsc::channel(1000);
    let input: Box<dyn AsyncBufRead + Unpin + Send> = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("opening {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };
    let input_handle = tokio::spawn(sensors::line_loop(input, tx));

    let start = Utc::now();
    let mut last_status_update = Utc::now();
    let mut status = LiveStatus::new();
    let mut other_samples = 0u64;

    println!("[{}] Waiting for samples...", ts_now());

    while let Some(sample) = rx.recv().await {
        if sample.kind != SensorKind::Accelerometer {
            other_samples += 1;
        }
        let out = processor.process(&sample);
        for event in &out.events {
            report_event(event);
        }
        for report in reports.try_iter() {
            println!(
                "[{}] Step {} at {} ms (filtered {:.3})",
                ts_now(),
                report.step_count,
                report.timestamp_ms,
                report.filtered_value
            );
        }

        let now = Utc::now();
        if now.signed_duration_since(last_status_update).num_seconds() >= 2 {
            let uptime = now.signed_duration_since(start).num_seconds().max(0) as u64;
            status.update(&processor.snapshot(), uptime);
            status.other_samples = other_samples;
            let _ = status.save(&status_path);
            last_status_update = now;
        }
    }

    let delivered = input_handle.await?;
    let out = processor.finish();
    for event in &out.events {
        report_event(event);
    }
    for report in reports.try_iter() {
        println!("[{}] Step {} at {} ms (end of input)", ts_now(), report.step_count, report.timestamp_ms);
    }

    let uptime = Utc::now().signed_duration_since(start).num_seconds().max(0) as u64;
    status.update(&processor.snapshot(), uptime);
    status.other_samples = other_samples;
    status.input_closed = true;
    status.save(&status_path)?;

    println!("\n=== Final Stats ===");
    println!("Samples delivered: {}", delivered);
    println!("Steps: {}", processor.step_count());
    println!("Rejected steps: {}", processor.rejected_steps());
    println!("Sampling rate: {:.1} Hz", processor.sample_rate());
    println!("Filter: {}", processor.filter_label());
    if let Some(report) = processor.autocorrelation_report() {
        println!("Autocorrelation estimate: {} steps", report.steps);
        if let Some(reason) = &report.fallback_reason {
            println!("  (fallback: {})", reason);
        }
    }

    Ok(())
}

fn build_config(args: &Args) -> Result<Configuration> {
    let mut config = match &args.config {
        Some(path) => config::load_snapshot_file(path)?
            .into_iter()
            .next()
            .with_context(|| format!("{} holds no configuration", path.display()))?,
        None => Configuration::default(),
    };

    if let Some(name) = &args.filter {
        config.filter = parse_filter(name)?;
    }
    if let Some(name) = &args.recognition {
        config.switch_recognition(parse_recognition(name)?);
    }
    if let Some(name) = &args.cutoff {
        config.cutoff_frequency = parse_cutoff(name)?;
    }
    config.false_step_detection |= args.false_steps;
    config.autocorrelation |= args.autocorrelation;
    config.validate()?;
    Ok(config)
}

fn parse_filter(name: &str) -> Result<FilterKind> {
    Ok(match name.to_ascii_lowercase().as_str() {
        "bagilevi" => FilterKind::Bagilevi,
        "low-pass" | "lowpass" | "low_pass" => FilterKind::LowPass,
        "none" | "pass-through" | "passthrough" => FilterKind::PassThrough,
        "rotation" | "rotation-projected" => FilterKind::RotationProjected,
        "butterworth" => FilterKind::Butterworth,
        other => bail!("unknown filter '{}'", other),
    })
}

fn parse_recognition(name: &str) -> Result<RecognitionAlgorithm> {
    Ok(match name.to_ascii_lowercase().as_str() {
        "peak" | "peak-difference" => RecognitionAlgorithm::PeakDifference,
        "crossing" | "crossing-correction" => RecognitionAlgorithm::CrossingCorrection,
        "bagilevi" => RecognitionAlgorithm::Bagilevi,
        "timing" | "time-filtering" => RecognitionAlgorithm::TimeFiltering,
        other => bail!("unknown recognition algorithm '{}'", other),
    })
}

fn parse_cutoff(name: &str) -> Result<CutoffFrequency> {
    Ok(match name.trim_end_matches("hz").trim_end_matches("Hz") {
        "2%" | "two-percent" => CutoffFrequency::TwoPercent,
        "1" => CutoffFrequency::Hz1,
        "2" => CutoffFrequency::Hz2,
        "3" => CutoffFrequency::Hz3,
        "5" => CutoffFrequency::Hz5,
        "10" => CutoffFrequency::Hz10,
        other => bail!("unknown cutoff '{}'", other),
    })
}

fn report_event(event: &ProcessorEvent) {
    match event {
        ProcessorEvent::SamplingRateEstimated { .. } | ProcessorEvent::FilterReinitialised { .. } => {
            info!("{:?}", event)
        }
        other => log::debug!("{:?}", other),
    }
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_names() {
        assert_eq!(parse_filter("Low-Pass").unwrap(), FilterKind::LowPass);
        assert_eq!(parse_recognition("timing").unwrap(), RecognitionAlgorithm::TimeFiltering);
        assert_eq!(parse_cutoff("5hz").unwrap(), CutoffFrequency::Hz5);
        assert_eq!(parse_cutoff("2%").unwrap(), CutoffFrequency::TwoPercent);
        assert!(parse_filter("kalman").is_err());
    }
}
