use std::path::{Path, PathBuf};

use clap::Parser;
use log::warn;
use serde_json::{json, Value};
use step_tracker_rs::config::{self, Configuration};
use step_tracker_rs::replay::{self, RecordedLog, DEFAULT_CHUNK_SIZE};

#[derive(Parser, Debug)]
#[command(name = "step_replay")]
#[command(about = "Replay recorded sessions through the step detector", long_about = None)]
struct Args {
    /// Path to a recorded session (.json or .json.gz)
    #[arg(long, conflicts_with = "dir")]
    log: Option<PathBuf>,

    /// Directory of recorded sessions to batch replay
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Configuration snapshot file; every element is replayed
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run all configurations in parallel instead of only the first
    #[arg(long, default_value_t = false)]
    compare: bool,

    /// Replay on the async runtime, yielding between chunks
    #[arg(long, default_value_t = false)]
    chunked: bool,

    /// Samples per chunk for --chunked
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Include the session's autocorrelation estimate
    #[arg(long, default_value_t = false)]
    autocorrelation: bool,
}

fn load_configs(args: &Args) -> anyhow::Result<Vec<Configuration>> {
    let mut configs = match args.config.as_ref() {
        Some(path) => config::load_snapshot_file(path)?,
        None => vec![Configuration::default()],
    };
    if configs.is_empty() {
        anyhow::bail!("configuration snapshot holds no entries");
    }
    if !args.compare {
        configs.truncate(1);
    }
    for config in configs.iter_mut() {
        config.autocorrelation |= args.autocorrelation;
    }
    Ok(configs)
}

fn run_once(path: &Path, configs: &[Configuration], args: &Args) -> anyhow::Result<Value> {
    let log: RecordedLog = replay::load_log(path)?;

    let runs: Vec<Value> = if configs.len() > 1 {
        replay::compare(configs, &log)
            .into_iter()
            .map(|outcome| match outcome.map(|o| serde_json::to_value(&o)) {
                Ok(Ok(value)) => value,
                Ok(Err(e)) => run_error(&e),
                Err(e) => run_error(&e),
            })
            .collect()
    } else if args.chunked {
        let runtime = tokio::runtime::Builder::new_current_thread().build()?;
        let outcome = runtime.block_on(replay::replay_async(configs[0].clone(), &log, args.chunk_size, None))?;
        vec![serde_json::to_value(&outcome)?]
    } else {
        vec![serde_json::to_value(&replay::replay(configs[0].clone(), &log)?)?]
    };

    Ok(json!({
        "log": path.display().to_string(),
        "samples": log.samples.len(),
        "accelerometer_samples": log.accelerometer_samples(),
        "skipped_fields": log.skipped_fields,
        "skipped_entries": log.skipped_entries,
        "chunk_size": args.chunked.then_some(args.chunk_size),
        "runs": runs,
    }))
}

fn run_error(e: &dyn std::fmt::Display) -> Value {
    json!({ "error": e.to_string() })
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let configs = load_configs(&args)?;
    let mut results = Vec::new();

    if let Some(dir) = args.dir.as_ref() {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .filter(|path| {
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                name.ends_with(".json") || name.ends_with(".json.gz")
            })
            .collect();
        paths.sort();
        for path in paths {
            match run_once(&path, &configs, &args) {
                Ok(res) => results.push(res),
                Err(e) => warn!("Failed {}: {}", path.display(), e),
            }
        }
    } else if let Some(log) = args.log.as_ref() {
        results.push(run_once(log, &configs, &args)?);
    } else {
        anyhow::bail!("Provide --log or --dir");
    }

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
