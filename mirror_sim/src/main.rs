//! Magic Mirror Simulator CLI
//!
//! Run deterministic mirror camera scenarios against a calibration.

use clap::Parser;
use mirror_core::{
    CalibrationParameters, CalibrationStorage, JsonFileStorage, SessionConfig, SledCalibrationStorage,
};
use mirror_sim::scenarios::ScenarioId;
use mirror_sim::{ScenarioResult, ScenarioRunner, SimError};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Magic Mirror deterministic simulation CLI
#[derive(Parser, Debug)]
#[command(name = "mirror-sim")]
#[command(about = "Run deterministic simulation scenarios for the mirror camera", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (single_viewer, nearest_wins, walk_out, empty_room,
    /// calibration_nudge, approach, sensor_dropout, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Simulation duration in seconds
    #[arg(short, long, default_value = "10")]
    duration: f64,

    /// Tick rate in Hz
    #[arg(long, default_value = "30")]
    tick_rate: u32,

    /// Calibration settings file (JSON)
    #[arg(long, conflicts_with = "sled")]
    settings: Option<PathBuf>,

    /// Calibration sled database directory
    #[arg(long)]
    sled: Option<PathBuf>,

    /// Write a settings file with the default installation calibration and exit
    #[arg(long)]
    init_settings: Option<PathBuf>,

    /// Session configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export sampled frames of a single scenario to a JSON file
    #[arg(long)]
    export: Option<String>,
}

/// Reads the calibration the scenarios start from. Sources are only read;
/// every scenario runs on its own temporary copy.
fn load_calibration(args: &Args) -> Result<CalibrationParameters, SimError> {
    if let Some(path) = &args.settings {
        info!("Calibration from settings file {}", path.display());
        return Ok(JsonFileStorage::new(path).load()?);
    }
    if let Some(dir) = &args.sled {
        info!("Calibration from sled database {}", dir.display());
        return Ok(SledCalibrationStorage::open(dir)?.load()?);
    }
    info!("Using default installation calibration");
    Ok(ScenarioRunner::installation_calibration())
}

fn run(args: &Args) -> Result<bool, SimError> {
    if let Some(path) = &args.init_settings {
        JsonFileStorage::create(path, &ScenarioRunner::installation_calibration())?;
        info!("Wrote default calibration to {}", path.display());
        return Ok(true);
    }

    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().map_err(SimError::Usage)?]
    };

    let calibration = load_calibration(args)?;
    let config = match &args.config {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default(),
    };

    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    let runner_for = |seed: u64| {
        ScenarioRunner::new(seed, calibration)
            .with_duration(args.duration)
            .with_tick_rate(args.tick_rate)
            .with_config(config.clone())
    };

    // Handle --export mode
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            return Err(SimError::Usage("--export only supports a single scenario, not 'all'".into()));
        }

        let (result, export) = runner_for(base_seed).run_with_export(scenarios[0]);
        export.write_to_file(export_path)?;
        info!("Exported {} frames to {}", export.frames.len(), export_path);
        report(&result);
        return Ok(result.passed);
    }

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    for seed_offset in 0..args.seeds {
        let runner = runner_for(base_seed.wrapping_add(seed_offset as u64));
        for scenario in &scenarios {
            let result = runner.run(*scenario);
            if !args.json {
                report(&result);
            }
            all_results.push(result);
        }
    }

    let total = all_results.len();
    let failed = all_results.iter().filter(|r| !r.passed).count();

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed,
            "failed": failed,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "ticks": r.total_ticks,
                    "time_secs": r.final_time_secs,
                    "failure_reason": r.failure_reason,
                    "metrics": r.metrics,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to encode summary: {}", e),
        }
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed == 0 {
            info!("All {} scenario runs passed", total);
        } else {
            error!("{}/{} scenario runs failed", failed, total);
            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    Ok(failed == 0)
}

fn report(result: &ScenarioResult) {
    if result.passed {
        info!(
            "✓ {} (seed={}) PASSED | target {}/{} ticks | mean FOV {}",
            result.scenario.name(),
            result.seed,
            result.metrics.ticks_with_target,
            result.total_ticks,
            result
                .metrics
                .mean_fov_degrees
                .map_or_else(|| "-".to_string(), |f| format!("{:.2}°", f))
        );
    } else {
        error!(
            "✗ {} (seed={}) FAILED: {}",
            result.scenario.name(),
            result.seed,
            result.failure_reason.as_deref().unwrap_or("unknown")
        );
    }
}

fn main() {
    let args = Args::parse();

    // Initialize logging; RUST_LOG overrides --verbose
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if !args.json {
        info!("Magic Mirror Simulator v{}", env!("CARGO_PKG_VERSION"));
    }

    match run(&args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}
