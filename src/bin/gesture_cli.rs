use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gesture_playback::analysis::ImuSample;
use gesture_playback::calibration::{
    validate_loaded, CalibrationModel, CalibrationRepository, CalibrationSession,
    JsonFileRepository,
};
use gesture_playback::fixtures::{CalibrationProfile, GesturePattern, GestureSpec, DEFAULT_SEED};
use gesture_playback::{
    CalibrationError, Channel, ControlOutcome, EngineConfig, GestureControlLoop,
    TelemetryCollector,
};
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(
    name = "gesture_cli",
    about = "Deterministic harness for the gesture playback control loop"
)]
struct Cli {
    /// Engine configuration JSON (defaults are used when omitted or unreadable)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Calibrate synthetically, then drive the loop with a generated gesture
    Simulate {
        #[arg(long, default_value_t = GesturePattern::Clockwise)]
        pattern: GesturePattern,
        #[arg(long, default_value_t = 360.0)]
        speed: f64,
        #[arg(long, default_value_t = 2_000)]
        duration_ms: i64,
        #[arg(long, default_value_t = 50)]
        rate_hz: u32,
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,
        /// Feed the gesture to the left (volume) channel instead
        #[arg(long)]
        left: bool,
    },
    /// Replay a JSONL capture of `{channel, angularVelocityDps, timestampMs}` lines
    Replay {
        #[arg(long)]
        input: PathBuf,
        /// Stored calibration; the loop runs degraded without one
        #[arg(long)]
        calibration: Option<PathBuf>,
    },
    /// Validate a stored calibration and print its quality summary
    InspectCalibration {
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplayRecord {
    channel: Channel,
    angular_velocity_dps: f64,
    timestamp_ms: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutcomeLine<'a> {
    timestamp_ms: i64,
    channel: Channel,
    #[serde(flatten)]
    outcome: &'a ControlOutcome,
}

fn main() -> ExitCode {
    gesture_playback::init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Simulate {
            pattern,
            speed,
            duration_ms,
            rate_hz,
            seed,
            left,
        } => {
            let spec = GestureSpec {
                pattern,
                speed_dps: speed,
                duration_ms,
                rate_hz,
                seed,
                ..GestureSpec::default()
            };
            let channel = if left { Channel::Left } else { Channel::Right };
            run_simulate(config, &spec, channel)
        }
        Commands::Replay { input, calibration } => {
            run_replay(config, &input, calibration.as_deref())
        }
        Commands::InspectCalibration { file } => run_inspect(&config, &file),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = path
        .map(|path| EngineConfig::load_from_file(path))
        .unwrap_or_default();
    config.validate().context("validating engine configuration")?;
    Ok(config)
}

fn run_simulate(config: EngineConfig, spec: &GestureSpec, channel: Channel) -> Result<ExitCode> {
    let mut session = CalibrationSession::new(config.calibration.clone());
    let model = CalibrationProfile::default()
        .run(&mut session, 0)
        .context("running synthetic calibration")?;

    let samples = spec.generate();
    let start_ms = samples.first().map(|sample| sample.timestamp_ms).unwrap_or(0);
    let events = Arc::new(TelemetryCollector::default());
    let mut control = GestureControlLoop::new(config, Some(&model), events)?;
    control.start_exercise(start_ms);

    for sample in &samples {
        let outcome = control.process(channel, sample);
        emit_outcome(sample.timestamp_ms, channel, &outcome)?;
    }

    println!("{}", serde_json::to_string(&control.events().snapshot())?);
    Ok(ExitCode::from(0))
}

fn run_replay(config: EngineConfig, input: &Path, calibration: Option<&Path>) -> Result<ExitCode> {
    let model = calibration
        .map(|path| load_calibration(&config, path))
        .transpose()?;

    let contents = fs::read_to_string(input)
        .with_context(|| format!("reading replay input {}", input.display()))?;
    let mut samples = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: ReplayRecord = serde_json::from_str(line)
            .with_context(|| format!("parsing line {} of {}", index + 1, input.display()))?;
        let sample = ImuSample::new(record.angular_velocity_dps, record.timestamp_ms)
            .with_context(|| format!("line {} of {}", index + 1, input.display()))?;
        samples.push((record.channel, sample));
    }

    let start_ms = samples.first().map(|(_, sample)| sample.timestamp_ms).unwrap_or(0);
    let events = Arc::new(TelemetryCollector::default());
    let mut control = GestureControlLoop::new(config, model.as_ref(), events)?;
    control.start_exercise(start_ms);

    for (channel, sample) in &samples {
        let outcome = control.process(*channel, sample);
        emit_outcome(sample.timestamp_ms, *channel, &outcome)?;
    }

    println!("{}", serde_json::to_string(&control.events().snapshot())?);
    Ok(ExitCode::from(0))
}

fn run_inspect(config: &EngineConfig, file: &Path) -> Result<ExitCode> {
    let model = load_calibration(config, file)?;
    let quality = model
        .quality(config.calibration.min_separation_dps)
        .ok_or(CalibrationError::NotComplete)
        .with_context(|| format!("inspecting {}", file.display()))?;

    println!("{}", serde_json::to_string_pretty(&quality)?);
    if quality.low_separation {
        eprintln!(
            "Warning: separation {:.1} dps is below {:.1} dps",
            quality.separation, config.calibration.min_separation_dps
        );
        return Ok(ExitCode::from(2));
    }
    Ok(ExitCode::from(0))
}

fn load_calibration(config: &EngineConfig, path: &Path) -> Result<CalibrationModel> {
    let repository = JsonFileRepository::new(path);
    let Some(model) = repository
        .load()
        .with_context(|| format!("loading calibration {}", path.display()))?
    else {
        bail!("no calibration stored at {}", path.display());
    };
    let model = validate_loaded(model, &config.calibration)
        .with_context(|| format!("validating calibration {}", path.display()))?;
    Ok(model)
}

fn emit_outcome(timestamp_ms: i64, channel: Channel, outcome: &ControlOutcome) -> Result<()> {
    let line = OutcomeLine {
        timestamp_ms,
        channel,
        outcome,
    };
    println!("{}", serde_json::to_string(&line)?);
    Ok(())
}
