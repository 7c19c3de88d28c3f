use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use face_midi::calibration::CalibrationStep;
use face_midi::config::{AppConfig, DEFAULT_CONFIG_FILE};
use face_midi::midi::{MidiEmitter, RecordingEmitter};
use face_midi::pose::{ChannelPoseSource, SyntheticPoseSource};
use face_midi::telemetry;
use face_midi::{init_logging, Axis, Coordinator, PerAxis, PipelineMode, PoseSample};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "face_midi_cli",
    about = "Head pose to MIDI CC pipeline: simulation, calibration and config tools"
)]
struct Cli {
    /// Configuration file (defaults to face_midi_config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive the pipeline with a synthetic head sweep and report MIDI output
    Simulate {
        #[arg(long, default_value_t = 5)]
        seconds: u64,
        #[arg(long, default_value_t = 30)]
        fps: u32,
        /// Sweep period in milliseconds
        #[arg(long, default_value_t = 4000)]
        period_ms: u64,
        /// Sweep amplitude in degrees, applied to all three axes
        #[arg(long, default_value_t = 35.0)]
        amplitude: f64,
        /// Uniform angle jitter in degrees
        #[arg(long, default_value_t = 0.5)]
        jitter: f64,
        /// Probability of a no-face frame
        #[arg(long, default_value_t = 0.0)]
        dropouts: f64,
        #[arg(long, default_value_t = 7)]
        seed: u64,
        /// Print every MappedValue as a JSON line
        #[arg(long)]
        stream: bool,
        /// Send to the configured hardware/virtual MIDI port
        #[arg(long)]
        midi: bool,
    },
    /// Run the calibration wizard against a scripted head
    Calibrate {
        /// Duration of every step in milliseconds
        #[arg(long, default_value_t = 400)]
        step_ms: u64,
        /// Skip these steps (e.g. roll_right)
        #[arg(long, value_delimiter = ',')]
        skip: Vec<String>,
        /// Write the learned calibration back to the config file
        #[arg(long)]
        save: bool,
    },
    /// Inspect configuration files
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List MIDI output ports
    Ports,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the default configuration
    Default,
    /// Print the effective configuration (defaults merged, invalid axes repaired)
    Show,
    /// Strictly validate a configuration file
    Validate,
}

fn main() -> ExitCode {
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
    init_logging(match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    });
    let config_path = cli
        .config
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    match cli.command {
        Commands::Simulate {
            seconds,
            fps,
            period_ms,
            amplitude,
            jitter,
            dropouts,
            seed,
            stream,
            midi,
        } => {
            let source = SyntheticPoseSource::new(fps, Duration::from_millis(period_ms))
                .with_amplitude(PerAxis::new(amplitude, amplitude, amplitude))
                .with_jitter(jitter)
                .with_dropouts(dropouts)
                .with_seed(seed);
            let options = SimulateOptions {
                duration: Duration::from_secs(seconds),
                stream,
                midi,
            };
            run_simulate(&config_path, source, options)
        }
        Commands::Calibrate {
            step_ms,
            skip,
            save,
        } => run_calibrate(&config_path, step_ms, &skip, save),
        Commands::Config { action } => run_config(&config_path, action),
        Commands::Ports => run_ports(),
    }
}

struct SimulateOptions {
    duration: Duration,
    stream: bool,
    midi: bool,
}

#[derive(Serialize)]
struct SimulationReport {
    samples_processed: u64,
    frames_dropped: u64,
    messages_sent: usize,
    final_values: PerAxis<Option<u8>>,
    telemetry_events: u64,
    last_fault: Option<String>,
}

fn run_simulate(
    config_path: &Path,
    source: SyntheticPoseSource,
    options: SimulateOptions,
) -> Result<ExitCode> {
    let config = AppConfig::load_from_file(config_path);
    let (emitter, recording) = RecordingEmitter::new();
    let emitter: Box<dyn MidiEmitter> = if options.midi {
        open_hardware_emitter(&config)?
    } else {
        Box::new(emitter)
    };

    let coordinator = Coordinator::new(config, Box::new(source), emitter)
        .context("creating pipeline coordinator")?;
    let mut mapped = coordinator.subscribe_mapped();
    let mut streamed = 0usize;

    coordinator.start().context("starting pipeline")?;
    let deadline = Instant::now() + options.duration;
    while Instant::now() < deadline && coordinator.is_running() {
        thread::sleep(Duration::from_millis(100));
        while let Ok(value) = mapped.try_recv() {
            streamed += 1;
            if options.stream {
                println!("{}", serde_json::to_string(&value)?);
            }
        }
    }
    let snapshot = coordinator.snapshot();
    coordinator.stop().context("stopping pipeline")?;

    let report = SimulationReport {
        samples_processed: snapshot.samples_processed,
        frames_dropped: snapshot.frames_dropped,
        messages_sent: if options.midi { streamed } else { recording.len() },
        final_values: snapshot.midi_values,
        telemetry_events: telemetry::hub().snapshot().total_events,
        last_fault: snapshot.last_fault,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(if report.last_fault.is_some() {
        ExitCode::from(2)
    } else {
        ExitCode::from(0)
    })
}

#[cfg(feature = "hardware-midi")]
fn open_hardware_emitter(config: &AppConfig) -> Result<Box<dyn MidiEmitter>> {
    let emitter = face_midi::midi::MidirEmitter::open(&config.midi)
        .context("opening MIDI output")?;
    Ok(Box::new(emitter))
}

#[cfg(not(feature = "hardware-midi"))]
fn open_hardware_emitter(_config: &AppConfig) -> Result<Box<dyn MidiEmitter>> {
    bail!("built without the `hardware-midi` feature")
}

/// Raw pose the scripted head holds during each step.
fn scripted_pose(step: Option<CalibrationStep>) -> PerAxis<f64> {
    let neutral = PerAxis::new(2.0, -3.0, 1.0);
    let mut pose = neutral;
    match step {
        Some(CalibrationStep::PitchUp) => pose.pitch += 22.0,
        Some(CalibrationStep::PitchDown) => pose.pitch -= 18.0,
        Some(CalibrationStep::YawRight) => pose.yaw += 35.0,
        Some(CalibrationStep::YawLeft) => pose.yaw -= 30.0,
        Some(CalibrationStep::RollRight) => pose.roll += 25.0,
        Some(CalibrationStep::RollLeft) => pose.roll -= 20.0,
        Some(CalibrationStep::Neutral) | None => {}
    }
    pose
}

fn parse_steps(names: &[String]) -> Result<Vec<CalibrationStep>> {
    names
        .iter()
        .map(|name| {
            serde_json::from_value::<CalibrationStep>(serde_json::Value::String(name.clone()))
                .with_context(|| format!("unknown calibration step '{}'", name))
        })
        .collect()
}

fn run_calibrate(
    config_path: &Path,
    step_ms: u64,
    skip: &[String],
    save: bool,
) -> Result<ExitCode> {
    let skip = parse_steps(skip)?;
    let mut config = AppConfig::load_from_file(config_path);
    config.calibration.neutral_step_ms = step_ms;
    config.calibration.directional_step_ms = step_ms;

    let (source, feeder) = ChannelPoseSource::new();
    let (emitter, _recording) = RecordingEmitter::new();
    let coordinator = Coordinator::new(config, Box::new(source), Box::new(emitter))
        .context("creating pipeline coordinator")?;
    let mut progress_rx = coordinator.subscribe_calibration();

    coordinator.start().context("starting pipeline")?;
    coordinator
        .start_calibration()
        .context("starting calibration")?;

    let frame = Duration::from_millis(33);
    let give_up = Instant::now() + Duration::from_millis(step_ms * 10 + 5_000);
    let mut last_step = None;
    while coordinator.mode() == PipelineMode::Calibrating {
        if Instant::now() > give_up {
            coordinator.cancel_calibration().ok();
            bail!("calibration did not finish in time");
        }

        let step = coordinator
            .snapshot()
            .calibration
            .and_then(|progress| progress.current_step);
        if step != last_step {
            last_step = step;
            if let Some(step) = step.filter(|step| skip.contains(step)) {
                coordinator
                    .skip_calibration_step()
                    .with_context(|| format!("skipping {}", step.display_name()))?;
                continue;
            }
        }

        let pose = scripted_pose(step);
        feeder.send_sample(PoseSample::now(pose.pitch, pose.yaw, pose.roll));
        thread::sleep(frame);

        while let Ok(progress) = progress_rx.try_recv() {
            println!(
                "[{:>3}%] {} ({} samples, skipped {:?})",
                progress.percentage(),
                progress.title(),
                progress.samples_collected,
                progress.skipped_steps
            );
        }
    }

    let learned = coordinator.config().context("reading learned configuration")?;
    coordinator.stop().context("stopping pipeline")?;

    for axis in Axis::ALL {
        let calibration = learned.axes[axis].calibration;
        println!(
            "{:<5} neutral {:>7.2}  min {:>7.2}  max {:>7.2}",
            axis.display_name(),
            calibration.neutral_offset,
            calibration.min_extent,
            calibration.max_extent
        );
    }

    if save {
        // Keep the file's own step timings
        let mut to_save = learned;
        to_save.calibration = AppConfig::load_from_file(config_path).calibration;
        to_save
            .save_to_file(config_path)
            .with_context(|| format!("writing {}", config_path.display()))?;
        println!("Saved to {}", config_path.display());
    }

    Ok(ExitCode::from(0))
}

fn run_config(config_path: &Path, action: ConfigAction) -> Result<ExitCode> {
    match action {
        ConfigAction::Default => {
            println!("{}", serde_json::to_string_pretty(&AppConfig::default())?);
            Ok(ExitCode::from(0))
        }
        ConfigAction::Show => {
            let config = AppConfig::load_from_file(config_path);
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::from(0))
        }
        ConfigAction::Validate => {
            let contents = std::fs::read_to_string(config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            let raw: AppConfig = match serde_json::from_str(&contents) {
                Ok(config) => config,
                Err(err) => {
                    eprintln!("{}: {}", config_path.display(), err);
                    return Ok(ExitCode::from(2));
                }
            };
            match raw.validate() {
                Ok(()) => {
                    println!("{}: ok", config_path.display());
                    Ok(ExitCode::from(0))
                }
                Err(err) => {
                    eprintln!("{}: {}", config_path.display(), err);
                    Ok(ExitCode::from(2))
                }
            }
        }
    }
}

#[cfg(feature = "hardware-midi")]
fn run_ports() -> Result<ExitCode> {
    let ports = face_midi::midi::list_output_ports().context("listing MIDI ports")?;
    if ports.is_empty() {
        println!("No MIDI output ports found");
    }
    for (index, name) in ports.iter().enumerate() {
        println!("{index}: {name}");
    }
    Ok(ExitCode::from(0))
}

#[cfg(not(feature = "hardware-midi"))]
fn run_ports() -> Result<ExitCode> {
    eprintln!("Port listing requires the `hardware-midi` feature");
    Ok(ExitCode::from(2))
}
