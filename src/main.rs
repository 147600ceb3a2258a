mod camera;
mod config;
mod geodesy;
mod runner;
mod source;
mod tracking;
mod web;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

use crate::camera::{ActivationState, ActivationStateMachine, ActuatorDriver, NullActuator};
use crate::config::{ActuatorConfig, Config};
use crate::runner::{Runner, RunnerSettings};
use crate::source::{FileMode, JsonLinesSource, ModeSource, PositionSource, SharedMode};
use crate::tracking::{TargetSample, Velocity};
use crate::web::{AppState, ModeHandle};

#[derive(Parser)]
#[command(name = "dronetracker")]
#[command(about = "Point a PTZ camera at a drone and record while it flies")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a configuration file
    Validate { config: String },
    /// Print the aim solution for a single telemetry fix
    #[command(allow_negative_numbers = true)]
    Aim {
        config: String,
        #[arg(long)]
        lat: f64,
        #[arg(long)]
        lon: f64,
        #[arg(long)]
        alt: f64,
        /// East velocity, m/s
        #[arg(long, default_value_t = 0.0)]
        vx: f64,
        /// Vertical velocity, m/s, in the configured telemetry convention
        #[arg(long, default_value_t = 0.0)]
        vy: f64,
        /// North velocity, m/s
        #[arg(long, default_value_t = 0.0)]
        vz: f64,
    },
    /// Track the drone described by a telemetry stream
    Run {
        config: String,
        /// JSON-lines telemetry file, `-` for stdin (overrides the config)
        #[arg(long)]
        telemetry: Option<PathBuf>,
        /// Do not touch the camera
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { config } => validate(&config),
        Commands::Aim {
            config,
            lat,
            lon,
            alt,
            vx,
            vy,
            vz,
        } => aim(&config, lat, lon, alt, (vx, vy, vz)),
        Commands::Run {
            config,
            telemetry,
            dry_run,
        } => run(&config, telemetry, dry_run),
    }
}

fn load_config(path: &str) -> Option<Config> {
    match Config::from_file(path) {
        Ok(config) => Some(config),
        Err(e) => {
            eprintln!("Error loading {}: {}", path, e);
            None
        }
    }
}

fn validate(path: &str) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };

    println!("Configuration is valid");
    let o = &config.observer;
    println!(
        "  observer: {:.6}, {:.6} @ {:.1} m",
        o.latitude_deg, o.longitude_deg, o.altitude_m
    );
    println!(
        "  lead time: {} s, pan offset: {} deg",
        config.tracking.lead_time_s, config.tracking.pan_offset_deg
    );
    let actuator = match &config.actuator {
        ActuatorConfig::Null => "null",
        ActuatorConfig::Shell(_) => "shell",
    };
    println!("  actuator: {}", actuator);
    println!(
        "  deactivation delay: {}",
        humantime::format_duration(config.activation.deactivation_delay)
    );
    println!("  telemetry: {}", config.telemetry.path.display());
    match &config.mode.file {
        Some(file) => println!("  mode: from {}", file.display()),
        None => println!("  mode: {}", config.mode.initial),
    }
    if let Some(web) = &config.web {
        println!("  web: {} ({} API keys)", web.bind, web.api_keys.len());
    }
    ExitCode::SUCCESS
}

fn aim(path: &str, lat: f64, lon: f64, alt: f64, velocity: (f64, f64, f64)) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };

    let (vx, vy, vz) = velocity;
    let sample = TargetSample::new(
        lat,
        lon,
        alt,
        Velocity {
            east: vx,
            north: vz,
            up: config.telemetry.vertical_velocity.to_up(vy),
        },
    );

    let solution = match config.tracking_engine().solve(&sample) {
        Ok(solution) => solution,
        Err(e) => {
            eprintln!("Cannot aim: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&solution) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error encoding solution: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(path: &str, telemetry: Option<PathBuf>, dry_run: bool) -> ExitCode {
    let Some(config) = load_config(path) else {
        return ExitCode::FAILURE;
    };

    let dry_run_log = dry_run.then(NullActuator::new);
    let driver: Box<dyn ActuatorDriver> = match &dry_run_log {
        Some(null) => {
            log::info!("dry run: camera commands are not sent");
            Box::new(null.clone())
        }
        None => config.actuator.build(),
    };
    let camera = ActivationStateMachine::new(
        config.tracking_engine(),
        driver,
        config.activation_settings(),
    );

    let telemetry_path = telemetry.unwrap_or_else(|| config.telemetry.path.clone());
    let positions =
        match JsonLinesSource::open(&telemetry_path, config.telemetry.vertical_velocity) {
            Ok(source) => source,
            Err(e) => {
                eprintln!("Error opening {}: {}", telemetry_path.display(), e);
                return ExitCode::FAILURE;
            }
        };

    let runtime = match Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error starting runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let settings = RunnerSettings::from_config(&config);
    match &config.mode.file {
        Some(file) => {
            serve(&runtime, &config, &camera, ModeHandle::File(file.clone()));
            let mode = FileMode::new(file.clone(), config.mode.poll_hz);
            drive(&runtime, Runner::new(camera.clone(), positions, mode, settings));
        }
        None => {
            let mode = SharedMode::new(config.mode.initial);
            serve(&runtime, &config, &camera, ModeHandle::Shared(mode.clone()));
            drive(&runtime, Runner::new(camera.clone(), positions, mode, settings));
        }
    }

    runtime.shutdown_timeout(Duration::from_secs(1));

    if let Some(null) = dry_run_log {
        println!(
            "Dry run: {} moves, {} recordings started, {} stopped",
            null.moves().len(),
            null.started().len(),
            null.stopped().len()
        );
    }

    if camera.state() == ActivationState::Inactive {
        ExitCode::SUCCESS
    } else {
        eprintln!("Stopped with the camera still {}", camera.state());
        ExitCode::FAILURE
    }
}

fn serve(runtime: &Runtime, config: &Config, camera: &ActivationStateMachine, mode: ModeHandle) {
    let Some(web) = &config.web else {
        return;
    };
    let state = AppState {
        camera: camera.clone(),
        mode,
        api_keys: Arc::new(web.api_keys.clone()),
    };
    let bind = web.bind.clone();
    runtime.spawn(async move {
        if let Err(e) = web::run_server(bind, state).await {
            log::error!("web server failed: {}", e);
        }
    });
}

/// Runs the control loop on this thread. The first interrupt parks the
/// camera, a second one abandons recording retries.
fn drive<P: PositionSource, M: ModeSource>(runtime: &Runtime, mut runner: Runner<P, M>) {
    let shutdown = runner.shutdown_handle();
    let camera = runner.camera().clone();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        log::info!("interrupted, parking the camera");
        shutdown.store(true, Ordering::SeqCst);
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("interrupted again, giving up on recording retries");
            camera.abort_retries();
        }
    });

    runner.run();
}
