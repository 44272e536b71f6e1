//! Carton Inspector - QR identity vs. printed model number
//!
//! Reads the QR label on each carton with one camera and the printed model
//! number with another, and reports PASS when the two agree.

mod analysis;
mod app;
mod calibration;
mod capture;
mod config;
mod inspection;
mod shared;
mod storage;
mod vision;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::analysis::{CycleReport, OcrOutcome, QrOutcome};
use crate::app::InspectionApp;
use crate::calibration::FixedRegion;
use crate::capture::frame::FrameArchive;
use crate::config::AppConfig;
use crate::shared::{InspectionCommand, InspectionUpdate};
use crate::storage::identity_log::IdentityLog;
use crate::storage::profiles::{RoiProfileStore, RoiRect};

/// Carton Inspector - dual-camera carton label inspection
#[derive(Parser, Debug)]
#[command(name = "carton-inspector")]
#[command(about = "Checks the printed model number on cartons against their QR label")]
struct Args {
    /// Configuration file (defaults to config.toml in the platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the inspection loop for a model until stopped (type `q` + Enter)
    Inspect {
        /// Model whose ROI profile is used
        #[arg(short, long)]
        model: String,

        /// Seconds between captures
        #[arg(short, long)]
        interval: Option<u64>,

        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// Capture a frame and store the model number region for a model
    Calibrate {
        #[arg(short, long)]
        model: String,

        /// Region as left,top,width,height
        #[arg(short, long)]
        rect: RoiRect,

        /// Camera index (defaults to the OCR camera)
        #[arg(long)]
        camera: Option<u32>,
    },
    /// Capture and save a single frame
    Snapshot {
        /// Camera index (defaults to the OCR camera)
        #[arg(long)]
        camera: Option<u32>,
    },
    /// Manage ROI profiles
    Profiles {
        #[command(subcommand)]
        action: ProfilesAction,
    },
    /// Show the most recent identity in the log
    Latest,
    /// Show the configured cameras
    Cameras,
    /// Write the current configuration to the config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ProfilesAction {
    /// List all models and their ROI
    List,
    /// Remove the ROI for a model
    Remove { name: String },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_or_default_config(args.config.as_deref())?;

    match args.command {
        Command::Inspect { model, interval, cycles } => run_inspect(config, &model, interval, cycles),
        Command::Calibrate { model, rect, camera } => run_calibrate(&config, &model, rect, camera),
        Command::Snapshot { camera } => run_snapshot(&config, camera),
        Command::Profiles { action } => run_profiles(&config, action),
        Command::Latest => run_latest(&config),
        Command::Cameras => {
            run_cameras(&config);
            Ok(())
        }
        Command::Init { force } => run_init(&config, args.config.as_deref(), force),
    }
}

fn default_config_path() -> Result<PathBuf> {
    Ok(storage::get_config_dir()?.join("config.toml"))
}

/// Load configuration from file or fall back to defaults
fn load_or_default_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let config = config::load_config(path)?;
        info!("Loaded configuration from {:?}", path);
        return Ok(config);
    }

    if let Ok(config_path) = default_config_path() {
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path);
                    return Ok(config);
                }
                Err(e) => warn!("Ignoring {:?}: {:#}", config_path, e),
            }
        }
    }
    info!("Using default configuration");
    Ok(AppConfig::default())
}

fn run_inspect(mut config: AppConfig, model: &str, interval: Option<u64>, cycles: Option<u64>) -> Result<()> {
    if let Some(interval) = interval {
        config.inspection.capture_interval_secs = interval;
    }
    if cycles.is_some() {
        config.inspection.max_cycles = cycles;
    }

    let mut app = InspectionApp::new(config);
    app.start(model)?;

    // Operator stop: `q` on stdin
    let stop_tx = app.to_inspection.clone();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if matches!(line.trim(), "q" | "quit") {
                let _ = stop_tx.send(InspectionCommand::Stop);
                break;
            }
        }
    });

    loop {
        match app.from_inspection.recv_timeout(Duration::from_millis(250)) {
            Ok(update) => {
                if print_update(&update) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) if !app.is_running() => break,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let cycles = app.join()?;
    let stats = app.shared_state.read().stats.clone();
    println!(
        "{} cycles: {} PASS, {} FAIL, {} identities logged, {} QR / {} OCR read failures",
        cycles,
        stats.passes,
        stats.fails,
        stats.identities_logged,
        stats.qr_read_failures,
        stats.ocr_read_failures
    );
    Ok(())
}

/// Print an update for the operator; true once the loop has stopped
fn print_update(update: &InspectionUpdate) -> bool {
    match update {
        InspectionUpdate::CameraUnavailable { role, index, reason } => {
            println!("{} (index {}) unavailable: {}", role, index, reason);
        }
        InspectionUpdate::Streaming { model } => {
            println!("Inspecting model '{}'. Type q + Enter to stop.", model);
        }
        InspectionUpdate::Cycle(report) => println!("{}", describe_cycle(report)),
        InspectionUpdate::Stopped { cycles } => {
            println!("Stopped after {} cycles, cameras released", cycles);
            return true;
        }
    }
    false
}

fn describe_cycle(report: &CycleReport) -> String {
    let mut lines = Vec::new();
    let time = report.started_at.format("%H:%M:%S");

    let headline = match &report.ocr {
        OcrOutcome::Inspected(inspection) => format!(
            "[{}] Cycle {}: {} | read '{}' expected '{}'",
            time,
            report.cycle,
            inspection.verdict,
            inspection.extracted_text.as_deref().unwrap_or("-"),
            inspection.expected.as_deref().unwrap_or("-"),
        ),
        OcrOutcome::ReadFailed(reason) => {
            format!("[{}] Cycle {}: no verdict, OCR camera read failed ({})", time, report.cycle, reason)
        }
        OcrOutcome::Skipped => format!("[{}] Cycle {}: no verdict, OCR camera not open", time, report.cycle),
    };
    lines.push(headline);

    if let OcrOutcome::Inspected(inspection) = &report.ocr {
        let frame = inspection
            .frame_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "not saved".to_string());
        lines.push(format!("    OCR: ROI {} frame {}", inspection.roi, frame));
    }

    let qr = match &report.qr {
        QrOutcome::Skipped => "QR: camera not open".to_string(),
        QrOutcome::ReadFailed(reason) => format!("QR: read failed ({})", reason),
        QrOutcome::Decoded { frame_path, records } => {
            let frame = frame_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "not saved".to_string());
            let labels: Vec<&str> = records.iter().map(|r| r.identifier.as_str()).collect();
            format!("QR: {} new label(s) [{}] frame {}", records.len(), labels.join(", "), frame)
        }
    };
    lines.push(format!("    {}", qr));

    lines.join("\n")
}

fn run_calibrate(config: &AppConfig, model: &str, rect: RoiRect, camera: Option<u32>) -> Result<()> {
    let paths = config.storage.resolve()?;
    let mut profiles = RoiProfileStore::load(&paths.roi_profiles);
    let mut archive = FrameArchive::new(&paths.capture_dir)?;
    let backend = capture::backend_for(&config.cameras);
    let index = camera.unwrap_or(config.cameras.ocr_index);

    match calibration::calibrate(
        backend.as_ref(),
        index,
        model,
        &mut FixedRegion(rect),
        &mut profiles,
        &mut archive,
    )? {
        Some(done) => {
            println!("Saved ROI {} for '{}' in {:?}", done.rect, done.model, profiles.path());
            println!("  frame:   {:?}", done.frame_path);
            match &done.overlay_path {
                Some(overlay) => println!("  overlay: {:?}", overlay),
                None => println!("  overlay: (not written)"),
            }
            match &done.crop_path {
                Some(crop) => println!("  crop:    {:?}", crop),
                None => println!("  crop:    (region is outside the frame)"),
            }
        }
        None => println!("Calibration cancelled"),
    }
    Ok(())
}

fn run_snapshot(config: &AppConfig, camera: Option<u32>) -> Result<()> {
    let paths = config.storage.resolve()?;
    let mut archive = FrameArchive::new(&paths.capture_dir)?;
    let backend = capture::backend_for(&config.cameras);
    let index = camera.unwrap_or(config.cameras.ocr_index);

    let path = calibration::snapshot(backend.as_ref(), index, &mut archive)?;
    println!("{}", path.display());
    Ok(())
}

fn run_profiles(config: &AppConfig, action: ProfilesAction) -> Result<()> {
    let paths = config.storage.resolve()?;
    let mut profiles = RoiProfileStore::load(&paths.roi_profiles);

    match action {
        ProfilesAction::List => {
            if profiles.is_empty() {
                println!("No ROI profiles in {:?}", profiles.path());
            }
            for (name, rect) in profiles.iter() {
                println!("{:<24} {}", name, rect);
            }
        }
        ProfilesAction::Remove { name } => match profiles.remove(&name) {
            Some(rect) => {
                profiles.save()?;
                println!("Removed '{}' ({})", name, rect);
            }
            None => println!("No profile named '{}'", name),
        },
    }
    Ok(())
}

fn run_latest(config: &AppConfig) -> Result<()> {
    let paths = config.storage.resolve()?;
    let log = IdentityLog::at(&paths.identity_log);
    if !log.exists() {
        println!("No identity log at {:?}", log.path());
        return Ok(());
    }

    let latest = log
        .latest()
        .with_context(|| format!("Failed to read {:?}", log.path()))?;
    match latest {
        Some(record) => println!(
            "{} model {} (trimmed {}) destination {} serial {}",
            record.identifier,
            record.model_number,
            record.trimmed_model_number,
            record.destination_code,
            record.serial_number
        ),
        None => println!("Identity log {:?} is empty", log.path()),
    }
    Ok(())
}

fn run_cameras(config: &AppConfig) {
    let backend = capture::backend_for(&config.cameras);
    println!("Backend: {}", backend.name());
    if let Some(dir) = &config.cameras.replay_dir {
        println!("Replay directory: {:?}", dir);
    }
    println!("QR camera:  index {}", config.cameras.qr_index);
    println!("OCR camera: index {}", config.cameras.ocr_index);
    println!(
        "Both cameras required: {}",
        if config.cameras.require_both_cameras { "yes" } else { "no" }
    );
}

fn run_init(config: &AppConfig, explicit: Option<&Path>, force: bool) -> Result<()> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => default_config_path()?,
    };
    if path.exists() && !force {
        println!("{:?} already exists (use --force to overwrite)", path);
        return Ok(());
    }

    config::save_config(config, &path)?;
    println!("Wrote configuration to {:?}", path);
    Ok(())
}
