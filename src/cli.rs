// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Running a simulated end-to-end scenario
//! - Evaluating quality gates for given measurements
//! - Showing the effective configuration

use camera_link::backends::camera::{CameraSourceManager, CameraSourceType};
use camera_link::config::Config;
use camera_link::metrics::{E2EMetrics, MetricsCollector};
use camera_link::scenario::run_scenario;
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Command-line overrides for `simulate`
pub struct SimulateOptions {
    pub device: Option<String>,
    pub duration: Option<u64>,
    pub fps: Option<u32>,
    pub connection_delay_ms: Option<u64>,
    pub fail: bool,
    pub ptz_commands: Option<usize>,
    pub json: Option<PathBuf>,
    pub save_report: bool,
}

/// Run the scenario against a simulated source.
///
/// Returns whether every quality gate passed.
pub async fn simulate(
    mut config: Config,
    options: SimulateOptions,
) -> Result<bool, Box<dyn std::error::Error>> {
    if let Some(device) = options.device {
        config.device_id = device;
    }
    if let Some(duration) = options.duration {
        config.stream_duration_secs = duration;
    }
    if let Some(fps) = options.fps {
        config.simulated.target_fps = fps;
    }
    if let Some(delay) = options.connection_delay_ms {
        config.simulated.connection_delay_ms = delay;
    }
    if let Some(count) = options.ptz_commands {
        config.ptz_commands = count;
    }
    config.simulated.should_fail_connection |= options.fail;
    config.require_source(CameraSourceType::Simulated)?;

    let gates = config.quality_gates;
    let collector = Arc::new(MetricsCollector::with_gates(gates));
    let manager = CameraSourceManager::new(
        config.source,
        config.simulated.to_settings(),
        Some(Arc::clone(&collector)),
        None,
    )?;
    let scenario = config.scenario();

    println!("Device: {}", scenario.device_id);
    println!(
        "Stream: {} seconds at {} fps",
        config.stream_duration_secs, config.simulated.target_fps
    );
    println!("PTZ commands: {}", scenario.ptz_commands);
    println!();
    println!("Running... (press Ctrl+C to stop early)");

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    let source = manager.source();
    let metrics = run_scenario(
        source.as_ref(),
        &collector,
        &scenario,
        Some(Arc::clone(&stop_flag)),
    )
    .await;

    if stop_flag.load(Ordering::SeqCst) {
        println!("Stopped early.");
    }
    println!();
    println!("{}", metrics.report_with(&gates));

    if let Some(path) = options.json.as_ref() {
        metrics.write_json_report(path, &gates)?;
        println!("Report saved: {}", path.display());
    }

    if options.save_report {
        let path = report_path(&config.report_dir());
        metrics.write_json_report(&path, &gates)?;
        println!("Report saved: {}", path.display());
    }

    Ok(gates.passed(&metrics))
}

/// Judge hand-entered measurements against the configured gates
pub fn evaluate_gates(
    config: &Config,
    connection_secs: f64,
    first_frame_secs: f64,
    fps: f64,
    ptz_ms: f64,
    errors: u64,
) -> Result<bool, Box<dyn std::error::Error>> {
    let metrics = E2EMetrics {
        connection_time: Duration::try_from_secs_f64(connection_secs)?,
        first_frame_time: Duration::try_from_secs_f64(first_frame_secs)?,
        average_fps: fps,
        ptz_latency: Duration::try_from_secs_f64(ptz_ms / 1000.0)?,
        error_count: errors,
        ..Default::default()
    };

    let gates = config.quality_gates;
    println!("{}", metrics.report_with(&gates));
    Ok(gates.passed(&metrics))
}

/// Print the effective configuration, or only where it lives
pub fn show_config(
    config: &Config,
    explicit_path: Option<&Path>,
    path_only: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = explicit_path
        .map(Path::to_path_buf)
        .or_else(Config::default_path);

    if path_only {
        match path {
            Some(path) => println!("{}", path.display()),
            None => println!("No configuration directory available"),
        }
        return Ok(());
    }

    if let Some(path) = path {
        let origin = if path.exists() { "loaded" } else { "defaults, file missing" };
        println!("# {} ({})", path.display(), origin);
    }
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

/// Unique report file name under `dir`
fn report_path(dir: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let run_id = uuid::Uuid::new_v4().simple().to_string();
    dir.join(format!("e2e_report_{}_{}.json", timestamp, &run_id[..8]))
}
