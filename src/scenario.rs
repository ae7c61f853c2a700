// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end acceptance run
//!
//! Drives one source through the whole lifecycle while the collector
//! records it: connect, stream for a while, sweep the PTZ motor, tear down.

use crate::backends::camera::{CameraSource, PtzDirection};
use crate::constants::{PtzSpeedPreset, scenario, simulated};
use crate::metrics::{E2EMetrics, MetricsCollector};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Parameters of one run
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    pub device_id: String,
    pub stream_duration: Duration,
    /// PTZ commands issued after streaming, cycling through the directions
    pub ptz_commands: usize,
    pub ptz_speed: PtzSpeedPreset,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            device_id: simulated::DEVICE_ID.to_string(),
            stream_duration: scenario::STREAM_DURATION,
            ptz_commands: scenario::PTZ_COMMANDS,
            ptz_speed: PtzSpeedPreset::default(),
        }
    }
}

const PTZ_SWEEP: [PtzDirection; 4] = [
    PtzDirection::Left,
    PtzDirection::Right,
    PtzDirection::Up,
    PtzDirection::Down,
];

/// Run the scenario and return the final metrics.
///
/// A set `cancel` flag cuts the streaming phase short; teardown still
/// happens. Failures are counted by the source and end the run early.
pub async fn run_scenario(
    source: &dyn CameraSource,
    collector: &MetricsCollector,
    config: &ScenarioConfig,
    cancel: Option<Arc<AtomicBool>>,
) -> E2EMetrics {
    collector.start();
    info!(device_id = %config.device_id, source = %source.source_type(), "Scenario started");

    if let Err(err) = source.connect(&config.device_id).await {
        warn!(error = %err, "Scenario connect failed");
        return collector.stop();
    }

    if let Err(err) = source.start_stream().await {
        warn!(error = %err, "Scenario stream start failed");
        source.disconnect().await;
        return collector.stop();
    }

    let started = Instant::now();
    while started.elapsed() < config.stream_duration {
        if cancel.as_ref().is_some_and(|c| c.load(Ordering::SeqCst)) {
            info!("Scenario cancelled, tearing down");
            break;
        }
        let remaining = config.stream_duration.saturating_sub(started.elapsed());
        tokio::time::sleep(remaining.min(scenario::POLL_INTERVAL)).await;
    }

    if config.ptz_commands > 0 {
        let speed = config.ptz_speed.speed();
        for direction in PTZ_SWEEP.iter().cycle().take(config.ptz_commands) {
            if let Err(err) = source.set_ptz(*direction, speed).await {
                warn!(error = %err, %direction, "PTZ command failed");
                break;
            }
        }
        if let Err(err) = source.stop_ptz().await {
            warn!(error = %err, "PTZ stop failed");
        }
    }

    source.stop_stream().await;
    source.disconnect().await;

    let metrics = collector.stop();
    info!(
        passed = collector.passed_quality_gates(),
        frames = metrics.frame_count,
        "Scenario finished"
    );
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScenarioConfig::default();
        assert_eq!(config.device_id, "simulated-camera");
        assert_eq!(config.stream_duration, Duration::from_secs(5));
        assert_eq!(config.ptz_commands, 4);
    }

    #[test]
    fn test_sweep_cycles_directions() {
        let sweep: Vec<_> = PTZ_SWEEP.iter().cycle().take(6).copied().collect();
        assert_eq!(sweep[4], PtzDirection::Left);
        assert_eq!(sweep[5], PtzDirection::Right);
    }
}
