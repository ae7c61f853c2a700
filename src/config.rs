// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::{CameraSourceType, SimulatedSettings};
use crate::constants::{PtzSpeedPreset, scenario, simulated};
use crate::errors::{AppError, AppResult};
use crate::metrics::QualityGates;
use crate::scenario::ScenarioConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Directory name under the user's config dir
pub const CONFIG_DIR_NAME: &str = "camera-link";

/// File name of the configuration file
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Current configuration layout version
pub const CONFIG_VERSION: u32 = 1;

/// Simulated source settings as stored on disk
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedConfig {
    pub connection_delay_ms: u64,
    pub should_fail_connection: bool,
    pub ptz_delay_ms: u64,
    pub target_fps: u32,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            connection_delay_ms: simulated::CONNECTION_DELAY.as_millis() as u64,
            should_fail_connection: false,
            ptz_delay_ms: simulated::PTZ_DELAY.as_millis() as u64,
            target_fps: simulated::TARGET_FPS,
            frame_width: simulated::FRAME_WIDTH,
            frame_height: simulated::FRAME_HEIGHT,
        }
    }
}

impl SimulatedConfig {
    pub fn to_settings(&self) -> SimulatedSettings {
        SimulatedSettings {
            connection_delay: Duration::from_millis(self.connection_delay_ms),
            should_fail_connection: self.should_fail_connection,
            ptz_delay: Duration::from_millis(self.ptz_delay_ms),
            target_fps: self.target_fps,
            frame_width: self.frame_width,
            frame_height: self.frame_height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Layout version of the file
    pub version: u32,
    /// Camera source to use (simulated or transport)
    pub source: CameraSourceType,
    /// Device to connect to
    pub device_id: String,
    pub simulated: SimulatedConfig,
    /// Streaming phase of a scenario run, in seconds
    pub stream_duration_secs: u64,
    /// PTZ commands issued per scenario run
    pub ptz_commands: usize,
    /// PTZ speed preset (Slow, Medium, Fast)
    pub ptz_speed: PtzSpeedPreset,
    pub quality_gates: QualityGates,
    /// Log filter used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Where JSON reports are written; defaults to the data dir
    pub report_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            source: CameraSourceType::default(),
            device_id: simulated::DEVICE_ID.to_string(),
            simulated: SimulatedConfig::default(),
            stream_duration_secs: scenario::STREAM_DURATION.as_secs(),
            ptz_commands: scenario::PTZ_COMMANDS,
            ptz_speed: PtzSpeedPreset::default(),
            quality_gates: QualityGates::default(),
            log_filter: "warn".to_string(),
            report_dir: None,
        }
    }
}

impl Config {
    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from `path`, or from the default location.
    ///
    /// A missing file yields the defaults; a file that does not parse is an
    /// error.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            debug!("No config directory, using defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            debug!(path = %path.display(), "Config file missing, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)?;
        let config: Config = serde_json::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Write pretty JSON to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!(path = %path.display(), "Saved config");
        Ok(())
    }

    /// Directory JSON reports go to
    pub fn report_dir(&self) -> PathBuf {
        self.report_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
                .join(CONFIG_DIR_NAME)
                .join("reports")
        })
    }

    /// Fail unless the configured source is `expected`
    pub fn require_source(&self, expected: CameraSourceType) -> AppResult<()> {
        if self.source == expected {
            return Ok(());
        }
        Err(AppError::Config(format!(
            "configured source is {}, this command needs {}",
            self.source, expected
        )))
    }

    pub fn scenario(&self) -> ScenarioConfig {
        ScenarioConfig {
            device_id: self.device_id.clone(),
            stream_duration: Duration::from_secs(self.stream_duration_secs),
            ptz_commands: self.ptz_commands,
            ptz_speed: self.ptz_speed,
        }
    }
}
