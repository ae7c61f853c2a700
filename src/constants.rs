// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// PTZ motor speed presets
///
/// Devices accept an integer speed; these presets map friendly names onto
/// values that work across the supported cameras.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PtzSpeedPreset {
    /// Slow, precise positioning
    Slow,
    /// Balanced speed (default)
    #[default]
    Medium,
    /// Fast sweeps
    Fast,
}

impl PtzSpeedPreset {
    /// Get all preset variants for iteration
    pub const ALL: [PtzSpeedPreset; 3] = [
        PtzSpeedPreset::Slow,
        PtzSpeedPreset::Medium,
        PtzSpeedPreset::Fast,
    ];

    /// Get display name for the preset
    pub fn display_name(&self) -> &'static str {
        match self {
            PtzSpeedPreset::Slow => "Slow",
            PtzSpeedPreset::Medium => "Medium",
            PtzSpeedPreset::Fast => "Fast",
        }
    }

    /// Speed value sent to the device
    pub fn speed(&self) -> u32 {
        match self {
            PtzSpeedPreset::Slow => 2,
            PtzSpeedPreset::Medium => 5,
            PtzSpeedPreset::Fast => 8,
        }
    }
}

/// Convert a frame rate into the delay between two frames.
///
/// A rate of zero is treated as one frame per second.
pub fn frame_interval_for_fps(fps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / fps.max(1) as f64)
}

/// Simulated camera defaults
pub mod simulated {
    use std::time::Duration;

    /// Delay before a simulated connect completes
    pub const CONNECTION_DELAY: Duration = Duration::from_millis(1000);

    /// Delay before a simulated PTZ command completes
    pub const PTZ_DELAY: Duration = Duration::from_millis(50);

    /// Synthetic frame rate once streaming
    pub const TARGET_FPS: u32 = 15;

    /// Synthetic frame width
    pub const FRAME_WIDTH: u32 = 1920;

    /// Synthetic frame height
    pub const FRAME_HEIGHT: u32 = 1080;

    /// Bytes per pixel of synthetic frames (packed RGB)
    pub const BYTES_PER_PIXEL: usize = 3;

    /// Device id used when none is configured
    pub const DEVICE_ID: &str = "simulated-camera";

    /// Reason attached to injected connection failures
    pub const FAILURE_REASON: &str = "Simulated failure";
}

/// Boundary (external runtime) constants
pub mod boundary {
    /// Name of the outbound method channel
    pub const METHOD_CHANNEL: &str = "camera";

    /// Name of the inbound event channel
    pub const EVENT_CHANNEL: &str = "camera_events";

    /// Key carrying the event discriminator in inbound payloads
    pub const EVENT_TYPE_KEY: &str = "type";

    /// Frames buffered from the device before new ones are dropped
    pub const FRAME_QUEUE_CAPACITY: usize = 8;

    /// Rate at which device frames are forwarded to observers
    pub const DELIVERY_FPS: u32 = 30;
}

/// Frame delivery constants
pub mod delivery {
    /// Buffered frames per channel subscriber before frames are dropped
    pub const SUBSCRIBER_CAPACITY: usize = 4;

    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;
}

/// Acceptance thresholds for an end-to-end run
pub mod quality_gates {
    use std::time::Duration;

    /// Connect must finish faster than this
    pub const MAX_CONNECTION_TIME: Duration = Duration::from_secs(10);

    /// First frame must arrive faster than this after connecting
    pub const MAX_FIRST_FRAME_TIME: Duration = Duration::from_secs(5);

    /// Average frame rate must exceed this
    pub const MIN_AVERAGE_FPS: f64 = 10.0;

    /// Mean PTZ round-trip must be below this
    pub const MAX_PTZ_LATENCY: Duration = Duration::from_millis(500);

    /// Highest error count that still passes
    pub const MAX_ERRORS: u64 = 0;
}

/// Scenario runner defaults
pub mod scenario {
    use std::time::Duration;

    /// How long the stream runs before PTZ commands are issued
    pub const STREAM_DURATION: Duration = Duration::from_secs(5);

    /// Number of PTZ commands issued per run
    pub const PTZ_COMMANDS: usize = 4;

    /// Poll interval while waiting for the stream duration or a cancel
    pub const POLL_INTERVAL: Duration = Duration::from_millis(100);
}
