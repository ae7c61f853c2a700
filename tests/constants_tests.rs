// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use camera_link::constants::{PtzSpeedPreset, frame_interval_for_fps, quality_gates};
use std::time::Duration;

#[test]
fn test_ptz_speed_preset_values() {
    // Test that all presets exist (Slow, Medium, Fast)
    assert_eq!(PtzSpeedPreset::ALL.len(), 3);
}

#[test]
fn test_ptz_speed_preset_ordering() {
    // Test that presets are ordered from slowest to fastest
    let mut prev_speed = 0u32;
    for preset in PtzSpeedPreset::ALL {
        let speed = preset.speed();
        assert!(
            speed > prev_speed,
            "Presets should be ordered from slowest to fastest"
        );
        prev_speed = speed;
    }
}

#[test]
fn test_ptz_speed_preset_display_names() {
    // Test that all presets have non-empty display names
    for preset in PtzSpeedPreset::ALL {
        let name = preset.display_name();
        assert!(
            !name.is_empty(),
            "Preset {:?} has empty display name",
            preset
        );
    }
}

#[test]
fn test_frame_interval_for_fps() {
    assert_eq!(frame_interval_for_fps(10), Duration::from_millis(100));
    // Zero is clamped to one frame per second
    assert_eq!(frame_interval_for_fps(0), Duration::from_secs(1));
}

#[test]
fn test_quality_gate_thresholds() {
    assert_eq!(quality_gates::MAX_CONNECTION_TIME, Duration::from_secs(10));
    assert_eq!(quality_gates::MAX_FIRST_FRAME_TIME, Duration::from_secs(5));
    assert_eq!(quality_gates::MIN_AVERAGE_FPS, 10.0);
    assert_eq!(quality_gates::MAX_PTZ_LATENCY, Duration::from_millis(500));
    assert_eq!(quality_gates::MAX_ERRORS, 0);
}
