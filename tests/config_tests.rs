// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use camera_link::Config;
use camera_link::backends::camera::CameraSourceType;
use std::time::Duration;

fn temp_config_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir()
        .join(format!("camera-link-test-{}", uuid::Uuid::new_v4()))
        .join(name)
}

#[test]
fn test_config_default() {
    // Test that default config can be created
    let config = Config::default();

    // Check sensible defaults
    assert_eq!(config.source, CameraSourceType::Simulated);
    assert_eq!(config.log_filter, "warn");
    assert_eq!(config.simulated.target_fps, 15);
    assert!(
        !config.simulated.should_fail_connection,
        "Failure injection should be off by default"
    );
}

#[test]
fn test_missing_file_yields_defaults() {
    let path = temp_config_path("absent.json");
    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let path = temp_config_path("partial.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        r#"{"device_id": "porch", "simulated": {"target_fps": 30}, "source": "transport"}"#,
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();

    assert_eq!(config.device_id, "porch");
    assert_eq!(config.source, CameraSourceType::Transport);
    assert_eq!(config.simulated.target_fps, 30);
    assert_eq!(config.simulated.frame_width, 1920);
    assert_eq!(config.stream_duration_secs, 5);
}

#[test]
fn test_invalid_file_is_an_error() {
    let path = temp_config_path("broken.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();

    assert!(Config::load(Some(&path)).is_err());
}

#[test]
fn test_save_then_load() {
    let path = temp_config_path("saved.json");
    let mut config = Config::default();
    config.ptz_commands = 9;
    config.quality_gates.min_average_fps = 24.0;

    config.save(&path).unwrap();
    let loaded = Config::load(Some(&path)).unwrap();

    assert_eq!(loaded.ptz_commands, 9);
    assert_eq!(loaded.quality_gates.min_average_fps, 24.0);
}

#[test]
fn test_scenario_and_settings_conversion() {
    let mut config = Config::default();
    config.stream_duration_secs = 2;
    config.simulated.connection_delay_ms = 250;

    let scenario = config.scenario();
    assert_eq!(scenario.stream_duration, Duration::from_secs(2));
    assert_eq!(scenario.device_id, config.device_id);

    let settings = config.simulated.to_settings();
    assert_eq!(settings.connection_delay, Duration::from_millis(250));
}

#[test]
fn test_require_source() {
    let mut config = Config::default();
    assert!(config.require_source(CameraSourceType::Simulated).is_ok());

    config.source = CameraSourceType::Transport;
    let err = config
        .require_source(CameraSourceType::Simulated)
        .unwrap_err();
    assert!(err.to_string().contains("transport"));
}
