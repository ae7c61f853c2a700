// SPDX-License-Identifier: GPL-3.0-only

//! camera-link - connection, streaming and quality metrics for camera devices
//!
//! This library mediates between an application and a camera device, local
//! or reached through an external video SDK, behind one uniform lifecycle:
//! connect, stream, steer, disconnect.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Camera source trait, state machine and frame delivery
//! - [`bridge`]: Event and method channels to the external runtime
//! - [`engine`]: Owner of the boundary endpoints
//! - [`metrics`]: End-to-end quality metrics and gates
//! - [`scenario`]: Scripted acceptance run
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```no_run
//! use camera_link::backends::camera::{CameraSource, SimulatedCameraSource, SimulatedSettings};
//! use camera_link::metrics::MetricsCollector;
//! use camera_link::scenario::{ScenarioConfig, run_scenario};
//! use std::sync::Arc;
//!
//! # async fn demo() {
//! let collector = Arc::new(MetricsCollector::new());
//! let source = SimulatedCameraSource::new(SimulatedSettings::default(), Some(collector.clone()));
//! let metrics = run_scenario(&source, &collector, &ScenarioConfig::default(), None).await;
//! println!("{}", metrics.report());
//! # }
//! ```

pub mod backends;
pub mod bridge;
pub mod config;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod metrics;
pub mod scenario;

// Re-export commonly used types
pub use backends::camera::{
    CameraConnectionState, CameraSource, CameraSourceManager, CameraSourceType,
    SimulatedCameraSource, TransportCameraSource,
};
pub use bridge::EventBridge;
pub use config::Config;
pub use engine::EngineManager;
pub use errors::{AppError, CameraError, ChannelError};
pub use metrics::{E2EMetrics, MetricsCollector, QualityGates};
