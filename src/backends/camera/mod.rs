// SPDX-License-Identifier: GPL-3.0-only

//! Camera source abstraction
//!
//! Every device, whatever carries its video, goes through the same
//! lifecycle: connect, stream, steer, disconnect.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   Caller / CLI      │
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraSourceManager │  ← Active source, switching
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  CameraSource Trait │  ← Common interface
//! └──────────┬──────────┘
//!            │
//!      ┌─────┴──────┐
//!      ▼            ▼
//! ┌─────────┐ ┌───────────┐
//! │Simulated│ │ Transport │ ← EventBridge to the external SDK
//! └─────────┘ └───────────┘
//! ```

pub mod context;
pub mod frame_loop;
pub mod manager;
pub mod simulated;
pub mod state_machine;
pub mod transport;
pub mod types;

pub use frame_loop::{FrameCallback, FrameDeliveryPipeline, FrameFanout};
pub use manager::CameraSourceManager;
pub use simulated::{SimulatedCameraSource, SimulatedSettings};
pub use state_machine::{ConnectAttempt, ConnectionStateMachine, StateCallback};
pub use transport::TransportCameraSource;
pub use types::*;

use crate::bridge::EventBridge;
use crate::errors::{AppError, AppResult, CameraResult};
use crate::metrics::MetricsCollector;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Complete camera source trait
///
/// Implementations provide:
/// - Connection lifecycle driven by a [`ConnectionStateMachine`]
/// - Frame streaming through a [`FrameDeliveryPipeline`]
/// - Pan/tilt/zoom control with measured round-trip latency
/// - Observers for state changes and frames
#[async_trait]
pub trait CameraSource: Send + Sync {
    // ===== Metadata =====

    fn source_type(&self) -> CameraSourceType;

    fn connection_state(&self) -> CameraConnectionState;

    fn is_streaming(&self) -> bool;

    /// Device of the established connection, unset unless Connected
    fn current_device_id(&self) -> Option<String>;

    // ===== Observers =====

    /// Register a callback for every delivered frame
    fn on_frame(&self, callback: FrameCallback);

    /// Register a callback for every state change
    ///
    /// The callback may query this source, but must not connect, disconnect
    /// or register further callbacks from inside it.
    fn on_state_changed(&self, callback: StateCallback);

    /// Ordered stream of every subsequent state change
    fn subscribe_states(&self) -> mpsc::UnboundedReceiver<CameraConnectionState>;

    /// Latest-value view of the state
    fn watch_state(&self) -> watch::Receiver<CameraConnectionState>;

    /// Stream of delivered frames; a slow reader loses frames
    fn subscribe_frames(&self) -> BoxStream<'static, VideoFrame>;

    // ===== Lifecycle =====

    /// Connect to a device
    ///
    /// The state is Connecting before the first suspension point. On
    /// failure the state is `Error` and the error is returned.
    async fn connect(&self, device_id: &str) -> CameraResult<()>;

    /// Stop streaming and disconnect. Never fails.
    async fn disconnect(&self);

    // ===== Streaming =====

    /// Start frame delivery
    ///
    /// # Returns
    /// * `Ok(())` - Streaming (also if it already was)
    /// * `Err(CameraError::NotConnected)` - Source is not Connected
    async fn start_stream(&self) -> CameraResult<()>;

    /// Stop frame delivery, leaving the connection up
    async fn stop_stream(&self);

    // ===== Control =====

    /// Pan or tilt the camera, returning the command round-trip
    async fn set_ptz(&self, direction: PtzDirection, speed: u32) -> CameraResult<Duration>;

    /// Zoom the camera, returning the command round-trip
    async fn set_zoom(&self, direction: ZoomDirection, speed: u32) -> CameraResult<Duration>;

    /// Halt any pan/tilt motion
    async fn stop_ptz(&self) -> CameraResult<Duration> {
        self.set_ptz(PtzDirection::Stop, 0).await
    }

    /// Structured status of this source
    async fn get_connection_status(&self) -> ConnectionStatus;
}

/// Build a source of the given type
///
/// The transport source needs the bridge of an initialized engine.
pub fn create_source(
    source_type: CameraSourceType,
    settings: SimulatedSettings,
    metrics: Option<Arc<MetricsCollector>>,
    bridge: Option<Arc<EventBridge>>,
) -> AppResult<Arc<dyn CameraSource>> {
    match source_type {
        CameraSourceType::Simulated => Ok(Arc::new(SimulatedCameraSource::new(settings, metrics))),
        CameraSourceType::Transport => {
            let bridge = bridge.ok_or_else(|| {
                AppError::Config("transport source requires an initialized engine".to_string())
            })?;
            Ok(Arc::new(TransportCameraSource::new(bridge, metrics)))
        }
    }
}
