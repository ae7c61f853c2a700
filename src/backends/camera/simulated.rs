// SPDX-License-Identifier: GPL-3.0-only

//! Deterministic in-process camera source
//!
//! Connects after a configurable delay (or fails on request), produces
//! zeroed synthetic frames at a target rate, and answers PTZ commands after
//! a fixed delay. Used for tests and dry runs of the full pipeline.

use super::context::SourceContext;
use super::frame_loop::{FrameCallback, SyntheticFrames};
use super::state_machine::{ConnectAttempt, StateCallback};
use super::types::*;
use super::CameraSource;
use crate::constants::{frame_interval_for_fps, simulated};
use crate::errors::{CameraError, CameraResult};
use crate::metrics::MetricsCollector;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// Behaviour knobs of the simulated source
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedSettings {
    pub connection_delay: Duration,
    /// Fail every connect with `ConnectionFailed("Simulated failure")`
    pub should_fail_connection: bool,
    pub ptz_delay: Duration,
    pub target_fps: u32,
    pub frame_width: u32,
    pub frame_height: u32,
}

impl Default for SimulatedSettings {
    fn default() -> Self {
        Self {
            connection_delay: simulated::CONNECTION_DELAY,
            should_fail_connection: false,
            ptz_delay: simulated::PTZ_DELAY,
            target_fps: simulated::TARGET_FPS,
            frame_width: simulated::FRAME_WIDTH,
            frame_height: simulated::FRAME_HEIGHT,
        }
    }
}

/// Simulated camera source
pub struct SimulatedCameraSource {
    ctx: SourceContext,
    settings: Mutex<SimulatedSettings>,
}

impl SimulatedCameraSource {
    pub fn new(settings: SimulatedSettings, metrics: Option<Arc<MetricsCollector>>) -> Self {
        info!(
            fps = settings.target_fps,
            delay_ms = settings.connection_delay.as_millis() as u64,
            "Creating simulated camera source"
        );
        Self {
            ctx: SourceContext::new(CameraSourceType::Simulated, metrics),
            settings: Mutex::new(settings),
        }
    }

    /// Current settings snapshot
    pub fn settings(&self) -> SimulatedSettings {
        self.settings.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Replace the settings; a running stream keeps its frame rate until
    /// it is restarted
    pub fn set_settings(&self, settings: SimulatedSettings) {
        *self.settings.lock().unwrap_or_else(|e| e.into_inner()) = settings;
    }

    pub fn set_should_fail_connection(&self, fail: bool) {
        self.settings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .should_fail_connection = fail;
    }

    pub fn set_connection_delay(&self, delay: Duration) {
        self.settings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .connection_delay = delay;
    }

    async fn simulate_command(&self, what: &str) -> CameraResult<Duration> {
        self.ctx.require_connected()?;

        let started = Instant::now();
        tokio::time::sleep(self.settings().ptz_delay).await;
        let latency = started.elapsed();

        debug!(command = what, latency_ms = latency.as_millis() as u64, "Simulated command done");
        self.ctx.record_ptz(latency);
        Ok(latency)
    }
}

#[async_trait]
impl CameraSource for SimulatedCameraSource {
    fn source_type(&self) -> CameraSourceType {
        CameraSourceType::Simulated
    }

    fn connection_state(&self) -> CameraConnectionState {
        self.ctx.machine.state()
    }

    fn is_streaming(&self) -> bool {
        self.ctx.machine.is_streaming()
    }

    fn current_device_id(&self) -> Option<String> {
        self.ctx.machine.current_device_id()
    }

    fn on_frame(&self, callback: FrameCallback) {
        self.ctx.on_frame(callback);
    }

    fn on_state_changed(&self, callback: StateCallback) {
        self.ctx.on_state_changed(callback);
    }

    fn subscribe_states(&self) -> mpsc::UnboundedReceiver<CameraConnectionState> {
        self.ctx.subscribe_states()
    }

    fn watch_state(&self) -> watch::Receiver<CameraConnectionState> {
        self.ctx.watch_state()
    }

    fn subscribe_frames(&self) -> BoxStream<'static, VideoFrame> {
        self.ctx.subscribe_frames()
    }

    async fn connect(&self, device_id: &str) -> CameraResult<()> {
        let started = Instant::now();

        match self.ctx.machine.begin_connect(device_id) {
            Ok(ConnectAttempt::Proceed) => self.ctx.record_connection_started(started),
            Ok(ConnectAttempt::AlreadyConnected) => return Ok(()),
            Err(err) => return Err(self.ctx.surface(err)),
        }

        let settings = self.settings();
        tokio::time::sleep(settings.connection_delay).await;

        if settings.should_fail_connection {
            let err = self.ctx.machine.fail_connect(CameraError::ConnectionFailed(
                simulated::FAILURE_REASON.to_string(),
            ));
            return Err(self.ctx.surface(err));
        }

        if self
            .ctx
            .machine
            .complete_connect()
            .map_err(|e| self.ctx.surface(e))?
        {
            self.ctx.record_connection_completed();
        }
        Ok(())
    }

    async fn disconnect(&self) {
        self.ctx.stop_pipeline();
        self.ctx.machine.disconnect();
    }

    async fn start_stream(&self) -> CameraResult<()> {
        let settings = self.settings();
        let producer = SyntheticFrames::new(
            settings.frame_width,
            settings.frame_height,
            simulated::BYTES_PER_PIXEL,
        );
        self.ctx.start_pipeline(
            frame_interval_for_fps(settings.target_fps),
            Box::new(producer),
        )
    }

    async fn stop_stream(&self) {
        self.ctx.stop_pipeline();
    }

    async fn set_ptz(&self, direction: PtzDirection, speed: u32) -> CameraResult<Duration> {
        debug!(%direction, speed, "Simulated PTZ");
        self.simulate_command("ptz").await
    }

    async fn set_zoom(&self, direction: ZoomDirection, speed: u32) -> CameraResult<Duration> {
        debug!(%direction, speed, "Simulated zoom");
        self.simulate_command("zoom").await
    }

    async fn get_connection_status(&self) -> ConnectionStatus {
        self.ctx.status()
    }
}

impl std::fmt::Debug for SimulatedCameraSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedCameraSource")
            .field("ctx", &self.ctx)
            .field("settings", &self.settings())
            .finish()
    }
}
