// SPDX-License-Identifier: GPL-3.0-only

//! Camera source backed by the external SDK
//!
//! Every command is proxied across the [`EventBridge`]; the device answers
//! with a method reply and, asynchronously, with events. Events drive the
//! same state machine as local commands:
//!
//! - `connectionState: connected` completes a pending attempt
//! - `connectionState: disconnected` tears the stream down
//! - `connectionState: error | failed` moves to `Error`
//!
//! Frames decoded by the SDK enter through [`TransportCameraSource::push_frame`]
//! into a bounded queue that the delivery loop drains.

use super::CameraSource;
use super::context::SourceContext;
use super::frame_loop::{FrameCallback, QueuedFrames};
use super::state_machine::{ConnectAttempt, StateCallback};
use super::types::*;
use crate::bridge::{BoundaryMethod, CameraEventHandler, EventBridge, HandlerId};
use crate::constants::{boundary, frame_interval_for_fps};
use crate::errors::{CameraError, CameraResult};
use crate::metrics::MetricsCollector;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// What the device last told us about itself
#[derive(Debug, Default)]
struct RemoteInfo {
    player_state: Option<String>,
    reported_fps: Option<f64>,
    device: Option<CameraDevice>,
    ptz: Option<PtzState>,
    last_error: Option<String>,
}

/// State reachable from both the source and the bridge's event handler
struct TransportShared {
    ctx: SourceContext,
    remote: Mutex<RemoteInfo>,
    frame_tx: mpsc::Sender<VideoFrame>,
    frame_rx: Arc<Mutex<mpsc::Receiver<VideoFrame>>>,
}

impl TransportShared {
    fn remote(&self) -> MutexGuard<'_, RemoteInfo> {
        self.remote.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stop the pipeline and discard frames queued for it
    fn stop_delivery(&self) {
        self.ctx.stop_pipeline();
        let mut queue = self.frame_rx.lock().unwrap_or_else(|e| e.into_inner());
        let mut discarded = 0usize;
        while queue.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!(discarded, "Dropped queued frames");
        }
    }

    fn device_failed(&self, state: &str) {
        let err = CameraError::ConnectionFailed(format!("device reported {}", state));

        if self.ctx.machine.state() == CameraConnectionState::Connecting {
            self.ctx.machine.fail_connect(err);
        } else {
            self.stop_delivery();
            self.ctx.machine.apply_remote_failure(err);
        }
        self.ctx.surface(CameraError::StreamError(state.to_string()));
    }
}

impl CameraEventHandler for TransportShared {
    fn on_connection_state_changed(&self, state: &str) {
        match state {
            "connected" => match self.ctx.machine.complete_connect() {
                Ok(true) => self.ctx.record_connection_completed(),
                Ok(false) => {}
                Err(err) => debug!(error = %err, "Ignoring connected event"),
            },
            "disconnected" => {
                self.stop_delivery();
                self.ctx.machine.disconnect();
            }
            "error" | "failed" => self.device_failed(state),
            "connecting" => debug!("Device reports connecting"),
            other => warn!(state = other, "Unknown connection state from device"),
        }
    }

    fn on_player_state_changed(&self, state: &str) {
        debug!(state, "Player state changed");
        self.remote().player_state = Some(state.to_string());
    }

    fn on_frame_rate_updated(&self, fps: f64) {
        self.remote().reported_fps = Some(fps);
    }

    fn on_error(&self, message: &str) {
        warn!(message, "Device reported error");
        self.remote().last_error = Some(message.to_string());
        self.ctx.surface(CameraError::StreamError(message.to_string()));
    }

    fn on_ptz_state_changed(&self, ptz: &PtzState) {
        self.remote().ptz = Some(ptz.clone());
    }

    fn on_device_info(&self, device: &CameraDevice) {
        info!(device_id = %device.id, name = %device.name, "Device info received");
        self.remote().device = Some(device.clone());
    }
}

/// Camera source that talks to the external SDK
pub struct TransportCameraSource {
    shared: Arc<TransportShared>,
    bridge: Arc<EventBridge>,
    handler_id: HandlerId,
}

impl TransportCameraSource {
    pub fn new(bridge: Arc<EventBridge>, metrics: Option<Arc<MetricsCollector>>) -> Self {
        let (frame_tx, frame_rx) = mpsc::channel(boundary::FRAME_QUEUE_CAPACITY);
        let shared = Arc::new(TransportShared {
            ctx: SourceContext::new(CameraSourceType::Transport, metrics),
            remote: Mutex::new(RemoteInfo::default()),
            frame_tx,
            frame_rx: Arc::new(Mutex::new(frame_rx)),
        });
        let handler_id = bridge.add_handler(shared.clone());

        info!(channel = %bridge.methods().name(), "Creating transport camera source");
        Self {
            shared,
            bridge,
            handler_id,
        }
    }

    fn ctx(&self) -> &SourceContext {
        &self.shared.ctx
    }

    /// Queue a frame decoded by the SDK.
    ///
    /// Returns `false` if the frame was dropped because the source is not
    /// streaming or the queue is full.
    pub fn push_frame(&self, frame: VideoFrame) -> bool {
        if !self.ctx().machine.is_streaming() {
            return false;
        }
        match self.shared.frame_tx.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Frame queue full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Last error message pushed by the device
    pub fn last_remote_error(&self) -> Option<String> {
        self.shared.remote().last_error.clone()
    }

    /// Failure the device reported while an attempt was in flight.
    ///
    /// The event path has already counted it.
    fn failed_by_device(&self) -> Option<CameraError> {
        self.ctx().machine.state().error().cloned()
    }

    async fn send_command(
        &self,
        method: BoundaryMethod,
        direction: &str,
        speed: u32,
    ) -> CameraResult<Duration> {
        self.ctx().require_connected()?;

        let started = Instant::now();
        self.bridge
            .invoke(method, json!({ "direction": direction, "speed": speed }))
            .await
            .map_err(|e| self.ctx().surface(e.into_stream_error()))?;
        let latency = started.elapsed();

        debug!(%method, direction, latency_ms = latency.as_millis() as u64, "Command acknowledged");
        self.ctx().record_ptz(latency);
        Ok(latency)
    }
}

#[async_trait]
impl CameraSource for TransportCameraSource {
    fn source_type(&self) -> CameraSourceType {
        CameraSourceType::Transport
    }

    fn connection_state(&self) -> CameraConnectionState {
        self.ctx().machine.state()
    }

    fn is_streaming(&self) -> bool {
        self.ctx().machine.is_streaming()
    }

    fn current_device_id(&self) -> Option<String> {
        self.ctx().machine.current_device_id()
    }

    fn on_frame(&self, callback: FrameCallback) {
        self.ctx().on_frame(callback);
    }

    fn on_state_changed(&self, callback: StateCallback) {
        self.ctx().on_state_changed(callback);
    }

    fn subscribe_states(&self) -> mpsc::UnboundedReceiver<CameraConnectionState> {
        self.ctx().subscribe_states()
    }

    fn watch_state(&self) -> watch::Receiver<CameraConnectionState> {
        self.ctx().watch_state()
    }

    fn subscribe_frames(&self) -> BoxStream<'static, VideoFrame> {
        self.ctx().subscribe_frames()
    }

    async fn connect(&self, device_id: &str) -> CameraResult<()> {
        let started = Instant::now();

        match self.ctx().machine.begin_connect(device_id) {
            Ok(ConnectAttempt::Proceed) => self.ctx().record_connection_started(started),
            Ok(ConnectAttempt::AlreadyConnected) => return Ok(()),
            Err(err) => return Err(self.ctx().surface(err)),
        }

        if let Err(err) = self
            .bridge
            .invoke(BoundaryMethod::Connect, json!({ "deviceId": device_id }))
            .await
        {
            if let Some(reported) = self.failed_by_device() {
                return Err(reported);
            }
            let err = self.ctx().machine.fail_connect(err.into_connection_error());
            return Err(self.ctx().surface(err));
        }

        match self.ctx().machine.complete_connect() {
            Ok(true) => self.ctx().record_connection_completed(),
            Ok(false) => {}
            Err(err) => {
                return Err(self
                    .failed_by_device()
                    .unwrap_or_else(|| self.ctx().surface(err)));
            }
        }
        Ok(())
    }

    async fn disconnect(&self) {
        self.shared.stop_delivery();
        self.ctx().machine.disconnect();

        if let Err(err) = self.bridge.invoke(BoundaryMethod::Disconnect, Value::Null).await {
            warn!(error = %err, "Boundary disconnect failed");
            self.ctx().surface(err.into_stream_error());
        }
    }

    async fn start_stream(&self) -> CameraResult<()> {
        let producer = QueuedFrames::new(Arc::clone(&self.shared.frame_rx));
        self.ctx().start_pipeline(
            frame_interval_for_fps(boundary::DELIVERY_FPS),
            Box::new(producer),
        )
    }

    async fn stop_stream(&self) {
        self.shared.stop_delivery();
    }

    async fn set_ptz(&self, direction: PtzDirection, speed: u32) -> CameraResult<Duration> {
        self.send_command(BoundaryMethod::SetPtz, direction.as_str(), speed).await
    }

    async fn set_zoom(&self, direction: ZoomDirection, speed: u32) -> CameraResult<Duration> {
        self.send_command(BoundaryMethod::SetZoom, direction.as_str(), speed).await
    }

    async fn get_connection_status(&self) -> ConnectionStatus {
        let mut status = self.ctx().status();
        {
            let remote = self.shared.remote();
            status.device = remote.device.clone();
            status.player_state = remote.player_state.clone();
            status.reported_fps = remote.reported_fps;
            status.ptz = remote.ptz.clone();
            if status.last_error.is_none() {
                status.last_error = remote.last_error.clone();
            }
        }

        match self
            .bridge
            .invoke_map(BoundaryMethod::GetConnectionStatus, Value::Null)
            .await
        {
            Ok(map) => status.remote = Some(map),
            Err(err) => {
                debug!(error = %err, "Boundary status unavailable");
                status.remote_error = Some(err.to_string());
            }
        }
        status
    }
}

impl Drop for TransportCameraSource {
    fn drop(&mut self) {
        self.bridge.remove_handler(self.handler_id);
        self.shared.stop_delivery();
    }
}

impl std::fmt::Debug for TransportCameraSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportCameraSource")
            .field("ctx", self.ctx())
            .field("bridge", &self.bridge)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{BoundaryReply, MethodChannel};
    use serde_json::json;

    fn source() -> (TransportCameraSource, Arc<EventBridge>) {
        let (methods, _rx) = MethodChannel::new("camera");
        let bridge = Arc::new(EventBridge::new(methods));
        (TransportCameraSource::new(Arc::clone(&bridge), None), bridge)
    }

    #[test]
    fn test_registers_and_removes_event_handler() {
        let (source, bridge) = source();
        assert_eq!(bridge.handler_count(), 1);
        drop(source);
        assert_eq!(bridge.handler_count(), 0);
    }

    #[test]
    fn test_device_events_update_remote_info() {
        let (source, bridge) = source();

        bridge.handle_event(&json!({"type": "frameRate", "fps": 12.5}));
        bridge.handle_event(&json!({"type": "error", "message": "decoder stalled"}));

        let remote = source.shared.remote();
        assert_eq!(remote.reported_fps, Some(12.5));
        assert_eq!(remote.last_error.as_deref(), Some("decoder stalled"));
    }

    #[tokio::test]
    async fn test_restart_does_not_replay_stale_frames() {
        let (source, _bridge) = source();
        source.ctx().machine.begin_connect("cam-1").unwrap();
        source.ctx().machine.complete_connect().unwrap();
        source.ctx().machine.activate_stream().unwrap();

        assert!(source.push_frame(VideoFrame::new(vec![0u8; 3], 1, 1)));
        source.stop_stream().await;

        let queue = source.shared.frame_rx.lock().unwrap();
        assert!(queue.is_empty());
    }

    #[test]
    fn test_frames_dropped_unless_streaming() {
        let (source, _bridge) = source();
        assert!(!source.push_frame(VideoFrame::new(vec![0u8; 3], 1, 1)));
    }

    #[tokio::test]
    async fn test_error_event_fails_pending_connect() {
        let (methods, mut calls) = MethodChannel::new("camera");
        let bridge = Arc::new(EventBridge::new(methods));
        let metrics = Arc::new(MetricsCollector::new());
        metrics.start();
        let source = Arc::new(TransportCameraSource::new(
            Arc::clone(&bridge),
            Some(Arc::clone(&metrics)),
        ));

        let connecting = Arc::clone(&source);
        let task = tokio::spawn(async move { connecting.connect("cam-1").await });

        let call = calls.recv().await.unwrap();
        assert_eq!(call.method, BoundaryMethod::Connect);
        bridge.handle_event(&json!({"type": "connectionState", "state": "failed"}));
        call.respond(BoundaryReply::Success(Value::Null));

        assert_eq!(
            task.await.unwrap(),
            Err(CameraError::ConnectionFailed("device reported failed".into()))
        );
        assert!(source.connection_state().is_error());
        assert_eq!(source.current_device_id(), None);
        assert_eq!(metrics.metrics().error_count, 1);
    }
}
