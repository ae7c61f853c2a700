// SPDX-License-Identifier: GPL-3.0-only

//! Plumbing shared by every camera source variant
//!
//! Each source owns one [`SourceContext`]: its state machine, its frame
//! pipeline and fan-out, and an optional handle to the shared metrics
//! collector. The variants only add what differs between them (how they
//! connect, and where frames come from).

use super::frame_loop::{
    FrameCallback, FrameDeliveryPipeline, FrameFanout, FrameProducer, frame_stream,
};
use super::state_machine::{ConnectionStateMachine, StateCallback};
use super::types::{CameraConnectionState, CameraSourceType, ConnectionStatus, VideoFrame};
use crate::errors::{CameraError, CameraResult};
use crate::metrics::MetricsCollector;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::info;

pub struct SourceContext {
    source_type: CameraSourceType,
    pub(crate) machine: ConnectionStateMachine,
    pub(crate) pipeline: FrameDeliveryPipeline,
    pub(crate) fanout: Arc<FrameFanout>,
    pub(crate) metrics: Option<Arc<MetricsCollector>>,
}

impl SourceContext {
    pub fn new(source_type: CameraSourceType, metrics: Option<Arc<MetricsCollector>>) -> Self {
        let machine = ConnectionStateMachine::new();
        let pipeline = FrameDeliveryPipeline::new(&source_type.to_string(), machine.stream_flag());
        Self {
            source_type,
            machine,
            pipeline,
            fanout: Arc::new(FrameFanout::new(metrics.clone())),
            metrics,
        }
    }

    pub fn source_type(&self) -> CameraSourceType {
        self.source_type
    }

    /// Count `err` against the session and hand it back for propagation
    pub fn surface(&self, err: CameraError) -> CameraError {
        if let Some(metrics) = &self.metrics {
            metrics.error_occurred();
        }
        err
    }

    pub fn require_connected(&self) -> CameraResult<()> {
        if self.machine.state().is_connected() {
            Ok(())
        } else {
            Err(self.surface(CameraError::NotConnected))
        }
    }

    /// Start the connection timer at `started`, taken before the attempt began
    pub fn record_connection_started(&self, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.connection_started_at(started);
        }
    }

    pub fn record_connection_completed(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.connection_completed();
        }
    }

    pub fn record_ptz(&self, latency: Duration) {
        if let Some(metrics) = &self.metrics {
            metrics.ptz_command_sent(latency);
        }
    }

    /// Set the stream flag and launch the pipeline if it is not live yet
    pub fn start_pipeline(
        &self,
        interval: Duration,
        producer: Box<dyn FrameProducer>,
    ) -> CameraResult<()> {
        let newly_active = self.machine.activate_stream().map_err(|e| self.surface(e))?;

        if newly_active || !self.pipeline.is_running() {
            info!(source = %self.source_type, "Starting stream");
            self.pipeline.start(interval, producer, self.fanout.sink());
        }
        Ok(())
    }

    pub fn stop_pipeline(&self) {
        if self.machine.deactivate_stream() {
            info!(source = %self.source_type, "Stopping stream");
        }
        self.pipeline.stop();
    }

    /// Local part of the status record
    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus::from_state(
            &self.machine.state(),
            self.machine.is_streaming(),
            self.machine.current_device_id(),
            self.source_type,
        )
    }

    pub fn on_frame(&self, callback: FrameCallback) {
        self.fanout.add_callback(callback);
    }

    pub fn on_state_changed(&self, callback: StateCallback) {
        self.machine.on_state_changed(callback);
    }

    pub fn subscribe_states(&self) -> mpsc::UnboundedReceiver<CameraConnectionState> {
        self.machine.subscribe()
    }

    pub fn watch_state(&self) -> watch::Receiver<CameraConnectionState> {
        self.machine.watch()
    }

    pub fn subscribe_frames(&self) -> BoxStream<'static, VideoFrame> {
        frame_stream(self.fanout.subscribe())
    }
}

impl std::fmt::Debug for SourceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceContext")
            .field("source_type", &self.source_type)
            .field("machine", &self.machine)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}
