// SPDX-License-Identifier: GPL-3.0-only
//! Frame delivery loop
//!
//! A [`FrameDeliveryPipeline`] runs one cooperative tokio task per source
//! that repeatedly takes a frame from a [`FrameProducer`], hands it to a
//! [`FrameSink`] and sleeps for one frame interval. The loop continues only
//! while the shared stream-active flag is set and its own generation is still
//! current, so a stopped stream delivers nothing once the in-flight interval
//! has elapsed. Starting while a loop is live is a no-op.

use super::types::VideoFrame;
use crate::constants::delivery;
use crate::metrics::MetricsCollector;
use futures::stream::BoxStream;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Receives every delivered frame
pub type FrameSink = Arc<dyn Fn(VideoFrame) + Send + Sync>;

/// Callback registered by a frame observer
pub type FrameCallback = Box<dyn Fn(&VideoFrame) + Send + Sync>;

/// Source of frames for the delivery loop
pub trait FrameProducer: Send + 'static {
    /// Next frame to deliver, or `None` to skip this tick
    fn next_frame(&mut self) -> Option<VideoFrame>;
}

/// Synthetic frames of a fixed size
///
/// All frames share one zeroed buffer; frames are immutable so sharing is
/// indistinguishable from fresh allocations.
pub struct SyntheticFrames {
    buffer: Arc<[u8]>,
    width: u32,
    height: u32,
}

impl SyntheticFrames {
    pub fn new(width: u32, height: u32, bytes_per_pixel: usize) -> Self {
        let len = width as usize * height as usize * bytes_per_pixel;
        Self {
            buffer: Arc::from(vec![0u8; len]),
            width,
            height,
        }
    }
}

impl FrameProducer for SyntheticFrames {
    fn next_frame(&mut self) -> Option<VideoFrame> {
        Some(VideoFrame::new(
            Arc::clone(&self.buffer),
            self.width,
            self.height,
        ))
    }
}

/// Frames pushed by the device into a bounded queue
///
/// Each tick forwards the newest queued frame and discards older ones, so a
/// slow consumer never falls behind the live picture.
pub struct QueuedFrames {
    receiver: Arc<Mutex<mpsc::Receiver<VideoFrame>>>,
}

impl QueuedFrames {
    pub fn new(receiver: Arc<Mutex<mpsc::Receiver<VideoFrame>>>) -> Self {
        Self { receiver }
    }
}

impl FrameProducer for QueuedFrames {
    fn next_frame(&mut self) -> Option<VideoFrame> {
        let mut receiver = self.receiver.lock().unwrap_or_else(|e| e.into_inner());
        let mut latest = None;
        while let Ok(frame) = receiver.try_recv() {
            latest = Some(frame);
        }
        latest
    }
}

/// Fan-out of delivered frames to callbacks, channel subscribers and metrics
#[derive(Default)]
pub struct FrameFanout {
    callbacks: Mutex<Vec<FrameCallback>>,
    subscribers: Mutex<Vec<mpsc::Sender<VideoFrame>>>,
    metrics: Option<Arc<MetricsCollector>>,
    delivered: AtomicU64,
}

impl FrameFanout {
    pub fn new(metrics: Option<Arc<MetricsCollector>>) -> Self {
        Self {
            metrics,
            ..Default::default()
        }
    }

    pub fn add_callback(&self, callback: FrameCallback) {
        lock(&self.callbacks).push(callback);
    }

    /// Channel of delivered frames. A subscriber that falls behind loses
    /// frames rather than stalling delivery.
    pub fn subscribe(&self) -> mpsc::Receiver<VideoFrame> {
        let (tx, rx) = mpsc::channel(delivery::SUBSCRIBER_CAPACITY);
        lock(&self.subscribers).push(tx);
        rx
    }

    /// Total frames delivered through this fan-out
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn dispatch(&self, frame: VideoFrame) {
        if let Some(metrics) = &self.metrics {
            metrics.frame_received();
        }

        let count = self.delivered.fetch_add(1, Ordering::Relaxed) + 1;
        if count % delivery::FRAME_LOG_INTERVAL == 0 {
            debug!(count, width = frame.width, height = frame.height, "Frames delivered");
        }

        for callback in lock(&self.callbacks).iter() {
            callback(&frame);
        }

        lock(&self.subscribers).retain(|tx| match tx.try_send(frame.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => true,
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    /// Sink closure for a delivery pipeline
    pub fn sink(self: &Arc<Self>) -> FrameSink {
        let fanout = Arc::clone(self);
        Arc::new(move |frame| fanout.dispatch(frame))
    }
}

/// Adapt a subscriber channel into a boxed frame stream
pub fn frame_stream(mut receiver: mpsc::Receiver<VideoFrame>) -> BoxStream<'static, VideoFrame> {
    Box::pin(async_stream::stream! {
        while let Some(frame) = receiver.recv().await {
            yield frame;
        }
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Single-flight periodic frame task
pub struct FrameDeliveryPipeline {
    /// Name for logging
    name: String,
    /// Stream-active flag shared with the connection state machine
    active: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl FrameDeliveryPipeline {
    pub fn new(name: &str, active: Arc<AtomicBool>) -> Self {
        Self {
            name: name.to_string(),
            active,
            generation: Arc::new(AtomicU64::new(0)),
            task: Mutex::new(None),
        }
    }

    /// Spawn the delivery loop.
    ///
    /// The caller sets the stream-active flag first. If a loop is still live
    /// this is a no-op and returns `false`. Must be called from within a
    /// tokio runtime.
    pub fn start(
        &self,
        interval: Duration,
        mut producer: Box<dyn FrameProducer>,
        sink: FrameSink,
    ) -> bool {
        let mut task = lock(&self.task);

        if task.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!(name = %self.name, "Frame loop already running");
            return false;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let current = Arc::clone(&self.generation);
        let active = Arc::clone(&self.active);
        let name = self.name.clone();

        info!(name = %self.name, interval_ms = interval.as_millis() as u64, "Starting frame loop");

        *task = Some(tokio::spawn(async move {
            let live = || {
                active.load(Ordering::SeqCst) && current.load(Ordering::SeqCst) == generation
            };

            while live() {
                let frame = producer.next_frame();
                if !live() {
                    break;
                }
                if let Some(frame) = frame {
                    sink(frame);
                }
                tokio::time::sleep(interval).await;
            }

            debug!(name = %name, generation, "Frame loop exiting");
        }));

        true
    }

    /// Check if the loop task is still alive
    pub fn is_running(&self) -> bool {
        lock(&self.task).as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Retire the current loop.
    ///
    /// The caller clears the stream-active flag; this also bumps the
    /// generation and aborts the task so it does not outlive its interval.
    pub fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = lock(&self.task).take() {
            debug!(name = %self.name, "Stopping frame loop");
            handle.abort();
        }
    }
}

impl Drop for FrameDeliveryPipeline {
    fn drop(&mut self) {
        if lock(&self.task).is_some() {
            warn!(name = %self.name, "Frame pipeline dropped while running, stopping loop");
            self.stop();
        }
    }
}

impl std::fmt::Debug for FrameDeliveryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameDeliveryPipeline")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}
