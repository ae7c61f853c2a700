// SPDX-License-Identifier: GPL-3.0-only

//! Owner of the boundary endpoints
//!
//! The [`EngineManager`] stands in for the embedded runtime that hosts the
//! external SDK. It creates the method channel and the inbound event
//! channel, wraps them in an [`EventBridge`] and hands the far ends to
//! whoever hosts the external side through [`EngineManager::take_host`].

use crate::bridge::{EventBridge, MethodCall, MethodChannel};
use crate::constants::boundary;
use crate::errors::{AppError, AppResult};
use crate::metrics::MetricsCollector;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Far ends of the boundary, held by the external runtime adapter
#[derive(Debug)]
pub struct BoundaryHost {
    /// Method calls to answer
    pub calls: mpsc::UnboundedReceiver<MethodCall>,
    /// Where to push raw event maps
    pub events: mpsc::UnboundedSender<Value>,
}

#[derive(Default)]
struct EngineState {
    bridge: Option<Arc<EventBridge>>,
    host: Option<BoundaryHost>,
    event_loop: Option<JoinHandle<()>>,
}

pub struct EngineManager {
    state: Mutex<EngineState>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl EngineManager {
    pub fn new(metrics: Option<Arc<MetricsCollector>>) -> Self {
        Self {
            state: Mutex::new(EngineState::default()),
            metrics,
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Bring the boundary up, or return the existing bridge.
    ///
    /// Must be called from within a tokio runtime.
    pub fn initialize(&self) -> AppResult<Arc<EventBridge>> {
        let mut state = self.lock();

        if let Some(bridge) = &state.bridge {
            debug!("Engine already initialized");
            return Ok(Arc::clone(bridge));
        }

        let started = Instant::now();
        tokio::runtime::Handle::try_current()
            .map_err(|e| AppError::Other(format!("Engine needs an async runtime: {}", e)))?;

        let (methods, calls) = MethodChannel::new(boundary::METHOD_CHANNEL);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let bridge = Arc::new(EventBridge::new(methods));

        let event_loop = bridge.spawn_event_loop(events_rx);

        state.bridge = Some(Arc::clone(&bridge));
        state.host = Some(BoundaryHost {
            calls,
            events: events_tx,
        });
        state.event_loop = Some(event_loop);

        let elapsed = started.elapsed();
        if let Some(metrics) = &self.metrics {
            metrics.record_engine_init(elapsed);
        }
        info!(
            methods = boundary::METHOD_CHANNEL,
            events = boundary::EVENT_CHANNEL,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "Engine initialized"
        );

        Ok(bridge)
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().bridge.is_some()
    }

    /// Bridge of the running engine
    pub fn bridge(&self) -> Option<Arc<EventBridge>> {
        self.lock().bridge.clone()
    }

    /// Hand the far ends of the boundary to the runtime adapter.
    ///
    /// Available once per initialization.
    pub fn take_host(&self) -> Option<BoundaryHost> {
        self.lock().host.take()
    }

    /// Tear the boundary down. Safe to call when not initialized.
    pub fn destroy(&self) {
        let mut state = self.lock();

        if state.bridge.is_none() {
            return;
        }

        if let Some(event_loop) = state.event_loop.take() {
            event_loop.abort();
        }
        *state = EngineState::default();
        info!("Engine destroyed");
    }
}

impl Drop for EngineManager {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for EngineManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("EngineManager")
            .field("initialized", &state.bridge.is_some())
            .field("host_taken", &(state.bridge.is_some() && state.host.is_none()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_requires_runtime() {
        let engine = EngineManager::new(None);
        assert!(engine.initialize().is_err());
        assert!(!engine.is_initialized());
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let engine = EngineManager::new(None);

        let first = engine.initialize().unwrap();
        let second = engine.initialize().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(engine.take_host().is_some());
        assert!(engine.take_host().is_none());
    }

    #[tokio::test]
    async fn test_engine_init_time_recorded_once() {
        let metrics = Arc::new(MetricsCollector::new());
        metrics.start();
        let engine = EngineManager::new(Some(Arc::clone(&metrics)));

        engine.initialize().unwrap();
        let recorded = metrics.metrics().engine_init_time;
        engine.initialize().unwrap();

        assert_eq!(metrics.metrics().engine_init_time, recorded);
    }

    #[tokio::test]
    async fn test_destroy_closes_boundary() {
        let engine = EngineManager::new(None);
        engine.initialize().unwrap();
        let host = engine.take_host().unwrap();

        engine.destroy();
        engine.destroy();

        assert!(!engine.is_initialized());
        assert!(engine.bridge().is_none());

        let mut closed = false;
        for _ in 0..50 {
            if host.events.is_closed() {
                closed = true;
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(closed);
    }
}
