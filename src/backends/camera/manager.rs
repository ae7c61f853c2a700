// SPDX-License-Identifier: GPL-3.0-only

//! Camera source lifecycle manager
//!
//! The manager provides:
//! - Ownership of the active source
//! - Switching between source types
//! - Thread-safe access for callers that only hold the manager

use super::types::*;
use super::{CameraSource, SimulatedSettings, create_source};
use crate::bridge::EventBridge;
use crate::errors::AppResult;
use crate::metrics::MetricsCollector;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

/// Internal manager state
struct ManagerState {
    /// The active source
    source: Arc<dyn CameraSource>,
    source_type: CameraSourceType,
}

/// Camera source manager
///
/// Cheap to clone; every clone refers to the same active source.
#[derive(Clone)]
pub struct CameraSourceManager {
    state: Arc<Mutex<ManagerState>>,
    settings: SimulatedSettings,
    metrics: Option<Arc<MetricsCollector>>,
    bridge: Option<Arc<EventBridge>>,
}

impl CameraSourceManager {
    /// Create a manager with an initial source
    ///
    /// # Arguments
    /// * `source_type` - Type of the initial source
    /// * `settings` - Settings used whenever a simulated source is built
    /// * `metrics` - Collector shared with every source
    /// * `bridge` - Bridge of the engine, required for transport sources
    pub fn new(
        source_type: CameraSourceType,
        settings: SimulatedSettings,
        metrics: Option<Arc<MetricsCollector>>,
        bridge: Option<Arc<EventBridge>>,
    ) -> AppResult<Self> {
        info!(source = %source_type, "Creating camera source manager");

        let source = create_source(source_type, settings.clone(), metrics.clone(), bridge.clone())?;

        Ok(Self {
            state: Arc::new(Mutex::new(ManagerState {
                source,
                source_type,
            })),
            settings,
            metrics,
            bridge,
        })
    }

    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn source_type(&self) -> CameraSourceType {
        self.lock().source_type
    }

    /// Handle to the active source
    pub fn source(&self) -> Arc<dyn CameraSource> {
        Arc::clone(&self.lock().source)
    }

    pub fn connection_state(&self) -> CameraConnectionState {
        self.source().connection_state()
    }

    /// Change source type
    ///
    /// The current source is disconnected before the new one takes over.
    /// The new source starts Disconnected.
    pub async fn change_source(&self, new_source_type: CameraSourceType) -> AppResult<()> {
        let old = self.source();
        info!(old = %old.source_type(), new = %new_source_type, "Changing source");

        let new_source = create_source(
            new_source_type,
            self.settings.clone(),
            self.metrics.clone(),
            self.bridge.clone(),
        )?;

        old.disconnect().await;

        let mut state = self.lock();
        state.source = new_source;
        state.source_type = new_source_type;

        info!("Source changed successfully");
        Ok(())
    }

    /// Disconnect the active source
    pub async fn shutdown(&self) {
        info!("Shutting down camera source");
        self.source().disconnect().await;
    }
}

impl std::fmt::Debug for CameraSourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("CameraSourceManager")
            .field("source_type", &state.source_type)
            .field("state", &state.source.connection_state())
            .finish()
    }
}
