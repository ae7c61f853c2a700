// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end quality metrics
//!
//! A [`MetricsCollector`] is constructed once by the composition root and
//! shared (`Arc`) with every component that observes the session: the engine
//! manager, camera sources and the frame pipeline. Its lifecycle is explicit:
//!
//! - [`MetricsCollector::start`] begins a fresh session
//! - recorder calls accumulate while running and are ignored otherwise
//! - [`MetricsCollector::stop`] finalises the frame rate and end time
//! - [`MetricsCollector::reset`] returns to the zero-state
//!
//! All recorders go through one mutex, so concurrent calls from the state
//! machine and the frame task never lose updates.

pub mod report;

pub use report::{E2EMetrics, GateResults, QualityGates};

use chrono::Utc;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Default)]
struct CollectorState {
    metrics: E2EMetrics,
    running: bool,
    engine_init_recorded: bool,
    connection_started_at: Option<Instant>,
    first_frame_armed_at: Option<Instant>,
    last_frame_at: Option<Instant>,
    interval_sum: Duration,
    interval_count: u64,
}

/// Shared collector of E2E metrics
pub struct MetricsCollector {
    state: Mutex<CollectorState>,
    gates: QualityGates,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::with_gates(QualityGates::default())
    }

    /// Collector that judges sessions against custom thresholds
    pub fn with_gates(gates: QualityGates) -> Self {
        Self {
            state: Mutex::new(CollectorState::default()),
            gates,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CollectorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Thresholds used by [`MetricsCollector::passed_quality_gates`]
    pub fn gates(&self) -> &QualityGates {
        &self.gates
    }

    /// Start a fresh collection session
    pub fn start(&self) {
        let mut state = self.lock();
        *state = CollectorState::default();
        state.metrics.start_time = Some(Utc::now());
        state.running = true;
        info!("Metrics collection started");
    }

    /// Finish the session and return the final metrics.
    ///
    /// Stopping a collector that is not running returns the current
    /// snapshot unchanged.
    pub fn stop(&self) -> E2EMetrics {
        let mut state = self.lock();

        if !state.running {
            debug!("Metrics collection already stopped");
            return state.metrics.clone();
        }

        state.metrics.end_time = Some(Utc::now());
        state.metrics.average_fps = if state.interval_count == 0 {
            0.0
        } else {
            let mean = state.interval_sum.as_secs_f64() / state.interval_count as f64;
            if mean > 0.0 { 1.0 / mean } else { 0.0 }
        };
        state.running = false;

        info!(
            frames = state.metrics.frame_count,
            fps = state.metrics.average_fps,
            errors = state.metrics.error_count,
            "Metrics collection stopped"
        );
        info!("\n{}", state.metrics.report_with(&self.gates));

        state.metrics.clone()
    }

    /// Clear every accumulator and timer
    pub fn reset(&self) {
        *self.lock() = CollectorState::default();
        debug!("Metrics collector reset");
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Snapshot of the current metrics
    pub fn metrics(&self) -> E2EMetrics {
        self.lock().metrics.clone()
    }

    /// Judge the current snapshot against this collector's gates
    pub fn passed_quality_gates(&self) -> bool {
        self.gates.passed(&self.lock().metrics)
    }

    /// Record how long the external runtime took to come up (first call wins)
    pub fn record_engine_init(&self, duration: Duration) {
        let mut state = self.lock();
        if !state.running || state.engine_init_recorded {
            return;
        }
        state.metrics.engine_init_time = duration;
        state.engine_init_recorded = true;
        info!(seconds = duration.as_secs_f64(), "Engine init recorded");
    }

    pub fn connection_started(&self) {
        self.connection_started_at(Instant::now());
    }

    pub fn connection_started_at(&self, now: Instant) {
        let mut state = self.lock();
        if !state.running {
            return;
        }
        state.connection_started_at = Some(now);
    }

    pub fn connection_completed(&self) {
        self.connection_completed_at(Instant::now());
    }

    /// Close the connection timer and arm first-frame timing
    pub fn connection_completed_at(&self, now: Instant) {
        let mut state = self.lock();
        if !state.running {
            return;
        }
        let Some(started) = state.connection_started_at else {
            debug!("Connection completed without a recorded start");
            return;
        };
        state.metrics.connection_time = now.saturating_duration_since(started);
        state.first_frame_armed_at = Some(now);
        info!(
            seconds = state.metrics.connection_time.as_secs_f64(),
            "Connection time recorded"
        );
    }

    pub fn frame_received(&self) {
        self.frame_received_at(Instant::now());
    }

    pub fn frame_received_at(&self, now: Instant) {
        let mut state = self.lock();
        if !state.running {
            return;
        }

        if state.metrics.frame_count == 0
            && let Some(armed) = state.first_frame_armed_at
        {
            state.metrics.first_frame_time = now.saturating_duration_since(armed);
            info!(
                seconds = state.metrics.first_frame_time.as_secs_f64(),
                "First frame recorded"
            );
        }

        if let Some(last) = state.last_frame_at {
            state.interval_sum += now.saturating_duration_since(last);
            state.interval_count += 1;
        }

        state.last_frame_at = Some(now);
        state.metrics.frame_count += 1;
    }

    /// Fold one PTZ round-trip into the running mean
    pub fn ptz_command_sent(&self, latency: Duration) {
        let mut state = self.lock();
        if !state.running {
            return;
        }

        state.metrics.ptz_command_count += 1;
        let n = state.metrics.ptz_command_count as f64;
        let mean = (state.metrics.ptz_latency.as_secs_f64() * (n - 1.0) + latency.as_secs_f64()) / n;
        state.metrics.ptz_latency = Duration::try_from_secs_f64(mean).unwrap_or(Duration::MAX);
        debug!(latency_ms = latency.as_millis() as u64, "PTZ command recorded");
    }

    pub fn error_occurred(&self) {
        let mut state = self.lock();
        if !state.running {
            return;
        }
        state.metrics.error_count += 1;
        debug!(errors = state.metrics.error_count, "Error recorded");
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MetricsCollector")
            .field("running", &state.running)
            .field("metrics", &state.metrics)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_stop() {
        let collector = MetricsCollector::new();
        assert!(!collector.is_running());

        collector.start();
        assert!(collector.is_running());

        let metrics = collector.stop();
        assert!(!collector.is_running());
        assert!(metrics.end_time.is_some());
    }

    #[test]
    fn test_record_engine_init_once() {
        let collector = MetricsCollector::new();
        collector.start();

        collector.record_engine_init(Duration::from_secs_f64(1.5));
        collector.record_engine_init(Duration::from_secs_f64(3.0));

        assert_eq!(
            collector.metrics().engine_init_time,
            Duration::from_secs_f64(1.5)
        );
    }

    #[test]
    fn test_recorders_ignored_while_stopped() {
        let collector = MetricsCollector::new();
        collector.frame_received();
        collector.error_occurred();
        collector.ptz_command_sent(Duration::from_millis(100));

        assert_eq!(collector.metrics(), E2EMetrics::default());
    }

    #[test]
    fn test_connection_and_first_frame_timing() {
        let collector = MetricsCollector::new();
        collector.start();

        let t0 = Instant::now();
        collector.connection_started_at(t0);
        collector.connection_completed_at(t0 + Duration::from_millis(800));
        collector.frame_received_at(t0 + Duration::from_millis(1100));
        collector.frame_received_at(t0 + Duration::from_millis(1200));

        let metrics = collector.metrics();
        assert_eq!(metrics.connection_time, Duration::from_millis(800));
        assert_eq!(metrics.first_frame_time, Duration::from_millis(300));
        assert_eq!(metrics.frame_count, 2);
    }

    #[test]
    fn test_completion_without_start_is_ignored() {
        let collector = MetricsCollector::new();
        collector.start();
        collector.connection_completed();
        collector.frame_received();

        let metrics = collector.metrics();
        assert_eq!(metrics.connection_time, Duration::ZERO);
        assert_eq!(metrics.first_frame_time, Duration::ZERO);
    }

    #[test]
    fn test_average_fps_from_intervals() {
        let collector = MetricsCollector::new();
        collector.start();

        let t0 = Instant::now();
        for offset_ms in [0u64, 100, 200, 300] {
            collector.frame_received_at(t0 + Duration::from_millis(offset_ms));
        }

        let metrics = collector.stop();
        assert!((metrics.average_fps - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_frame_has_zero_fps() {
        let collector = MetricsCollector::new();
        collector.start();
        collector.frame_received();

        assert_eq!(collector.stop().average_fps, 0.0);
    }

    #[test]
    fn test_ptz_running_mean() {
        let collector = MetricsCollector::new();
        collector.start();

        collector.ptz_command_sent(Duration::from_secs_f64(0.1));
        collector.ptz_command_sent(Duration::from_secs_f64(0.2));

        let metrics = collector.metrics();
        assert!((metrics.ptz_latency.as_secs_f64() - 0.15).abs() < 0.01);
        assert_eq!(metrics.ptz_command_count, 2);
    }

    #[test]
    fn test_reset_returns_zero_state() {
        let collector = MetricsCollector::new();
        collector.start();
        collector.record_engine_init(Duration::from_secs(1));
        collector.connection_started();
        collector.connection_completed();
        collector.frame_received();
        collector.ptz_command_sent(Duration::from_millis(100));
        collector.error_occurred();

        collector.reset();

        assert_eq!(collector.metrics(), E2EMetrics::default());
        assert!(!collector.is_running());
    }

    #[test]
    fn test_start_clears_previous_session() {
        let collector = MetricsCollector::new();
        collector.start();
        collector.error_occurred();
        collector.stop();

        collector.start();
        assert_eq!(collector.metrics().error_count, 0);
    }
}
