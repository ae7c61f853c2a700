// SPDX-License-Identifier: GPL-3.0-only

//! E2E metrics record, quality gates and report rendering

use crate::constants::quality_gates as defaults;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Metrics of one collection session
#[derive(Debug, Clone, PartialEq, Default)]
pub struct E2EMetrics {
    /// Time to bring up the external runtime
    pub engine_init_time: Duration,
    /// Time to establish the camera connection
    pub connection_time: Duration,
    /// Time from connection to first video frame
    pub first_frame_time: Duration,
    /// Average frames per second, from inter-frame intervals
    pub average_fps: f64,
    /// Mean PTZ command round-trip
    pub ptz_latency: Duration,
    pub frame_count: u64,
    pub ptz_command_count: u64,
    pub error_count: u64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl E2EMetrics {
    /// Wall time between start and end (or now, while still running)
    pub fn test_duration(&self) -> Duration {
        let Some(start) = self.start_time else {
            return Duration::ZERO;
        };
        let end = self.end_time.unwrap_or_else(Utc::now);
        (end - start).to_std().unwrap_or(Duration::ZERO)
    }

    /// Check the default quality gates
    pub fn passed_all_quality_gates(&self) -> bool {
        QualityGates::default().passed(self)
    }

    /// JSON export of every field plus the gate verdict
    pub fn to_json(&self) -> serde_json::Value {
        self.to_json_with(&QualityGates::default())
    }

    /// JSON export judged against custom gates
    pub fn to_json_with(&self, gates: &QualityGates) -> serde_json::Value {
        let export = MetricsExport {
            engine_init_time: self.engine_init_time.as_secs_f64(),
            connection_time: self.connection_time.as_secs_f64(),
            first_frame_time: self.first_frame_time.as_secs_f64(),
            average_fps: self.average_fps,
            ptz_latency: self.ptz_latency.as_secs_f64(),
            frame_count: self.frame_count,
            ptz_command_count: self.ptz_command_count,
            error_count: self.error_count,
            test_duration: self.test_duration().as_secs_f64(),
            start_time: self.start_time.map(|t| t.to_rfc3339()),
            end_time: self.end_time.map(|t| t.to_rfc3339()),
            passed_all_gates: gates.passed(self),
        };
        serde_json::to_value(export).unwrap_or(serde_json::Value::Null)
    }

    /// Write the JSON export to `path`
    pub fn write_json_report(&self, path: &Path, gates: &QualityGates) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(&self.to_json_with(gates))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
    }

    /// Human-readable report judged against the default gates
    pub fn report(&self) -> String {
        self.report_with(&QualityGates::default())
    }

    /// Human-readable report judged against custom gates
    pub fn report_with(&self, gates: &QualityGates) -> String {
        let results = gates.evaluate(self);
        let mark = |ok: bool| if ok { "✓" } else { "✗" };
        let rule = "═══════════════════════════════════════";
        let thin = "─────────────────────────────────────────";

        let mut out = String::new();
        out.push_str(&format!("{}\n", rule));
        out.push_str("E2E Test Metrics Report\n");
        out.push_str(&format!("{}\n\n", rule));

        out.push_str("Performance Metrics:\n");
        out.push_str(&format!("{}\n", thin));
        out.push_str(&format!(
            "• Engine Init:    {:.2}s\n",
            self.engine_init_time.as_secs_f64()
        ));
        out.push_str(&format!(
            "• Connection:     {:.2}s\n",
            self.connection_time.as_secs_f64()
        ));
        out.push_str(&format!(
            "• First Frame:    {:.2}s\n",
            self.first_frame_time.as_secs_f64()
        ));
        out.push_str(&format!("• Average FPS:    {:.1}\n", self.average_fps));
        out.push_str(&format!(
            "• PTZ Latency:    {:.0}ms\n\n",
            self.ptz_latency.as_secs_f64() * 1000.0
        ));

        out.push_str("Statistics:\n");
        out.push_str(&format!("{}\n", thin));
        out.push_str(&format!("• Total Frames:   {}\n", self.frame_count));
        out.push_str(&format!("• PTZ Commands:   {}\n", self.ptz_command_count));
        out.push_str(&format!("• Errors:         {}\n", self.error_count));
        out.push_str(&format!(
            "• Test Duration:  {:.1}s\n\n",
            self.test_duration().as_secs_f64()
        ));

        out.push_str("Quality Gates:\n");
        out.push_str(&format!("{}\n", thin));
        out.push_str(&format!(
            "[{}] Connection < {}s\n",
            mark(results.connection),
            format_seconds(gates.max_connection_time)
        ));
        out.push_str(&format!(
            "[{}] First Frame < {}s\n",
            mark(results.first_frame),
            format_seconds(gates.max_first_frame_time)
        ));
        out.push_str(&format!(
            "[{}] FPS > {}\n",
            mark(results.frame_rate),
            gates.min_average_fps
        ));
        out.push_str(&format!(
            "[{}] PTZ Latency < {}ms\n",
            mark(results.ptz_latency),
            gates.max_ptz_latency.as_millis()
        ));
        if gates.max_errors == 0 {
            out.push_str(&format!("[{}] No Errors\n\n", mark(results.errors)));
        } else {
            out.push_str(&format!(
                "[{}] Errors <= {}\n\n",
                mark(results.errors),
                gates.max_errors
            ));
        }
        out.push_str(rule);
        out
    }
}

fn format_seconds(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs == secs.floor() {
        format!("{}", secs as u64)
    } else {
        format!("{:.1}", secs)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MetricsExport {
    engine_init_time: f64,
    connection_time: f64,
    first_frame_time: f64,
    #[serde(rename = "averageFPS")]
    average_fps: f64,
    ptz_latency: f64,
    frame_count: u64,
    ptz_command_count: u64,
    error_count: u64,
    test_duration: f64,
    start_time: Option<String>,
    end_time: Option<String>,
    passed_all_gates: bool,
}

/// Acceptance thresholds for an E2E run
///
/// Durations serialise as fractional seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityGates {
    #[serde(with = "secs_f64")]
    pub max_connection_time: Duration,
    #[serde(with = "secs_f64")]
    pub max_first_frame_time: Duration,
    pub min_average_fps: f64,
    #[serde(with = "secs_f64")]
    pub max_ptz_latency: Duration,
    pub max_errors: u64,
}

/// Per-gate verdicts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateResults {
    pub connection: bool,
    pub first_frame: bool,
    pub frame_rate: bool,
    pub ptz_latency: bool,
    pub errors: bool,
}

impl GateResults {
    pub fn all_passed(&self) -> bool {
        self.connection && self.first_frame && self.frame_rate && self.ptz_latency && self.errors
    }
}

impl QualityGates {
    /// Judge every gate separately
    pub fn evaluate(&self, metrics: &E2EMetrics) -> GateResults {
        GateResults {
            connection: metrics.connection_time < self.max_connection_time,
            first_frame: metrics.first_frame_time < self.max_first_frame_time,
            frame_rate: metrics.average_fps > self.min_average_fps,
            ptz_latency: metrics.ptz_latency < self.max_ptz_latency,
            errors: metrics.error_count <= self.max_errors,
        }
    }

    /// True iff every gate passes
    pub fn passed(&self, metrics: &E2EMetrics) -> bool {
        self.evaluate(metrics).all_passed()
    }
}

impl Default for QualityGates {
    fn default() -> Self {
        Self {
            max_connection_time: defaults::MAX_CONNECTION_TIME,
            max_first_frame_time: defaults::MAX_FIRST_FRAME_TIME,
            min_average_fps: defaults::MIN_AVERAGE_FPS,
            max_ptz_latency: defaults::MAX_PTZ_LATENCY,
            max_errors: defaults::MAX_ERRORS,
        }
    }
}

mod secs_f64 {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
