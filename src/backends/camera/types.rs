// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera source abstraction

//! Shared types for camera sources

use crate::errors::CameraError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// Connection state of a single camera source
#[derive(Debug, Clone, Default)]
pub enum CameraConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error(CameraError),
}

impl CameraConnectionState {
    /// Check if the source is connected
    pub fn is_connected(&self) -> bool {
        matches!(self, CameraConnectionState::Connected)
    }

    /// Check if the source is in an error state
    pub fn is_error(&self) -> bool {
        matches!(self, CameraConnectionState::Error(_))
    }

    /// Short lowercase label, as used on the boundary
    pub fn label(&self) -> &'static str {
        match self {
            CameraConnectionState::Disconnected => "disconnected",
            CameraConnectionState::Connecting => "connecting",
            CameraConnectionState::Connected => "connected",
            CameraConnectionState::Error(_) => "error",
        }
    }

    /// The error carried by an `Error` state
    pub fn error(&self) -> Option<&CameraError> {
        match self {
            CameraConnectionState::Error(err) => Some(err),
            _ => None,
        }
    }
}

// Error states are equal when their messages are, regardless of the cause data.
impl PartialEq for CameraConnectionState {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CameraConnectionState::Disconnected, CameraConnectionState::Disconnected)
            | (CameraConnectionState::Connecting, CameraConnectionState::Connecting)
            | (CameraConnectionState::Connected, CameraConnectionState::Connected) => true,
            (CameraConnectionState::Error(lhs), CameraConnectionState::Error(rhs)) => {
                lhs.to_string() == rhs.to_string()
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for CameraConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraConnectionState::Error(err) => write!(f, "error ({})", err),
            other => write!(f, "{}", other.label()),
        }
    }
}

/// Camera source type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CameraSourceType {
    /// Deterministic in-process source for tests and dry runs
    #[default]
    Simulated,
    /// Source backed by the external SDK across the event bridge
    Transport,
}

impl std::fmt::Display for CameraSourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraSourceType::Simulated => write!(f, "simulated"),
            CameraSourceType::Transport => write!(f, "transport"),
        }
    }
}

impl FromStr for CameraSourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simulated" | "mock" => Ok(CameraSourceType::Simulated),
            "transport" | "remote" => Ok(CameraSourceType::Transport),
            other => Err(format!("Unknown source type: {}", other)),
        }
    }
}

/// Where a camera physically lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraType {
    /// Built-in device camera
    Local,
    /// External IP camera reached through the SDK
    External,
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraDevice {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub camera_type: CameraType,
    pub ip_address: Option<String>,
}

impl CameraDevice {
    pub fn new(id: impl Into<String>, name: impl Into<String>, camera_type: CameraType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            camera_type,
            ip_address: None,
        }
    }

    pub fn with_ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }
}

/// A single video frame
///
/// The pixel buffer is shared, so cloning a frame for several subscribers
/// never copies pixel data. Frames are never mutated after creation.
#[derive(Clone)]
pub struct VideoFrame {
    pub data: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    /// Wall-clock time the frame was produced
    pub timestamp: DateTime<Utc>,
}

impl VideoFrame {
    pub fn new(data: impl Into<Arc<[u8]>>, width: u32, height: u32) -> Self {
        Self::with_timestamp(data, width, height, Utc::now())
    }

    pub fn with_timestamp(
        data: impl Into<Arc<[u8]>>,
        width: u32,
        height: u32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            timestamp,
        }
    }

    /// Get the length of the frame data in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the frame data is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl std::fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// Pan/tilt direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PtzDirection {
    Up,
    Down,
    Left,
    Right,
    Stop,
}

impl PtzDirection {
    pub const ALL: [PtzDirection; 5] = [
        PtzDirection::Up,
        PtzDirection::Down,
        PtzDirection::Left,
        PtzDirection::Right,
        PtzDirection::Stop,
    ];

    /// Wire name used on the boundary
    pub fn as_str(&self) -> &'static str {
        match self {
            PtzDirection::Up => "up",
            PtzDirection::Down => "down",
            PtzDirection::Left => "left",
            PtzDirection::Right => "right",
            PtzDirection::Stop => "stop",
        }
    }
}

impl std::fmt::Display for PtzDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PtzDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PtzDirection::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown PTZ direction: {}", s))
    }
}

/// Zoom direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoomDirection {
    In,
    Out,
    Stop,
}

impl ZoomDirection {
    /// Wire name used on the boundary
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoomDirection::In => "in",
            ZoomDirection::Out => "out",
            ZoomDirection::Stop => "stop",
        }
    }
}

impl std::fmt::Display for ZoomDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ZoomDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in" => Ok(ZoomDirection::In),
            "out" => Ok(ZoomDirection::Out),
            "stop" => Ok(ZoomDirection::Stop),
            other => Err(format!("Unknown zoom direction: {}", other)),
        }
    }
}

/// PTZ motion as last reported by the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PtzState {
    pub direction: String,
    pub speed: u32,
    pub is_moving: bool,
}

/// Structured connection status of a source
///
/// Mirrors the state machine plus whatever the device has told us about
/// itself. Serialises to a camelCase JSON map.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub state: String,
    pub is_connected: bool,
    pub is_streaming: bool,
    pub device_id: Option<String>,
    pub source_type: String,
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<CameraDevice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported_fps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ptz: Option<PtzState>,
    /// Status map returned by the boundary, if it was asked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_error: Option<String>,
}

impl ConnectionStatus {
    /// Build the local part of the status from a state snapshot
    pub fn from_state(
        state: &CameraConnectionState,
        is_streaming: bool,
        device_id: Option<String>,
        source_type: CameraSourceType,
    ) -> Self {
        Self {
            state: state.label().to_string(),
            is_connected: state.is_connected(),
            is_streaming,
            device_id,
            source_type: source_type.to_string(),
            last_error: state.error().map(|e| e.to_string()),
            ..Default::default()
        }
    }

    /// Render as a JSON object map
    pub fn to_map(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }
}
