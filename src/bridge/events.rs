// SPDX-License-Identifier: GPL-3.0-only

//! Inbound events from the external runtime

use crate::backends::camera::types::{CameraDevice, CameraType, PtzState};
use crate::constants::boundary::EVENT_TYPE_KEY;
use serde::Deserialize;
use serde_json::Value;

/// Event discriminators understood by [`BoundaryEvent::parse`]
pub const KNOWN_EVENT_TYPES: [&str; 6] = [
    "connectionState",
    "playerState",
    "frameRate",
    "error",
    "ptzState",
    "deviceInfo",
];

/// A typed inbound event
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BoundaryEvent {
    ConnectionState {
        state: String,
    },
    PlayerState {
        state: String,
    },
    FrameRate {
        fps: f64,
    },
    Error {
        message: String,
    },
    PtzState {
        direction: String,
        speed: u32,
        is_moving: bool,
    },
    DeviceInfo {
        device_id: String,
        device_name: String,
        #[serde(default)]
        ip_address: Option<String>,
    },
}

/// Why an inbound payload was dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventParseError {
    /// No string `type` field
    MissingType,
    UnknownType(String),
    /// Known type with fields of the wrong shape
    Malformed { event_type: String, reason: String },
}

impl std::fmt::Display for EventParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventParseError::MissingType => write!(f, "Event missing type"),
            EventParseError::UnknownType(t) => write!(f, "Unknown event type: {}", t),
            EventParseError::Malformed { event_type, reason } => {
                write!(f, "Malformed {} event: {}", event_type, reason)
            }
        }
    }
}

impl std::error::Error for EventParseError {}

impl BoundaryEvent {
    /// Parse a raw event map
    pub fn parse(payload: &Value) -> Result<Self, EventParseError> {
        let event_type = payload
            .get(EVENT_TYPE_KEY)
            .and_then(Value::as_str)
            .ok_or(EventParseError::MissingType)?;

        if !KNOWN_EVENT_TYPES.contains(&event_type) {
            return Err(EventParseError::UnknownType(event_type.to_string()));
        }

        BoundaryEvent::deserialize(payload).map_err(|e| EventParseError::Malformed {
            event_type: event_type.to_string(),
            reason: e.to_string(),
        })
    }

    /// Wire discriminator of this event
    pub fn event_type(&self) -> &'static str {
        match self {
            BoundaryEvent::ConnectionState { .. } => "connectionState",
            BoundaryEvent::PlayerState { .. } => "playerState",
            BoundaryEvent::FrameRate { .. } => "frameRate",
            BoundaryEvent::Error { .. } => "error",
            BoundaryEvent::PtzState { .. } => "ptzState",
            BoundaryEvent::DeviceInfo { .. } => "deviceInfo",
        }
    }

    /// Route this event to the matching handler method
    pub fn dispatch(&self, handler: &dyn CameraEventHandler) {
        match self {
            BoundaryEvent::ConnectionState { state } => handler.on_connection_state_changed(state),
            BoundaryEvent::PlayerState { state } => handler.on_player_state_changed(state),
            BoundaryEvent::FrameRate { fps } => handler.on_frame_rate_updated(*fps),
            BoundaryEvent::Error { message } => handler.on_error(message),
            BoundaryEvent::PtzState {
                direction,
                speed,
                is_moving,
            } => handler.on_ptz_state_changed(&PtzState {
                direction: direction.clone(),
                speed: *speed,
                is_moving: *is_moving,
            }),
            BoundaryEvent::DeviceInfo {
                device_id,
                device_name,
                ip_address,
            } => {
                let mut device =
                    CameraDevice::new(device_id.clone(), device_name.clone(), CameraType::External);
                device.ip_address = ip_address.clone();
                handler.on_device_info(&device);
            }
        }
    }
}

/// Receiver of typed boundary events
///
/// Every method defaults to ignoring the event.
pub trait CameraEventHandler: Send + Sync {
    fn on_connection_state_changed(&self, _state: &str) {}

    fn on_player_state_changed(&self, _state: &str) {}

    fn on_frame_rate_updated(&self, _fps: f64) {}

    fn on_error(&self, _message: &str) {}

    fn on_ptz_state_changed(&self, _ptz: &PtzState) {}

    fn on_device_info(&self, _device: &CameraDevice) {}
}
