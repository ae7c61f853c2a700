// SPDX-License-Identifier: GPL-3.0-only

//! Error types for camera sources, the boundary channel and the application

use std::fmt;

/// Result type alias for camera source operations
pub type CameraResult<T> = Result<T, CameraError>;

/// Result type alias for boundary channel calls
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Domain-level camera failures surfaced to callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// Connecting to the device failed
    ConnectionFailed(String),
    /// Operation requires an established connection
    NotConnected,
    /// Streaming or device control failed
    StreamError(String),
}

/// Failures of the request/response channel to the external runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The call could not be delivered or the far side reported an error
    Transport(String),
    /// The far side has no handler for the named operation
    NotImplemented(String),
    /// The far side replied with a payload of the wrong shape
    InvalidResponse,
}

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Camera source errors
    Camera(CameraError),
    /// Boundary channel errors
    Channel(ChannelError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

impl ChannelError {
    /// The bare message carried by this error, without the category prefix.
    ///
    /// Used as the `reason` when a channel failure is re-raised as a
    /// [`CameraError`].
    pub fn reason(&self) -> String {
        match self {
            ChannelError::Transport(message) => message.clone(),
            ChannelError::NotImplemented(_) | ChannelError::InvalidResponse => self.to_string(),
        }
    }

    /// Translate a failure that happened while connecting
    pub fn into_connection_error(self) -> CameraError {
        CameraError::ConnectionFailed(self.reason())
    }

    /// Translate a failure that happened while streaming or steering the device
    pub fn into_stream_error(self) -> CameraError {
        match self {
            ChannelError::Transport(message) => CameraError::StreamError(message),
            other @ (ChannelError::NotImplemented(_) | ChannelError::InvalidResponse) => {
                CameraError::StreamError(other.to_string())
            }
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::ConnectionFailed(reason) => write!(f, "Connection failed: {}", reason),
            CameraError::NotConnected => write!(f, "Not connected to camera"),
            CameraError::StreamError(reason) => write!(f, "Stream error: {}", reason),
        }
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::Transport(message) => write!(f, "Transport error: {}", message),
            ChannelError::NotImplemented(method) => write!(f, "Method not implemented: {}", method),
            ChannelError::InvalidResponse => write!(f, "Invalid response from boundary"),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Channel(e) => write!(f, "Channel error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for CameraError {}
impl std::error::Error for ChannelError {}
impl std::error::Error for AppError {}

impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Camera(err)
    }
}

impl From<ChannelError> for AppError {
    fn from(err: ChannelError) -> Self {
        AppError::Channel(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}
