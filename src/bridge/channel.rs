// SPDX-License-Identifier: GPL-3.0-only

//! Outbound request/response channel to the external runtime
//!
//! Each [`MethodChannel::invoke`] sends a [`MethodCall`] carrying a oneshot
//! reply slot to whoever hosts the external side. The call resolves exactly
//! once: with the reply, or with a transport error if the host goes away.

use crate::errors::{ChannelError, ChannelResult};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Operations understood by the external runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundaryMethod {
    Connect,
    Disconnect,
    SetPtz,
    SetZoom,
    GetConnectionStatus,
}

impl BoundaryMethod {
    pub const ALL: [BoundaryMethod; 5] = [
        BoundaryMethod::Connect,
        BoundaryMethod::Disconnect,
        BoundaryMethod::SetPtz,
        BoundaryMethod::SetZoom,
        BoundaryMethod::GetConnectionStatus,
    ];

    /// Wire name of the method
    pub fn as_str(&self) -> &'static str {
        match self {
            BoundaryMethod::Connect => "connect",
            BoundaryMethod::Disconnect => "disconnect",
            BoundaryMethod::SetPtz => "setPTZ",
            BoundaryMethod::SetZoom => "setZoom",
            BoundaryMethod::GetConnectionStatus => "getConnectionStatus",
        }
    }
}

impl std::fmt::Display for BoundaryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reply from the external side
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryReply {
    Success(Value),
    /// No handler registered for the method
    NotImplemented,
    Error { message: Option<String> },
}

/// One pending call, as seen by the host
#[derive(Debug)]
pub struct MethodCall {
    pub method: BoundaryMethod,
    pub args: Value,
    reply: oneshot::Sender<BoundaryReply>,
}

impl MethodCall {
    /// Resolve the call. Returns `false` if the caller stopped waiting.
    pub fn respond(self, reply: BoundaryReply) -> bool {
        self.reply.send(reply).is_ok()
    }
}

/// Caller side of the method channel
#[derive(Debug, Clone)]
pub struct MethodChannel {
    name: String,
    calls: mpsc::UnboundedSender<MethodCall>,
}

impl MethodChannel {
    /// Create a channel and the receiver the host answers from
    pub fn new(name: &str) -> (Self, mpsc::UnboundedReceiver<MethodCall>) {
        let (calls, rx) = mpsc::unbounded_channel();
        (
            Self {
                name: name.to_string(),
                calls,
            },
            rx,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the host side is still listening
    pub fn is_open(&self) -> bool {
        !self.calls.is_closed()
    }

    /// Invoke `method` and wait for its reply
    pub async fn invoke(&self, method: BoundaryMethod, args: Value) -> ChannelResult<Value> {
        let (reply_tx, reply_rx) = oneshot::channel();
        debug!(channel = %self.name, %method, "Invoking boundary method");

        self.calls
            .send(MethodCall {
                method,
                args,
                reply: reply_tx,
            })
            .map_err(|_| {
                warn!(channel = %self.name, %method, "Boundary host is gone");
                ChannelError::Transport("boundary host is not listening".to_string())
            })?;

        let reply = reply_rx.await.map_err(|_| {
            warn!(channel = %self.name, %method, "Boundary call dropped without reply");
            ChannelError::Transport("call dropped without reply".to_string())
        })?;

        match reply {
            BoundaryReply::Success(value) => Ok(value),
            BoundaryReply::NotImplemented => {
                Err(ChannelError::NotImplemented(method.as_str().to_string()))
            }
            BoundaryReply::Error { message } => Err(ChannelError::Transport(
                message.unwrap_or_else(|| "Unknown error".to_string()),
            )),
        }
    }

    /// Invoke `method` expecting a map (or nothing) back
    pub async fn invoke_map(
        &self,
        method: BoundaryMethod,
        args: Value,
    ) -> ChannelResult<Map<String, Value>> {
        match self.invoke(method, args).await? {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Map::new()),
            other => {
                warn!(%method, reply = %other, "Unexpected reply shape");
                Err(ChannelError::InvalidResponse)
            }
        }
    }
}
