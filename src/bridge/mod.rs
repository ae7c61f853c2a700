// SPDX-License-Identifier: GPL-3.0-only

//! Event bridge to the external runtime
//!
//! The bridge is the only way in or out of the process boundary:
//!
//! - Inbound: raw JSON event maps are parsed into [`BoundaryEvent`]s and
//!   handed to every registered [`CameraEventHandler`]. Payloads that do not
//!   parse are logged, counted and dropped.
//! - Outbound: [`EventBridge::invoke`] forwards method calls over a
//!   [`MethodChannel`] and awaits the reply.

pub mod channel;
pub mod events;

pub use channel::{BoundaryMethod, BoundaryReply, MethodCall, MethodChannel};
pub use events::{BoundaryEvent, CameraEventHandler, EventParseError, KNOWN_EVENT_TYPES};

use crate::errors::ChannelResult;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Registration token returned by [`EventBridge::add_handler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

pub struct EventBridge {
    methods: MethodChannel,
    handlers: RwLock<Vec<(HandlerId, Arc<dyn CameraEventHandler>)>>,
    next_handler: AtomicU64,
    dropped: AtomicU64,
}

impl EventBridge {
    pub fn new(methods: MethodChannel) -> Self {
        Self {
            methods,
            handlers: RwLock::new(Vec::new()),
            next_handler: AtomicU64::new(1),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn methods(&self) -> &MethodChannel {
        &self.methods
    }

    pub fn add_handler(&self, handler: Arc<dyn CameraEventHandler>) -> HandlerId {
        let id = HandlerId(self.next_handler.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, handler));
        debug!(handler = id.0, "Event handler registered");
        id
    }

    /// Unregister a handler. Returns whether it was registered.
    pub fn remove_handler(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        before != handlers.len()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Inbound payloads dropped so far
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Parse and dispatch one raw event. Returns `false` if it was dropped.
    pub fn handle_event(&self, payload: &Value) -> bool {
        match BoundaryEvent::parse(payload) {
            Ok(event) => {
                self.dispatch(&event);
                true
            }
            Err(err) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, "Dropping boundary event");
                false
            }
        }
    }

    /// Hand a typed event to every registered handler
    pub fn dispatch(&self, event: &BoundaryEvent) {
        debug!(event = event.event_type(), "Received boundary event");

        // Snapshot so handlers may register or remove handlers themselves.
        let handlers: Vec<_> = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();

        for handler in handlers {
            event.dispatch(handler.as_ref());
        }
    }

    pub async fn invoke(&self, method: BoundaryMethod, args: Value) -> ChannelResult<Value> {
        self.methods.invoke(method, args).await
    }

    pub async fn invoke_map(
        &self,
        method: BoundaryMethod,
        args: Value,
    ) -> ChannelResult<Map<String, Value>> {
        self.methods.invoke_map(method, args).await
    }

    /// Consume inbound events until the sender side closes
    pub fn spawn_event_loop(
        self: &Arc<Self>,
        mut events: mpsc::UnboundedReceiver<Value>,
    ) -> JoinHandle<()> {
        let bridge = Arc::clone(self);
        tokio::spawn(async move {
            info!("Boundary event loop started");
            while let Some(payload) = events.recv().await {
                bridge.handle_event(&payload);
            }
            info!("Boundary event loop finished");
        })
    }
}

impl std::fmt::Debug for EventBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBridge")
            .field("channel", &self.methods.name())
            .field("handlers", &self.handler_count())
            .field("dropped", &self.dropped_events())
            .finish()
    }
}
