// SPDX-License-Identifier: GPL-3.0-only

//! Connection state machine for a single camera source
//!
//! ```text
//!                 begin_connect
//!  Disconnected ────────────────► Connecting ──complete_connect──► Connected
//!       ▲  ▲                          │                               │
//!       │  └──────── disconnect ──────┼───────────────────────────────┘
//!       │                             │ fail_connect
//!       │                             ▼
//!       └──────── disconnect ───── Error(kind) ◄── apply_remote_failure
//! ```
//!
//! The new state is stored, published on the watch channel and sent to
//! ordered subscribers under the state lock. Callbacks run afterwards, with
//! the state lock released but the notification lock still held. That lock
//! is taken before the state lock by every transition, so callbacks see
//! transitions in the order they happened and never a coalesced one (the
//! watch channel aside, which only keeps the latest value by nature).
//!
//! Callbacks may read the machine (or the source owning it). They must not
//! trigger a transition or register another callback.

use super::types::CameraConnectionState;
use crate::errors::{CameraError, CameraResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Callback invoked on every state change
pub type StateCallback = Box<dyn Fn(&CameraConnectionState) + Send + Sync>;

/// Outcome of [`ConnectionStateMachine::begin_connect`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectAttempt {
    /// State moved to Connecting; the caller performs the connection work
    Proceed,
    /// Already connected to the requested device; nothing to do
    AlreadyConnected,
}

struct Inner {
    state: CameraConnectionState,
    device_id: Option<String>,
    pending_device_id: Option<String>,
    subscribers: Vec<mpsc::UnboundedSender<CameraConnectionState>>,
}

/// Single-writer owner of one source's connection state
pub struct ConnectionStateMachine {
    inner: Mutex<Inner>,
    /// Registered callbacks; held across delivery to serialise it
    callbacks: Mutex<Vec<StateCallback>>,
    watch_tx: watch::Sender<CameraConnectionState>,
    streaming: Arc<AtomicBool>,
}

impl ConnectionStateMachine {
    pub fn new() -> Self {
        let (watch_tx, _) = watch::channel(CameraConnectionState::Disconnected);
        Self {
            inner: Mutex::new(Inner {
                state: CameraConnectionState::Disconnected,
                device_id: None,
                pending_device_id: None,
                subscribers: Vec::new(),
            }),
            callbacks: Mutex::new(Vec::new()),
            watch_tx,
            streaming: Arc::new(AtomicBool::new(false)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Notification lock; always taken before the state lock
    fn callbacks(&self) -> MutexGuard<'_, Vec<StateCallback>> {
        self.callbacks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current state snapshot
    pub fn state(&self) -> CameraConnectionState {
        self.lock().state.clone()
    }

    /// Device of the established connection, if any
    pub fn current_device_id(&self) -> Option<String> {
        self.lock().device_id.clone()
    }

    /// Whether the stream-active flag is set
    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }

    /// Shared stream-active flag, read by the frame delivery pipeline
    pub fn stream_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.streaming)
    }

    /// Register a callback invoked after every state change
    pub fn on_state_changed(&self, callback: StateCallback) {
        self.callbacks().push(callback);
    }

    /// Latest-value observable of the state
    pub fn watch(&self) -> watch::Receiver<CameraConnectionState> {
        self.watch_tx.subscribe()
    }

    /// Ordered stream of every subsequent state change
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<CameraConnectionState> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(tx);
        rx
    }

    /// Start a connection attempt to `device_id`.
    ///
    /// Disconnected and Error move to Connecting. A second attempt while
    /// Connecting, or while Connected to another device, is rejected and the
    /// state is left untouched.
    pub fn begin_connect(&self, device_id: &str) -> CameraResult<ConnectAttempt> {
        let callbacks = self.callbacks();
        let mut inner = self.lock();

        match inner.state.clone() {
            CameraConnectionState::Connecting => {
                let pending = inner.pending_device_id.clone().unwrap_or_default();
                warn!(device_id, pending = %pending, "Connect rejected, attempt in progress");
                Err(CameraError::ConnectionFailed(format!(
                    "already connecting to {}",
                    pending
                )))
            }
            CameraConnectionState::Connected => {
                if inner.device_id.as_deref() == Some(device_id) {
                    debug!(device_id, "Already connected to requested device");
                    Ok(ConnectAttempt::AlreadyConnected)
                } else {
                    let current = inner.device_id.clone().unwrap_or_default();
                    warn!(device_id, current = %current, "Connect rejected, already connected");
                    Err(CameraError::ConnectionFailed(format!(
                        "already connected to {}",
                        current
                    )))
                }
            }
            CameraConnectionState::Disconnected | CameraConnectionState::Error(_) => {
                info!(device_id, "Connecting");
                inner.pending_device_id = Some(device_id.to_string());
                inner.device_id = None;
                let state = self.transition(&mut inner, CameraConnectionState::Connecting);
                drop(inner);
                notify(&callbacks, &state);
                Ok(ConnectAttempt::Proceed)
            }
        }
    }

    /// Finish the pending attempt successfully.
    ///
    /// Returns `Ok(true)` when this call made the transition. Completing an
    /// attempt that is already Connected is a no-op returning `Ok(false)`, so
    /// a reply and an event reporting the same connection do not emit twice.
    /// Fails if the attempt was cancelled meanwhile (a disconnect or a remote
    /// failure moved the state away from Connecting).
    pub fn complete_connect(&self) -> CameraResult<bool> {
        let callbacks = self.callbacks();
        let mut inner = self.lock();

        match inner.state.clone() {
            CameraConnectionState::Connecting => {
                inner.device_id = inner.pending_device_id.take();
                info!(device_id = ?inner.device_id, "Connected");
                let state = self.transition(&mut inner, CameraConnectionState::Connected);
                drop(inner);
                notify(&callbacks, &state);
                Ok(true)
            }
            CameraConnectionState::Connected => Ok(false),
            other => {
                debug!(state = %other, "Connect completion arrived after cancellation");
                Err(CameraError::ConnectionFailed(
                    "connection attempt cancelled".to_string(),
                ))
            }
        }
    }

    /// Fail the pending attempt, moving to `Error(err)`.
    ///
    /// The error is handed back so the caller can re-raise it. If the
    /// attempt was already cancelled the state is left alone.
    pub fn fail_connect(&self, err: CameraError) -> CameraError {
        let callbacks = self.callbacks();
        let mut inner = self.lock();

        if matches!(inner.state, CameraConnectionState::Connecting) {
            warn!(error = %err, "Connection failed");
            inner.pending_device_id = None;
            inner.device_id = None;
            let state = self.transition(&mut inner, CameraConnectionState::Error(err.clone()));
            drop(inner);
            notify(&callbacks, &state);
        }

        err
    }

    /// Move to `Error(err)` from any state, e.g. when the device reports a
    /// failure on its own.
    pub fn apply_remote_failure(&self, err: CameraError) {
        let callbacks = self.callbacks();
        let mut inner = self.lock();

        if inner.state == CameraConnectionState::Error(err.clone()) {
            return;
        }

        warn!(error = %err, "Device reported failure");
        inner.pending_device_id = None;
        inner.device_id = None;
        let state = self.transition(&mut inner, CameraConnectionState::Error(err));
        drop(inner);
        notify(&callbacks, &state);
    }

    /// Move to Disconnected from any state. Always succeeds.
    pub fn disconnect(&self) {
        let callbacks = self.callbacks();
        let mut inner = self.lock();

        self.streaming.store(false, Ordering::SeqCst);
        inner.pending_device_id = None;
        inner.device_id = None;

        if matches!(inner.state, CameraConnectionState::Disconnected) {
            return;
        }

        info!("Disconnected");
        let state = self.transition(&mut inner, CameraConnectionState::Disconnected);
        drop(inner);
        notify(&callbacks, &state);
    }

    /// Set the stream-active flag.
    ///
    /// Returns `Ok(true)` if streaming was newly activated and `Ok(false)` if
    /// it was already active.
    pub fn activate_stream(&self) -> CameraResult<bool> {
        let inner = self.lock();

        if !inner.state.is_connected() {
            return Err(CameraError::NotConnected);
        }

        Ok(!self.streaming.swap(true, Ordering::SeqCst))
    }

    /// Clear the stream-active flag. Returns whether it was set.
    pub fn deactivate_stream(&self) -> bool {
        let _inner = self.lock();
        self.streaming.swap(false, Ordering::SeqCst)
    }

    /// Store and publish `new_state`; callbacks are left to the caller
    fn transition(
        &self,
        inner: &mut Inner,
        new_state: CameraConnectionState,
    ) -> CameraConnectionState {
        if inner.state.is_connected() && !new_state.is_connected() {
            self.streaming.store(false, Ordering::SeqCst);
        }

        debug!(from = %inner.state, to = %new_state, "State transition");
        inner.state = new_state;

        let published = inner.state.clone();
        self.watch_tx.send_replace(published.clone());
        inner
            .subscribers
            .retain(|tx| tx.send(published.clone()).is_ok());
        published
    }
}

fn notify(callbacks: &[StateCallback], state: &CameraConnectionState) {
    for callback in callbacks {
        callback(state);
    }
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("ConnectionStateMachine")
            .field("state", &inner.state)
            .field("device_id", &inner.device_id)
            .field("streaming", &self.is_streaming())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorded(machine: &ConnectionStateMachine) -> Arc<Mutex<Vec<CameraConnectionState>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        machine.on_state_changed(Box::new(move |state| {
            sink.lock().unwrap().push(state.clone());
        }));
        seen
    }

    #[test]
    fn test_successful_connect_sequence() {
        let machine = ConnectionStateMachine::new();
        let seen = recorded(&machine);

        assert_eq!(machine.begin_connect("cam-1"), Ok(ConnectAttempt::Proceed));
        assert_eq!(machine.current_device_id(), None);
        machine.complete_connect().unwrap();

        assert_eq!(machine.current_device_id().as_deref(), Some("cam-1"));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                CameraConnectionState::Connecting,
                CameraConnectionState::Connected
            ]
        );
    }

    #[test]
    fn test_failed_connect_clears_device() {
        let machine = ConnectionStateMachine::new();
        machine.begin_connect("cam-1").unwrap();

        let err = machine.fail_connect(CameraError::ConnectionFailed("timeout".into()));

        assert_eq!(err, CameraError::ConnectionFailed("timeout".into()));
        assert!(machine.state().is_error());
        assert_eq!(machine.current_device_id(), None);
    }

    #[test]
    fn test_reconnect_from_error() {
        let machine = ConnectionStateMachine::new();
        machine.begin_connect("cam-1").unwrap();
        machine.fail_connect(CameraError::ConnectionFailed("timeout".into()));

        assert_eq!(machine.begin_connect("cam-1"), Ok(ConnectAttempt::Proceed));
        machine.complete_connect().unwrap();
        assert!(machine.state().is_connected());
    }

    #[test]
    fn test_connect_while_connecting_is_rejected() {
        let machine = ConnectionStateMachine::new();
        machine.begin_connect("cam-1").unwrap();

        let err = machine.begin_connect("cam-2").unwrap_err();
        assert_eq!(
            err,
            CameraError::ConnectionFailed("already connecting to cam-1".into())
        );
        assert_eq!(machine.state(), CameraConnectionState::Connecting);

        machine.complete_connect().unwrap();
        assert_eq!(machine.current_device_id().as_deref(), Some("cam-1"));
    }

    #[test]
    fn test_connect_to_other_device_while_connected_is_rejected() {
        let machine = ConnectionStateMachine::new();
        machine.begin_connect("cam-1").unwrap();
        assert_eq!(machine.complete_connect(), Ok(true));
        assert_eq!(machine.complete_connect(), Ok(false));

        assert_eq!(
            machine.begin_connect("cam-1"),
            Ok(ConnectAttempt::AlreadyConnected)
        );
        assert!(machine.begin_connect("cam-2").is_err());
        assert_eq!(machine.current_device_id().as_deref(), Some("cam-1"));
        assert!(machine.state().is_connected());
    }

    #[test]
    fn test_disconnect_cancels_pending_attempt() {
        let machine = ConnectionStateMachine::new();
        machine.begin_connect("cam-1").unwrap();
        machine.disconnect();

        assert!(machine.complete_connect().is_err());
        assert_eq!(machine.state(), CameraConnectionState::Disconnected);
        assert_eq!(machine.current_device_id(), None);
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let machine = ConnectionStateMachine::new();
        let seen = recorded(&machine);

        machine.disconnect();
        machine.disconnect();
        assert!(seen.lock().unwrap().is_empty());

        machine.begin_connect("cam-1").unwrap();
        machine.complete_connect().unwrap();
        machine.disconnect();
        machine.disconnect();
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_stream_requires_connection() {
        let machine = ConnectionStateMachine::new();
        assert_eq!(machine.activate_stream(), Err(CameraError::NotConnected));

        machine.begin_connect("cam-1").unwrap();
        machine.complete_connect().unwrap();
        assert_eq!(machine.activate_stream(), Ok(true));
        assert_eq!(machine.activate_stream(), Ok(false));
        assert!(machine.is_streaming());
    }

    #[test]
    fn test_leaving_connected_stops_streaming() {
        let machine = ConnectionStateMachine::new();
        machine.begin_connect("cam-1").unwrap();
        machine.complete_connect().unwrap();
        machine.activate_stream().unwrap();

        machine.apply_remote_failure(CameraError::ConnectionFailed("peer lost".into()));

        assert!(!machine.is_streaming());
        assert!(machine.state().is_error());
        assert_eq!(machine.current_device_id(), None);
    }

    #[test]
    fn test_callbacks_can_read_the_machine() {
        let machine = Arc::new(ConnectionStateMachine::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let reader = Arc::downgrade(&machine);
            let sink = Arc::clone(&seen);
            machine.on_state_changed(Box::new(move |state| {
                if let Some(machine) = reader.upgrade() {
                    assert_eq!(machine.state(), *state);
                    sink.lock()
                        .unwrap()
                        .push((state.clone(), machine.current_device_id()));
                }
            }));
        }

        machine.begin_connect("cam-1").unwrap();
        machine.complete_connect().unwrap();
        machine.disconnect();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (CameraConnectionState::Connecting, None),
                (CameraConnectionState::Connected, Some("cam-1".to_string())),
                (CameraConnectionState::Disconnected, None),
            ]
        );
    }

    #[test]
    fn test_subscribers_see_every_transition_in_order() {
        let machine = ConnectionStateMachine::new();
        let mut rx = machine.subscribe();
        let watch = machine.watch();

        machine.begin_connect("cam-1").unwrap();
        machine.complete_connect().unwrap();
        machine.disconnect();

        assert_eq!(rx.try_recv().unwrap(), CameraConnectionState::Connecting);
        assert_eq!(rx.try_recv().unwrap(), CameraConnectionState::Connected);
        assert_eq!(rx.try_recv().unwrap(), CameraConnectionState::Disconnected);
        assert!(rx.try_recv().is_err());
        assert_eq!(*watch.borrow(), CameraConnectionState::Disconnected);
    }
}
