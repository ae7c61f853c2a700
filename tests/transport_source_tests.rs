// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the SDK-backed camera source, driven through a fake host

use camera_link::backends::camera::{
    CameraConnectionState, CameraSource, PtzDirection, TransportCameraSource, VideoFrame,
    ZoomDirection,
};
use camera_link::bridge::{BoundaryMethod, BoundaryReply, MethodCall};
use camera_link::engine::{BoundaryHost, EngineManager};
use camera_link::errors::CameraError;
use camera_link::metrics::MetricsCollector;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

type Responder = Box<dyn Fn(&MethodCall) -> BoundaryReply + Send>;

struct Harness {
    _engine: EngineManager,
    source: TransportCameraSource,
    events: mpsc::UnboundedSender<Value>,
    calls: Arc<Mutex<Vec<(BoundaryMethod, Value)>>>,
    metrics: Arc<MetricsCollector>,
}

/// Bring an engine up and answer every method call with `respond`
fn harness(respond: Responder) -> Harness {
    let metrics = Arc::new(MetricsCollector::new());
    metrics.start();
    let engine = EngineManager::new(Some(Arc::clone(&metrics)));
    let bridge = engine.initialize().unwrap();
    let BoundaryHost {
        calls: mut incoming,
        events,
    } = engine.take_host().unwrap();

    let calls = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&calls);
    tokio::spawn(async move {
        while let Some(call) = incoming.recv().await {
            log.lock().unwrap().push((call.method, call.args.clone()));
            let reply = respond(&call);
            call.respond(reply);
        }
    });

    Harness {
        _engine: engine,
        source: TransportCameraSource::new(bridge, Some(Arc::clone(&metrics))),
        events,
        calls,
        metrics,
    }
}

fn always_ok() -> Responder {
    Box::new(|call| match call.method {
        BoundaryMethod::GetConnectionStatus => {
            BoundaryReply::Success(json!({"signal": "strong", "battery": 80}))
        }
        _ => BoundaryReply::Success(Value::Null),
    })
}

async fn wait_for_state(
    source: &TransportCameraSource,
    predicate: impl FnMut(&CameraConnectionState) -> bool,
) {
    let mut watch = source.watch_state();
    tokio::time::timeout(Duration::from_secs(1), watch.wait_for(predicate))
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_connect_sends_device_id_and_completes() {
    let h = harness(always_ok());

    h.source.connect("porch-cam").await.unwrap();

    assert!(h.source.connection_state().is_connected());
    assert_eq!(h.source.current_device_id().as_deref(), Some("porch-cam"));
    let calls = h.calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![(BoundaryMethod::Connect, json!({"deviceId": "porch-cam"}))]
    );
    assert!(h.metrics.metrics().engine_init_time > Duration::ZERO);
}

#[tokio::test]
async fn test_unimplemented_connect_fails_with_reason() {
    let h = harness(Box::new(|_| BoundaryReply::NotImplemented));

    let err = h.source.connect("porch-cam").await.unwrap_err();

    assert_eq!(
        err,
        CameraError::ConnectionFailed("Method not implemented: connect".into())
    );
    assert!(h.source.connection_state().is_error());
    assert_eq!(h.source.current_device_id(), None);
    assert_eq!(h.metrics.metrics().error_count, 1);
}

#[tokio::test]
async fn test_error_reply_without_message() {
    let h = harness(Box::new(|_| BoundaryReply::Error { message: None }));

    let err = h.source.connect("porch-cam").await.unwrap_err();

    assert_eq!(err, CameraError::ConnectionFailed("Unknown error".into()));
}

#[tokio::test]
async fn test_connected_event_after_reply_is_idempotent() {
    let h = harness(always_ok());
    let transitions = Arc::new(AtomicU32::new(0));
    {
        let transitions = Arc::clone(&transitions);
        h.source.on_state_changed(Box::new(move |_| {
            transitions.fetch_add(1, Ordering::SeqCst);
        }));
    }

    h.source.connect("porch-cam").await.unwrap();
    h.events
        .send(json!({"type": "connectionState", "state": "connected"}))
        .unwrap();
    h.events
        .send(json!({"type": "playerState", "state": "playing"}))
        .unwrap();

    // Wait until the bridge has processed both events
    tokio::time::timeout(Duration::from_secs(1), async {
        while h.source.get_connection_status().await.player_state.is_none() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    // Connecting, Connected
    assert_eq!(transitions.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_disconnected_event_tears_down_stream() {
    let h = harness(always_ok());
    h.source.connect("porch-cam").await.unwrap();
    h.source.start_stream().await.unwrap();
    assert!(h.source.is_streaming());

    h.events
        .send(json!({"type": "connectionState", "state": "disconnected"}))
        .unwrap();
    wait_for_state(&h.source, |s| *s == CameraConnectionState::Disconnected).await;

    assert!(!h.source.is_streaming());
    assert_eq!(h.source.current_device_id(), None);
}

#[tokio::test]
async fn test_failed_event_moves_to_error() {
    let h = harness(always_ok());
    h.source.connect("porch-cam").await.unwrap();

    h.events
        .send(json!({"type": "connectionState", "state": "failed"}))
        .unwrap();
    wait_for_state(&h.source, CameraConnectionState::is_error).await;

    assert_eq!(
        h.source.connection_state().error(),
        Some(&CameraError::ConnectionFailed("device reported failed".into()))
    );
}

#[tokio::test]
async fn test_error_event_is_recorded() {
    let h = harness(always_ok());
    h.source.connect("porch-cam").await.unwrap();

    h.events
        .send(json!({"type": "error", "message": "decoder stalled"}))
        .unwrap();

    tokio::time::timeout(Duration::from_secs(1), async {
        while h.source.last_remote_error().is_none() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    assert_eq!(h.source.last_remote_error().as_deref(), Some("decoder stalled"));
    assert_eq!(h.metrics.metrics().error_count, 1);
}

#[tokio::test]
async fn test_malformed_events_are_dropped() {
    let h = harness(always_ok());
    h.source.connect("porch-cam").await.unwrap();

    h.events.send(json!({"type": "battery", "level": 3})).unwrap();
    h.events.send(json!({"state": "disconnected"})).unwrap();
    h.events
        .send(json!({"type": "playerState", "state": "playing"}))
        .unwrap();

    tokio::time::timeout(Duration::from_secs(1), async {
        while h.source.get_connection_status().await.player_state.is_none() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    assert!(h.source.connection_state().is_connected());
}

#[tokio::test]
async fn test_pushed_frames_are_delivered_while_streaming() {
    let h = harness(always_ok());
    let delivered = Arc::new(AtomicU32::new(0));
    {
        let delivered = Arc::clone(&delivered);
        h.source.on_frame(Box::new(move |frame| {
            assert_eq!((frame.width, frame.height), (4, 2));
            delivered.fetch_add(1, Ordering::SeqCst);
        }));
    }

    // Not streaming yet
    assert!(!h.source.push_frame(VideoFrame::new(vec![0u8; 24], 4, 2)));

    h.source.connect("porch-cam").await.unwrap();
    h.source.start_stream().await.unwrap();
    assert!(h.source.push_frame(VideoFrame::new(vec![0u8; 24], 4, 2)));

    tokio::time::timeout(Duration::from_secs(1), async {
        while delivered.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    h.source.stop_stream().await;
    assert!(!h.source.push_frame(VideoFrame::new(vec![0u8; 24], 4, 2)));
    assert!(h.metrics.metrics().first_frame_time > Duration::ZERO);
}

#[tokio::test]
async fn test_ptz_and_zoom_are_forwarded() {
    let h = harness(always_ok());
    h.source.connect("porch-cam").await.unwrap();

    h.source.set_ptz(PtzDirection::Left, 5).await.unwrap();
    h.source.set_zoom(ZoomDirection::In, 3).await.unwrap();

    let calls = h.calls.lock().unwrap().clone();
    assert_eq!(
        calls[1],
        (
            BoundaryMethod::SetPtz,
            json!({"direction": "left", "speed": 5})
        )
    );
    assert_eq!(
        calls[2],
        (BoundaryMethod::SetZoom, json!({"direction": "in", "speed": 3}))
    );
    assert_eq!(h.metrics.metrics().ptz_command_count, 2);
}

#[tokio::test]
async fn test_ptz_requires_connection() {
    let h = harness(always_ok());

    assert_eq!(
        h.source.set_ptz(PtzDirection::Up, 5).await,
        Err(CameraError::NotConnected)
    );
    assert!(h.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_status_merges_remote_map() {
    let h = harness(always_ok());
    h.source.connect("porch-cam").await.unwrap();

    let status = h.source.get_connection_status().await;

    assert_eq!(status.state, "connected");
    assert_eq!(status.source_type, "transport");
    let remote = status.remote.unwrap();
    assert_eq!(remote["signal"], "strong");
    assert_eq!(remote["battery"], 80);
    assert_eq!(status.remote_error, None);
}

#[tokio::test]
async fn test_status_survives_unimplemented_remote() {
    let h = harness(Box::new(|call| match call.method {
        BoundaryMethod::GetConnectionStatus => BoundaryReply::NotImplemented,
        _ => BoundaryReply::Success(Value::Null),
    }));

    let status = h.source.get_connection_status().await;

    assert_eq!(status.state, "disconnected");
    assert!(status.remote.is_none());
    assert_eq!(
        status.remote_error.as_deref(),
        Some("Method not implemented: getConnectionStatus")
    );
}

#[tokio::test]
async fn test_disconnect_is_local_even_if_host_fails() {
    let h = harness(Box::new(|call| match call.method {
        BoundaryMethod::Disconnect => BoundaryReply::Error {
            message: Some("device busy".into()),
        },
        _ => BoundaryReply::Success(Value::Null),
    }));
    h.source.connect("porch-cam").await.unwrap();

    h.source.disconnect().await;

    assert_eq!(
        h.source.connection_state(),
        CameraConnectionState::Disconnected
    );
    assert_eq!(h.metrics.metrics().error_count, 1);
}
