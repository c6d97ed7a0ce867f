//! End-to-end tests with a mock camera source

use bytes::Bytes;
use camera_dashboard::web::AppState;
use camera_dashboard::{web, CameraError, CameraSource, CaptureLoop, FrameSlot};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Camera source that can fail a configurable number of captures before
/// producing frames, and counts close calls.
struct MockCamera {
    failures_remaining: usize,
    captured: Arc<AtomicU64>,
    closed: Arc<AtomicU64>,
    counter: u64,
}

impl MockCamera {
    fn new(failures: usize) -> (Self, Arc<AtomicU64>, Arc<AtomicU64>) {
        let captured = Arc::new(AtomicU64::new(0));
        let closed = Arc::new(AtomicU64::new(0));
        let mock = Self {
            failures_remaining: failures,
            captured: Arc::clone(&captured),
            closed: Arc::clone(&closed),
            counter: 0,
        };
        (mock, captured, closed)
    }
}

impl CameraSource for MockCamera {
    fn capture_jpeg(&mut self) -> Result<Bytes, CameraError> {
        if self.failures_remaining > 0 {
            self.failures_remaining -= 1;
            return Err(CameraError::FrameTimeout);
        }

        self.counter += 1;
        self.captured.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::from(format!("jpeg-{}", self.counter)))
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

fn wait_for_frame(slot: &FrameSlot, timeout: Duration) -> Option<Bytes> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(frame) = slot.read() {
            return Some(frame);
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    None
}

#[test]
fn test_capture_loop_publishes_and_stops_once() {
    let (mock, captured, closed) = MockCamera::new(0);
    let slot = Arc::new(FrameSlot::new("1280x720".into(), "mock".into()));

    let mut loop_handle = CaptureLoop::spawn(Box::new(mock), Arc::clone(&slot));

    let frame = wait_for_frame(&slot, Duration::from_secs(2)).expect("frame published");
    assert!(frame.starts_with(b"jpeg-"));
    assert!(captured.load(Ordering::SeqCst) >= 1);

    loop_handle.stop();
    assert_eq!(closed.load(Ordering::SeqCst), 1, "source closed exactly once");

    // Second stop is a no-op
    loop_handle.stop();
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_capture_loop_survives_consecutive_failures() {
    // Twelve consecutive failures, then normal operation
    let (mock, captured, _closed) = MockCamera::new(12);
    let slot = Arc::new(FrameSlot::new("1280x720".into(), "mock".into()));

    let mut loop_handle = CaptureLoop::spawn(Box::new(mock), Arc::clone(&slot));

    // 12 retries at 100ms backoff each, then frames flow
    let frame = wait_for_frame(&slot, Duration::from_secs(5));
    assert!(frame.is_some(), "loop must resume publishing after failures");
    assert!(captured.load(Ordering::SeqCst) >= 1);

    loop_handle.stop();
}

#[test]
fn test_slot_always_holds_latest() {
    let (mock, captured, _closed) = MockCamera::new(0);
    let slot = Arc::new(FrameSlot::new("1280x720".into(), "mock".into()));

    let mut loop_handle = CaptureLoop::spawn(Box::new(mock), Arc::clone(&slot));

    // Let a few frames through, then verify the slot tracks the counter
    let deadline = Instant::now() + Duration::from_secs(2);
    while captured.load(Ordering::SeqCst) < 5 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    loop_handle.stop();

    let total = captured.load(Ordering::SeqCst);
    assert!(total >= 5);

    // After stop, the slot holds the very last published frame
    let frame = slot.read().expect("frame present");
    assert_eq!(&frame[..], format!("jpeg-{}", total).as_bytes());
}

async fn serve_app(slot: Arc<FrameSlot>) -> std::net::SocketAddr {
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let state = AppState {
        slot,
        relay_interval: Duration::from_millis(10),
        shutdown: shutdown_rx,
    };
    let app = web::router(state, "static");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        // Keep the shutdown sender alive for the lifetime of the server
        let _shutdown_tx = shutdown_tx;
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_stats_and_health_over_http() {
    let slot = Arc::new(FrameSlot::new("640x480".into(), "mock".into()));
    let addr = serve_app(slot).await;

    let stats: serde_json::Value = reqwest::get(format!("http://{}/stats", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(stats["fps"], 0.0);
    assert_eq!(stats["resolution"], "640x480");
    assert_eq!(stats["camera"], "mock");

    let health: serde_json::Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
}

#[tokio::test]
async fn test_video_feed_over_http() {
    let slot = Arc::new(FrameSlot::new("640x480".into(), "mock".into()));
    slot.publish(Bytes::from_static(b"\xFF\xD8mock-jpeg\xFF\xD9"));

    let addr = serve_app(slot).await;

    let mut response = reqwest::get(format!("http://{}/video_feed", addr))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "multipart/x-mixed-replace; boundary=frame"
    );

    // Collect enough of the body to cover one full part
    let mut body = Vec::new();
    while body.len() < 48 {
        match response.chunk().await.unwrap() {
            Some(chunk) => body.extend_from_slice(&chunk),
            None => break,
        }
    }

    let expected: &[u8] =
        b"--frame\r\nContent-Type: image/jpeg\r\n\r\n\xFF\xD8mock-jpeg\xFF\xD9\r\n";
    assert!(
        body.starts_with(expected),
        "body must begin with one exact multipart part"
    );
}

#[tokio::test]
async fn test_shutdown_completes_with_live_viewer() {
    let slot = Arc::new(FrameSlot::new("640x480".into(), "mock".into()));
    slot.publish(Bytes::from_static(b"\xFF\xD8mock-jpeg\xFF\xD9"));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let state = AppState {
        slot,
        relay_interval: Duration::from_millis(10),
        shutdown: shutdown_rx,
    };
    let app = web::router(state, "static");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Same wiring as the binary: the shutdown future both stops the
    // listener and ends every open relay stream.
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
                let _ = shutdown_tx.send(true);
            })
            .await
            .unwrap();
    });

    // Attach a viewer and make sure its stream is live
    let mut response = reqwest::get(format!("http://{}/video_feed", addr))
        .await
        .unwrap();
    let first = response.chunk().await.unwrap();
    assert!(first.is_some(), "viewer receives frames before shutdown");

    stop_tx.send(()).unwrap();

    // Graceful shutdown must finish even though the viewer never hung up
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("serve must resolve with a viewer still attached")
        .unwrap();
}
