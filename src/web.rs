//! HTTP surface: MJPEG feed, stats JSON, health, static assets

use crate::relay::{relay_stream, BOUNDARY};
use crate::slot::FrameSlot;
use axum::{
    body::Body,
    extract::State,
    http::header::{self, HeaderName},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, services::ServeDir};

/// Web server state
#[derive(Clone)]
pub struct AppState {
    pub slot: Arc<FrameSlot>,
    pub relay_interval: Duration,
    /// Flipped to true on process shutdown so open relay streams end and
    /// graceful shutdown can complete.
    pub shutdown: watch::Receiver<bool>,
}

/// Builds the application router. All cross-task state comes in through
/// `state`; the capture subsystem is constructed by the caller and only its
/// frame slot is visible here.
pub fn router(state: AppState, static_dir: &str) -> Router {
    Router::new()
        .route("/video_feed", get(video_feed_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// MJPEG stream handler: one relay loop per connection. The loop ends when
/// the client disconnects (detected no later than one relay tick after) or
/// when the server-side shutdown signal fires.
async fn video_feed_handler(State(state): State<AppState>) -> impl IntoResponse {
    let stream = relay_stream(
        Arc::clone(&state.slot),
        state.relay_interval,
        state.shutdown.clone(),
    );

    let headers: [(HeaderName, String); 3] = [
        (
            header::CONTENT_TYPE,
            format!("multipart/x-mixed-replace; boundary={BOUNDARY}"),
        ),
        (
            header::CACHE_CONTROL,
            "no-cache, no-store, must-revalidate".to_string(),
        ),
        (header::PRAGMA, "no-cache".to_string()),
    ];

    (headers, Body::from_stream(stream))
}

/// Stats API response
#[derive(Serialize)]
struct StatsResponse {
    fps: f64,
    resolution: String,
    camera: String,
}

/// Stats API handler: stateless snapshot of the frame slot
async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.slot.stats();

    Json(StatsResponse {
        fps: (stats.fps * 100.0).round() / 100.0,
        resolution: stats.resolution,
        camera: stats.camera,
    })
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check handler
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
