//! Camera dashboard server binary

use anyhow::Result;
use camera_dashboard::config::Config;
use camera_dashboard::web::AppState;
use camera_dashboard::{camera, web, CaptureLoop, FrameSlot};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "camera-dashboard")]
#[command(about = "Live MJPEG camera dashboard server")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt().with_env_filter(filter).with_target(false).init();

    info!("Camera dashboard starting");

    let config = if Path::new(&cli.config).exists() {
        info!(config_path = %cli.config, "Loading configuration");
        Config::load(&cli.config)?
    } else {
        info!(config_path = %cli.config, "No config file, using defaults");
        Config::default()
    };

    // Opening the camera is fatal on failure; there is nothing to serve
    // without a source.
    let source = camera::open_source(&config.camera)?;

    let slot = Arc::new(FrameSlot::new(
        config.camera.resolution(),
        source.name().to_string(),
    ));

    // Relay streams watch this flag so open viewer connections end on
    // shutdown instead of keeping graceful shutdown waiting forever.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let state = AppState {
        slot: Arc::clone(&slot),
        relay_interval: Duration::from_millis(config.stream.relay_interval_ms),
        shutdown: shutdown_rx,
    };
    let app = web::router(state, &config.server.static_dir);

    let addr = format!("{}:{}", config.server.bind_ip, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP server listening");
    info!("Video feed: http://{}/video_feed", addr);
    info!("Stats: http://{}/stats", addr);

    // Two-phase startup: capture begins only once the listener is ready.
    let mut capture = CaptureLoop::spawn(source, slot);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            let _ = shutdown_tx.send(true);
        })
        .await?;

    // Two-phase teardown: stop the loop, which closes the source.
    info!("Shutting down");
    capture.stop();

    Ok(())
}
