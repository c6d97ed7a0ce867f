//! Background capture loop driving the camera source

use crate::camera::CameraSource;
use crate::slot::FrameSlot;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Pause after a failed capture before retrying. Transient device hiccups
/// recover here without tearing the stream down.
const FAILURE_BACKOFF: Duration = Duration::from_millis(100);

/// Courtesy yield between successful captures so the thread never starves
/// the rest of the process on constrained hosts.
const CAPTURE_YIELD: Duration = Duration::from_millis(1);

/// Minimum elapsed time before fps is recomputed.
const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Handle to the single background capture thread.
///
/// The thread exclusively owns the camera source; everyone else reaches the
/// frames through the [`FrameSlot`]. [`CaptureLoop::stop`] is idempotent and
/// waits for the in-flight capture to finish before closing the source.
pub struct CaptureLoop {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureLoop {
    /// Starts the capture thread. Call only after the HTTP listener is
    /// ready to accept connections.
    pub fn spawn(source: Box<dyn CameraSource>, slot: Arc<FrameSlot>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let handle = std::thread::spawn(move || run(source, slot, stop_flag));
        info!("Capture loop started");

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Signals the loop to exit, joins the thread, and lets it close the
    /// source exactly once. A second call is a no-op.
    pub fn stop(&mut self) {
        if self.stop.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        info!("Capture loop stopped");
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(mut source: Box<dyn CameraSource>, slot: Arc<FrameSlot>, stop: Arc<AtomicBool>) {
    let mut window_start = Instant::now();

    // The stop flag is checked once per iteration; an in-flight capture is
    // never cancelled, it just becomes the last one.
    while !stop.load(Ordering::SeqCst) {
        match source.capture_jpeg() {
            Ok(frame) => {
                slot.publish(frame);

                let elapsed = window_start.elapsed();
                if elapsed >= FPS_WINDOW {
                    slot.recompute_fps(elapsed.as_secs_f64());
                    window_start = Instant::now();
                }

                std::thread::sleep(CAPTURE_YIELD);
            }
            Err(e) => {
                warn!(error = %e, "Capture failed, retrying");
                std::thread::sleep(FAILURE_BACKOFF);
            }
        }
    }

    source.close();
    info!(camera = %source.name(), "Camera source closed");
}
