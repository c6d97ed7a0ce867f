//! Latest-frame slot shared between the capture loop and HTTP viewers

use bytes::Bytes;
use parking_lot::Mutex;

/// Snapshot of current throughput and source identity
#[derive(Debug, Clone)]
pub struct SlotStats {
    /// Measured capture rate, recomputed once per elapsed second
    pub fps: f64,

    /// Configured resolution label, e.g. "1280x720"
    pub resolution: String,

    /// Active camera source identity
    pub camera: String,
}

struct SlotInner {
    frame: Option<Bytes>,
    window_count: u64,
    fps: f64,
}

/// Single-cell store for the most recent JPEG frame.
///
/// One writer (the capture loop) and any number of readers share the slot.
/// The mutex is held only for the reference swap, so the writer never blocks
/// readers for longer than constant time, and a reader never observes a
/// partially written frame. The slot starts empty; readers must treat the
/// empty state as normal.
pub struct FrameSlot {
    inner: Mutex<SlotInner>,
    resolution: String,
    camera: String,
}

impl FrameSlot {
    pub fn new(resolution: String, camera: String) -> Self {
        Self {
            inner: Mutex::new(SlotInner {
                frame: None,
                window_count: 0,
                fps: 0.0,
            }),
            resolution,
            camera,
        }
    }

    /// Replaces the current frame and advances the window counter.
    ///
    /// Producer-only; the previous frame is dropped, not queued.
    pub fn publish(&self, frame: Bytes) {
        let mut inner = self.inner.lock();
        inner.frame = Some(frame);
        inner.window_count += 1;
    }

    /// Returns the latest frame, or `None` if nothing has been captured yet.
    pub fn read(&self) -> Option<Bytes> {
        self.inner.lock().frame.clone()
    }

    /// Derives fps from the frames counted since the last recomputation and
    /// resets the window. Callers are expected to invoke this once per
    /// elapsed second; between calls the fps value is stale by design.
    pub fn recompute_fps(&self, elapsed_secs: f64) {
        if elapsed_secs <= 0.0 {
            return;
        }

        let mut inner = self.inner.lock();
        inner.fps = inner.window_count as f64 / elapsed_secs;
        inner.window_count = 0;
    }

    pub fn stats(&self) -> SlotStats {
        let inner = self.inner.lock();
        SlotStats {
            fps: inner.fps,
            resolution: self.resolution.clone(),
            camera: self.camera.clone(),
        }
    }
}
