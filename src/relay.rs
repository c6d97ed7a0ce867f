//! Per-viewer MJPEG relay over `multipart/x-mixed-replace`

use crate::slot::FrameSlot;
use bytes::Bytes;
use futures_util::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Multipart boundary token, shared with the Content-Type header.
pub const BOUNDARY: &str = "frame";

const PART_HEADER: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";

/// Frames one JPEG as a single multipart part:
/// `--frame\r\nContent-Type: image/jpeg\r\n\r\n<jpeg>\r\n`.
pub fn mjpeg_part(frame: &Bytes) -> Bytes {
    let mut buf = Vec::with_capacity(PART_HEADER.len() + frame.len() + 2);
    buf.extend_from_slice(PART_HEADER);
    buf.extend_from_slice(frame);
    buf.extend_from_slice(b"\r\n");
    Bytes::from(buf)
}

/// Per-viewer stream of multipart parts.
///
/// Each interval tick reads the slot and yields at most one part; empty
/// ticks yield nothing, so a viewer that connects before the first capture
/// sees no bytes until a frame appears. The tick rate caps what a viewer
/// receives regardless of how fast capture runs; if capture is slower, the
/// same frame is simply re-sent. A slow viewer only backpressures its own
/// connection, never the capture loop or other viewers.
///
/// The stream otherwise runs until the client disconnects; `shutdown` ends
/// it from the server side so in-flight response bodies complete and
/// graceful shutdown can finish. A dropped sender counts as shutdown.
pub fn relay_stream(
    slot: Arc<FrameSlot>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
) -> impl Stream<Item = Result<Bytes, Infallible>> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    futures_util::stream::unfold(
        (slot, ticker, shutdown),
        |(slot, mut ticker, mut shutdown)| async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => return None,
                    _ = ticker.tick() => {
                        if let Some(frame) = slot.read() {
                            return Some((Ok(mjpeg_part(&frame)), (slot, ticker, shutdown)));
                        }
                    }
                }
            }
        },
    )
}
