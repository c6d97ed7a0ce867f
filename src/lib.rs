//! Live camera dashboard: MJPEG streaming over HTTP
//!
//! A single background capture loop owns the camera and publishes the most
//! recent JPEG frame into a shared [`slot::FrameSlot`]; any number of HTTP
//! viewers relay that frame as a `multipart/x-mixed-replace` stream at a
//! bounded rate, independent of the capture rate. A small JSON endpoint
//! reports measured throughput.
//!
//! # Example
//!
//! ```no_run
//! use camera_dashboard::{config::Config, slot::FrameSlot};
//! use std::sync::Arc;
//!
//! let config = Config::default();
//! let slot = Arc::new(FrameSlot::new(
//!     config.camera.resolution(),
//!     "IMX708".to_string(),
//! ));
//! // ... open a camera source, spawn the capture loop, serve the router
//! ```

pub mod camera;
pub mod capture;
pub mod config;
pub mod relay;
pub mod slot;
pub mod web;

// Re-exports for convenience
pub use camera::{open_source, CameraError, CameraSource};
pub use capture::CaptureLoop;
pub use config::Config;
pub use relay::{mjpeg_part, relay_stream};
pub use slot::{FrameSlot, SlotStats};
pub use web::{router, AppState};
