//! GStreamer-based camera sources producing JPEG frames

mod platform;

pub use platform::is_raspberry_pi;

use crate::config::CameraConfig;
use bytes::Bytes;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use thiserror::Error;
use tracing::{debug, info, warn};

/// How long a single frame pull may block before it counts as a failure.
const PULL_TIMEOUT: gst::ClockTime = gst::ClockTime::from_seconds(1);

/// How long the pipeline may take to reach the Playing state at open.
const OPEN_TIMEOUT: gst::ClockTime = gst::ClockTime::from_seconds(5);

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("GStreamer error: {0}")]
    Gst(#[from] gst::glib::Error),

    #[error("GStreamer bool error: {0}")]
    GstBool(#[from] gst::glib::BoolError),

    #[error("state change error: {0}")]
    StateChange(String),

    #[error("pipeline error: {0}")]
    Pipeline(String),

    #[error("timed out waiting for a frame")]
    FrameTimeout,

    #[error("camera is closed")]
    Closed,

    #[error("no usable camera source")]
    NoUsableSource,
}

/// A camera device producing one JPEG-encoded frame per call.
///
/// Exactly one capture loop owns a source for the whole process lifetime;
/// selection between the hardware and generic variants happens once at
/// startup via [`open_source`].
pub trait CameraSource: Send {
    /// Pulls one complete JPEG frame from the device.
    fn capture_jpeg(&mut self) -> Result<Bytes, CameraError>;

    /// Source identity string reported by `/stats`.
    fn name(&self) -> &str;

    /// Tears the device down. Safe to call more than once.
    fn close(&mut self);
}

/// Shared pipeline plumbing for both source variants.
struct GstPipeline {
    pipeline: Option<gst::Pipeline>,
    app_sink: Option<gst_app::AppSink>,
}

impl GstPipeline {
    fn open(pipeline_desc: &str) -> Result<Self, CameraError> {
        gst::init()?;

        debug!(pipeline = %pipeline_desc, "Creating GStreamer pipeline");

        let pipeline = gst::parse::launch(pipeline_desc)?
            .dynamic_cast::<gst::Pipeline>()
            .map_err(|_| CameraError::Pipeline("Not a pipeline".to_string()))?;

        let app_sink = pipeline
            .by_name("sink")
            .ok_or_else(|| CameraError::Pipeline("No appsink found".to_string()))?
            .dynamic_cast::<gst_app::AppSink>()
            .map_err(|_| CameraError::Pipeline("Not an appsink".to_string()))?;

        // Keep at most two frames buffered, dropping the oldest; the slot
        // only ever wants the latest anyway.
        app_sink.set_property("max-buffers", 2u32);
        app_sink.set_property("drop", true);

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| CameraError::StateChange(format!("{:?}", e)))?;

        // Wait for the device to actually come up so a missing camera fails
        // the probe here instead of on the first capture.
        let (result, _, _) = pipeline.state(OPEN_TIMEOUT);
        if let Err(e) = result {
            let _ = pipeline.set_state(gst::State::Null);
            return Err(CameraError::StateChange(format!("{:?}", e)));
        }

        Ok(Self {
            pipeline: Some(pipeline),
            app_sink: Some(app_sink),
        })
    }

    fn pull_jpeg(&mut self) -> Result<Bytes, CameraError> {
        let sink = self.app_sink.as_ref().ok_or(CameraError::Closed)?;

        let sample = sink
            .try_pull_sample(PULL_TIMEOUT)
            .ok_or(CameraError::FrameTimeout)?;
        let buffer = sample
            .buffer()
            .ok_or_else(|| CameraError::Pipeline("Sample without buffer".to_string()))?;
        let map = buffer
            .map_readable()
            .map_err(|_| CameraError::Pipeline("Unreadable buffer".to_string()))?;

        // The buffer is owned by the pipeline, so one copy into Bytes
        Ok(Bytes::copy_from_slice(map.as_slice()))
    }

    fn close(&mut self) {
        self.app_sink.take();
        if let Some(pipeline) = self.pipeline.take() {
            let _ = pipeline.set_state(gst::State::Null);
        }
    }
}

impl Drop for GstPipeline {
    fn drop(&mut self) {
        self.close();
    }
}

/// Raspberry Pi camera: libcamera source with a fixed frame-duration target
/// and the device JPEG encoder.
pub struct PiCamera {
    inner: GstPipeline,
    name: String,
}

impl PiCamera {
    pub fn open(config: &CameraConfig) -> Result<Self, CameraError> {
        let desc = format!(
            "libcamerasrc ! video/x-raw,format=NV12,width={},height={},framerate={}/1 \
             ! queue max-size-buffers=2 leaky=downstream ! videoconvert \
             ! v4l2jpegenc ! appsink name=sink",
            config.width, config.height, config.target_fps
        );

        let inner = GstPipeline::open(&desc)?;
        info!(
            sensor = %config.sensor,
            resolution = %config.resolution(),
            fps = %config.target_fps,
            "Opened hardware camera source"
        );

        Ok(Self {
            inner,
            name: config.sensor.clone(),
        })
    }
}

impl CameraSource for PiCamera {
    fn capture_jpeg(&mut self) -> Result<Bytes, CameraError> {
        self.inner.pull_jpeg()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

/// Generic V4L2 camera with software JPEG encoding.
pub struct V4l2Camera {
    inner: GstPipeline,
    name: String,
}

impl V4l2Camera {
    pub fn open(config: &CameraConfig) -> Result<Self, CameraError> {
        let desc = format!(
            "v4l2src device={} ! video/x-raw,width={},height={} \
             ! queue max-size-buffers=2 leaky=downstream ! videoconvert \
             ! jpegenc quality={} ! appsink name=sink",
            config.device, config.width, config.height, config.quality
        );

        let inner = GstPipeline::open(&desc)?;
        info!(
            device = %config.device,
            resolution = %config.resolution(),
            quality = %config.quality,
            "Opened generic camera source"
        );

        Ok(Self {
            inner,
            name: format!("v4l2:{}", config.device),
        })
    }
}

impl CameraSource for V4l2Camera {
    fn capture_jpeg(&mut self) -> Result<Bytes, CameraError> {
        self.inner.pull_jpeg()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(&mut self) {
        self.inner.close();
    }
}

/// One-time capability probe: hardware variant on a Raspberry Pi, generic
/// V4L2 otherwise or when the hardware path fails to open. Both failing is
/// fatal; there is no further fallback.
pub fn open_source(config: &CameraConfig) -> Result<Box<dyn CameraSource>, CameraError> {
    select_source(
        is_raspberry_pi(),
        || PiCamera::open(config).map(|c| Box::new(c) as Box<dyn CameraSource>),
        || V4l2Camera::open(config).map(|c| Box::new(c) as Box<dyn CameraSource>),
    )
}

/// Probe-order decision, separated from pipeline construction: try the
/// hardware variant only when the platform supports it, fall back to the
/// generic variant, and fail when neither opens.
fn select_source<H, G>(
    hardware_supported: bool,
    open_hardware: H,
    open_generic: G,
) -> Result<Box<dyn CameraSource>, CameraError>
where
    H: FnOnce() -> Result<Box<dyn CameraSource>, CameraError>,
    G: FnOnce() -> Result<Box<dyn CameraSource>, CameraError>,
{
    if hardware_supported {
        match open_hardware() {
            Ok(camera) => return Ok(camera),
            Err(e) => {
                warn!(error = %e, "Hardware camera unavailable, trying generic source");
            }
        }
    }

    match open_generic() {
        Ok(camera) => Ok(camera),
        Err(e) => {
            warn!(error = %e, "Generic camera source failed to open");
            Err(CameraError::NoUsableSource)
        }
    }
}
