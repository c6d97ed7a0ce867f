//! Configuration management for the camera dashboard

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete dashboard configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub camera: CameraConfig,

    #[serde(default)]
    pub stream: StreamConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_bind_ip")]
    pub bind_ip: String,

    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory served for all non-API paths
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_ip: default_bind_ip(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// V4L2 device path used by the generic source
    #[serde(default = "default_device")]
    pub device: String,

    /// Frame width in pixels
    #[serde(default = "default_width")]
    pub width: u32,

    /// Frame height in pixels
    #[serde(default = "default_height")]
    pub height: u32,

    /// Capture rate cap (frame-duration target on the hardware source)
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,

    /// JPEG quality (1-100), software encoder only
    #[serde(default = "default_quality")]
    pub quality: u32,

    /// Sensor label reported for the hardware source
    #[serde(default = "default_sensor")]
    pub sensor: String,
}

impl CameraConfig {
    /// Resolution label as reported by `/stats`, e.g. "1280x720"
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            width: default_width(),
            height: default_height(),
            target_fps: default_target_fps(),
            quality: default_quality(),
            sensor: default_sensor(),
        }
    }
}

/// Viewer-facing stream configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Relay tick interval in milliseconds; caps the per-viewer frame rate
    #[serde(default = "default_relay_interval_ms")]
    pub relay_interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            relay_interval_ms: default_relay_interval_ms(),
        }
    }
}

// Default value functions
fn default_bind_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_static_dir() -> String {
    "static".to_string()
}
fn default_device() -> String {
    "/dev/video0".to_string()
}
fn default_width() -> u32 {
    1280
}
fn default_height() -> u32 {
    720
}
fn default_target_fps() -> u32 {
    60
}
fn default_quality() -> u32 {
    85
}
fn default_sensor() -> String {
    "IMX708".to_string()
}
fn default_relay_interval_ms() -> u64 {
    10
}

impl Config {
    /// Loads configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Loads configuration from a TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates configuration
    fn validate(&self) -> Result<(), ConfigError> {
        let cam = &self.camera;

        if cam.width == 0 || cam.height == 0 {
            return Err(ConfigError::Invalid(
                "camera: width and height must be > 0".to_string(),
            ));
        }

        if cam.width % 8 != 0 || cam.height % 8 != 0 {
            return Err(ConfigError::Invalid(
                "camera: width and height must be multiples of 8".to_string(),
            ));
        }

        if cam.target_fps == 0 || cam.target_fps > 120 {
            return Err(ConfigError::Invalid(format!(
                "camera: target_fps must be between 1 and 120, got {}",
                cam.target_fps
            )));
        }

        if cam.quality == 0 || cam.quality > 100 {
            return Err(ConfigError::Invalid(format!(
                "camera: quality must be between 1 and 100, got {}",
                cam.quality
            )));
        }

        if self.stream.relay_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "stream: relay_interval_ms must be >= 1".to_string(),
            ));
        }

        Ok(())
    }
}
