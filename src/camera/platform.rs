//! Platform detection for camera sources

/// Checks if running on Raspberry Pi
pub fn is_raspberry_pi() -> bool {
    // Check for Raspberry Pi device tree
    std::path::Path::new("/proc/device-tree/model").exists()
        || std::path::Path::new("/sys/firmware/devicetree/base/model").exists()
}
