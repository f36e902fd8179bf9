//! Error types for the capture module.

use thiserror::Error;

/// Errors that can occur during capture operations.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Screen capture backend error.
    #[error("Screen capture error: {0}")]
    Backend(String),

    /// No monitor contains the region origin.
    #[error("No monitor contains point ({x}, {y})")]
    MonitorNotFound { x: i32, y: i32 },

    /// Region does not overlap the monitor it starts on.
    #[error("Capture region {0} lies outside its monitor")]
    RegionOutOfBounds(String),

    /// Frame conversion error.
    #[error("Frame conversion error: {0}")]
    FrameConversion(String),

    /// Screen capture is not available on this platform.
    #[error("Screen capture is not supported on this platform")]
    NotSupported,
}

#[cfg(windows)]
impl From<xcap::XCapError> for CaptureError {
    fn from(err: xcap::XCapError) -> Self {
        Self::Backend(err.to_string())
    }
}
