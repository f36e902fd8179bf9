//! Error types for the audio module.

use thiserror::Error;

/// Errors that can occur during audio operations.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Windows API error.
    #[error("Windows API error: {message}")]
    WindowsApi {
        message: String,
        #[cfg(windows)]
        #[source]
        source: Option<windows::core::Error>,
    },

    /// No loopback device matched the selection policy.
    #[error("No system audio loopback device found")]
    DeviceNotFound,

    /// A specific device could not be opened.
    #[error("Audio device not available: {0}")]
    DeviceUnavailable(String),

    /// Audio format not supported.
    #[error("Audio format not supported: {0}")]
    FormatNotSupported(String),

    /// Device lost during capture.
    #[error("Audio device lost")]
    DeviceLost,

    /// Loopback capture is not available on this platform.
    #[error("System audio capture is not supported on this platform")]
    NotSupported,
}

#[cfg(windows)]
impl From<windows::core::Error> for AudioError {
    fn from(err: windows::core::Error) -> Self {
        Self::WindowsApi {
            message: err.message().to_string(),
            source: Some(err),
        }
    }
}
