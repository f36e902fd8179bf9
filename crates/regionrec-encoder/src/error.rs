//! Error types for the encoder module.

use thiserror::Error;

/// Errors that can occur while writing or finalizing media files.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The ffmpeg process could not be started.
    #[error("Failed to start ffmpeg: {0}")]
    FfmpegSpawn(String),

    /// ffmpeg exited unsuccessfully or its pipe closed early.
    #[error("ffmpeg failed: {0}")]
    FfmpegFailed(String),

    /// WAV read or write error.
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// GIF encoding error.
    #[error("GIF encoding error: {0}")]
    Gif(#[from] gif::EncodingError),

    /// Invalid input data.
    #[error("Invalid input data: {0}")]
    InvalidInput(String),

    /// Finalize was asked to encode an empty frame sequence.
    #[error("No frames were captured")]
    NoFrames,
}
