//! Output sinks and finalize steps for the region recorder.
//!
//! MP4 recordings stream frames into an ffmpeg child process and capture
//! audio to a WAV file; [`FfmpegMuxer`] combines the two on stop. GIF
//! recordings keep frames in memory and are written by [`GifAssembler`].

mod animation;
mod error;
mod ffmpeg;
mod mux;
mod wav;

pub use animation::{GifAssembler, DEFAULT_GIF_SPEED};
pub use error::EncoderError;
pub use ffmpeg::{ffmpeg_command, FfmpegVideoSink};
pub use mux::{FfmpegMuxer, MuxJob, Muxer};
pub use wav::{prepare_audio_track, truncate_wav, wav_duration, AudioTrack, WavSink};

use std::path::PathBuf;
use std::time::Duration;

use regionrec_capture::CapturedFrame;

/// Result type for encoder operations.
pub type EncoderResult<T> = Result<T, EncoderError>;

/// Geometry and rate of an encoded video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSinkConfig {
    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,

    /// Nominal frames per second.
    pub fps: u32,
}

impl VideoSinkConfig {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self { width, height, fps }
    }

    /// Reject empty geometry or a zero rate.
    pub fn validate(&self) -> EncoderResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(EncoderError::InvalidInput(format!(
                "empty frame size {}x{}",
                self.width, self.height
            )));
        }
        if self.fps == 0 {
            return Err(EncoderError::InvalidInput("fps must be positive".to_string()));
        }
        Ok(())
    }

    /// Returns an error if `frame` does not match this geometry.
    pub fn check_frame(&self, frame: &CapturedFrame) -> EncoderResult<()> {
        if frame.width != self.width || frame.height != self.height {
            return Err(EncoderError::InvalidInput(format!(
                "frame is {}x{}, sink expects {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }
        Ok(())
    }
}

/// A finished video file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSummary {
    pub path: PathBuf,
    pub frames: u64,
    pub fps: u32,
}

impl VideoSummary {
    /// Playback length of the file.
    pub fn duration(&self) -> Duration {
        video_duration(self.frames, self.fps)
    }
}

/// Playback length of `frames` frames at a constant `fps`.
pub fn video_duration(frames: u64, fps: u32) -> Duration {
    if fps == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(frames as f64 / fps as f64)
}

/// Encodes frames into a container file at a fixed rate.
pub trait VideoSink {
    /// Append one frame.
    fn write_frame(&mut self, frame: &CapturedFrame) -> EncoderResult<()>;

    /// Frames accepted so far.
    fn frames_written(&self) -> u64;

    /// Flush and close the file.
    fn finish(self: Box<Self>) -> EncoderResult<VideoSummary>;
}
