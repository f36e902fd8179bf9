//! Where sessions get their sources, sinks and muxer from.

use std::path::Path;

use regionrec_audio::{LoopbackProvider, SystemLoopback};
use regionrec_capture::{open_screen_region, CaptureResult, FrameSource};
use regionrec_encoder::{EncoderResult, FfmpegMuxer, FfmpegVideoSink, Muxer, VideoSink, VideoSinkConfig};
use regionrec_ipc::CaptureRegion;

/// Factory for the media endpoints a session drives.
///
/// Sources and sinks are opened on the capture thread that uses them, so
/// they need not be `Send`; the backend itself is shared across threads.
pub trait MediaBackend: Send + Sync {
    /// Open a source for the screen region.
    fn open_frame_source(&self, region: &CaptureRegion) -> CaptureResult<Box<dyn FrameSource>>;

    /// Open the temporary MP4 writer.
    fn open_video_sink(
        &self,
        path: &Path,
        config: VideoSinkConfig,
    ) -> EncoderResult<Box<dyn VideoSink>>;

    /// Loopback device enumeration and opening.
    fn loopback(&self) -> &dyn LoopbackProvider;

    /// Finalize-time audio/video combiner.
    fn muxer(&self) -> &dyn Muxer;
}

/// xcap screen grabs, WASAPI loopback and ffmpeg.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBackend {
    loopback: SystemLoopback,
    muxer: FfmpegMuxer,
}

impl SystemBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MediaBackend for SystemBackend {
    fn open_frame_source(&self, region: &CaptureRegion) -> CaptureResult<Box<dyn FrameSource>> {
        open_screen_region(region)
    }

    fn open_video_sink(
        &self,
        path: &Path,
        config: VideoSinkConfig,
    ) -> EncoderResult<Box<dyn VideoSink>> {
        Ok(Box::new(FfmpegVideoSink::spawn(path, config)?))
    }

    fn loopback(&self) -> &dyn LoopbackProvider {
        &self.loopback
    }

    fn muxer(&self) -> &dyn Muxer {
        &self.muxer
    }
}
