//! Video and audio capture loops.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{debug, info, instrument, warn};

use regionrec_audio::{resolve_loopback_device, LoopbackPolicy, StreamFormat};
use regionrec_capture::CapturedFrame;
use regionrec_encoder::{EncoderResult, GifAssembler, VideoSink, VideoSinkConfig, VideoSummary, WavSink};
use regionrec_ipc::{OutputFormat, RecordingSettings};

use crate::backend::MediaBackend;
use crate::pacing::FramePacer;
use crate::stats::CaptureStats;

/// Cooperative stop signal shared by a session and its capture threads.
#[derive(Debug, Clone, Default)]
pub struct RunFlag(Arc<AtomicBool>);

impl RunFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What the video thread leaves for finalize.
pub(crate) enum VideoProduct {
    /// Temporary MP4 closed successfully.
    Encoded(VideoSummary),

    /// GIF frames still in memory.
    Frames(GifAssembler),

    /// Nothing usable.
    Nothing,
}

pub(crate) struct VideoOutput {
    pub product: VideoProduct,
    pub error: Option<String>,
}

pub(crate) struct AudioOutput {
    pub frames: u64,
    /// Why no usable audio file was produced.
    pub error: Option<String>,
    /// Blocks lost to read or write failures while the file kept growing.
    pub dropped_blocks: u64,
    pub last_dropout: Option<String>,
}

impl AudioOutput {
    /// One-line description of the dropped blocks, if any.
    pub fn dropout_summary(&self) -> Option<String> {
        let last = self.last_dropout.as_deref()?;
        Some(match self.dropped_blocks {
            1 => format!("1 audio block was dropped: {last}"),
            n => format!("{n} audio blocks were dropped, last: {last}"),
        })
    }
}

pub(crate) struct VideoJob {
    pub backend: Arc<dyn MediaBackend>,
    pub settings: RecordingSettings,
    pub temp_path: PathBuf,
    pub gif_speed: i32,
    pub run: RunFlag,
    pub stats: Arc<CaptureStats>,
}

pub(crate) struct AudioJob {
    pub backend: Arc<dyn MediaBackend>,
    pub policy: LoopbackPolicy,
    pub block_frames: usize,
    pub temp_path: PathBuf,
    pub run: RunFlag,
    pub stats: Arc<CaptureStats>,
}

enum VideoTarget {
    Stream(Box<dyn VideoSink>),
    Frames(GifAssembler),
}

impl VideoTarget {
    fn push(&mut self, frame: CapturedFrame) -> EncoderResult<()> {
        match self {
            Self::Stream(sink) => sink.write_frame(&frame),
            Self::Frames(gif) => gif.push(frame),
        }
    }

    fn written(&self) -> u64 {
        match self {
            Self::Stream(sink) => sink.frames_written(),
            Self::Frames(gif) => gif.len() as u64,
        }
    }
}

/// Grab, submit, pace; until the run flag drops.
#[instrument(name = "video_loop", skip_all, fields(fps = job.settings.fps, format = %job.settings.output_format))]
pub(crate) fn run_video_loop(job: VideoJob) -> VideoOutput {
    let mut source = match job.backend.open_frame_source(&job.settings.region) {
        Ok(source) => source,
        Err(e) => return abort_video(format!("could not open screen capture: {e}")),
    };

    let (width, height) = source.dimensions();
    let mut target = match job.settings.output_format {
        OutputFormat::Mp4 => {
            let config = VideoSinkConfig::new(width, height, job.settings.fps);
            match job.backend.open_video_sink(&job.temp_path, config) {
                Ok(sink) => VideoTarget::Stream(sink),
                Err(e) => return abort_video(format!("could not open video encoder: {e}")),
            }
        }
        OutputFormat::Gif => {
            VideoTarget::Frames(GifAssembler::new(job.settings.fps).with_speed(job.gif_speed))
        }
    };

    info!(width, height, "Video capture started");

    let mut last_error: Option<String> = None;
    let mut failures = 0u64;
    let mut pacer = FramePacer::new(job.settings.fps);

    while job.run.is_raised() {
        let result = source
            .grab()
            .map_err(|e| format!("capture failed: {e}"))
            .and_then(|frame| target.push(frame).map_err(|e| format!("encode failed: {e}")));

        match result {
            Ok(()) => job.stats.record_frame(),
            Err(message) => {
                failures += 1;
                job.stats.record_frame_error();
                if failures == 1 {
                    warn!(%message, "Frame skipped");
                } else {
                    debug!(%message, failures, "Frame skipped");
                }
                last_error = Some(message);
            }
        }

        pacer.wait();
    }

    debug!(
        ticks = pacer.ticks(),
        written = target.written(),
        failures,
        "Video capture loop exited"
    );

    let product = match target {
        VideoTarget::Stream(sink) => match sink.finish() {
            Ok(summary) => VideoProduct::Encoded(summary),
            Err(e) => {
                last_error = Some(format!("could not close video file: {e}"));
                VideoProduct::Nothing
            }
        },
        VideoTarget::Frames(gif) => VideoProduct::Frames(gif),
    };

    VideoOutput {
        product,
        error: last_error,
    }
}

fn abort_video(message: String) -> VideoOutput {
    warn!(%message, "Video capture aborted");
    VideoOutput {
        product: VideoProduct::Nothing,
        error: Some(message),
    }
}

/// Pull loopback blocks into the WAV file until the run flag drops.
///
/// A missing device ends the thread without creating a file.
#[instrument(name = "audio_loop", skip_all, fields(block_frames = job.block_frames))]
pub(crate) fn run_audio_loop(job: AudioJob) -> AudioOutput {
    let provider = job.backend.loopback();

    let device = match resolve_loopback_device(provider, &job.policy) {
        Ok(device) => device,
        Err(e) => return abort_audio(e.to_string()),
    };

    let mut source = match provider.open(&device, StreamFormat::default()) {
        Ok(source) => source,
        Err(e) => return abort_audio(format!("could not open {}: {e}", device.name)),
    };

    let format = source.format();
    let mut sink = match WavSink::create(&job.temp_path, format.sample_rate, format.channels) {
        Ok(sink) => sink,
        Err(e) => return abort_audio(format!("could not create audio file: {e}")),
    };

    info!(device = %device.name, "Audio capture started");

    let backoff = format.duration_of(job.block_frames);
    let mut dropped_blocks = 0u64;
    let mut last_dropout: Option<String> = None;

    while job.run.is_raised() {
        let message = match source.read_block(job.block_frames) {
            Ok(block) => match sink.write_samples(&block.to_pcm16()) {
                Ok(()) => {
                    job.stats.record_audio_block();
                    continue;
                }
                Err(e) => format!("audio write failed: {e}"),
            },
            Err(e) => {
                thread::sleep(backoff);
                format!("audio capture failed: {e}")
            }
        };

        job.stats.record_audio_error();
        dropped_blocks += 1;
        if dropped_blocks == 1 {
            warn!(%message, "Audio block dropped");
        } else {
            debug!(%message, dropped_blocks, "Audio block dropped");
        }
        last_dropout = Some(message);
    }

    let frames = sink.frames_written();
    drop(source);
    let error = sink
        .finish()
        .err()
        .map(|e| format!("could not close audio file: {e}"));

    debug!(frames, dropped_blocks, "Audio capture loop exited");
    AudioOutput {
        frames,
        error,
        dropped_blocks,
        last_dropout,
    }
}

fn abort_audio(message: String) -> AudioOutput {
    warn!(%message, "Recording without system audio");
    AudioOutput {
        frames: 0,
        error: Some(message),
        dropped_blocks: 0,
        last_dropout: None,
    }
}
