//! In-process media backend for engine tests.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::Mutex;

use regionrec_audio::{AudioBlock, AudioError, AudioResult, AudioSource, LoopbackProvider, StreamFormat};
use regionrec_capture::{CaptureError, CaptureResult, CaptureTimestamp, CapturedFrame, FrameSource};
use regionrec_encoder::{
    wav_duration, EncoderError, EncoderResult, MuxJob, Muxer, VideoSink, VideoSinkConfig,
    VideoSummary,
};
use regionrec_ipc::{AudioDevice, CaptureRegion};

use crate::backend::MediaBackend;

pub(crate) struct FakeBackend {
    pub loopback: FakeLoopback,
    pub muxer: FakeMuxer,
    pub fail_video_sink: bool,
    pub grab_delay: Duration,
    /// Every n-th grab fails.
    pub fail_every: Option<u64>,
}

impl FakeBackend {
    /// One speaker device producing a tone twice as fast as real time.
    pub fn new() -> Self {
        Self {
            loopback: FakeLoopback {
                devices: vec![AudioDevice {
                    id: "fake-speakers".to_string(),
                    name: "Speakers (Fake)".to_string(),
                    is_default: true,
                }],
                level: 0.3,
                speedup: 2.0,
                fail_read: None,
            },
            muxer: FakeMuxer::default(),
            fail_video_sink: false,
            grab_delay: Duration::ZERO,
            fail_every: None,
        }
    }

    /// No loopback devices at all.
    pub fn without_audio() -> Self {
        let mut backend = Self::new();
        backend.loopback.devices.clear();
        backend
    }
}

impl MediaBackend for FakeBackend {
    fn open_frame_source(&self, region: &CaptureRegion) -> CaptureResult<Box<dyn FrameSource>> {
        Ok(Box::new(SyntheticSource {
            width: region.width,
            height: region.height,
            delay: self.grab_delay,
            fail_every: self.fail_every,
            start: Instant::now(),
            sequence: 0,
            grabs: 0,
        }))
    }

    fn open_video_sink(
        &self,
        path: &Path,
        config: VideoSinkConfig,
    ) -> EncoderResult<Box<dyn VideoSink>> {
        if self.fail_video_sink {
            return Err(EncoderError::FfmpegSpawn("fake encoder unavailable".to_string()));
        }
        Ok(Box::new(FakeVideoSink {
            file: File::create(path)?,
            path: path.to_path_buf(),
            config,
            frames: 0,
        }))
    }

    fn loopback(&self) -> &dyn LoopbackProvider {
        &self.loopback
    }

    fn muxer(&self) -> &dyn Muxer {
        &self.muxer
    }
}

/// Produces frames whose colour changes every tick.
struct SyntheticSource {
    width: u32,
    height: u32,
    delay: Duration,
    fail_every: Option<u64>,
    start: Instant,
    sequence: u64,
    grabs: u64,
}

impl FrameSource for SyntheticSource {
    fn grab(&mut self) -> CaptureResult<CapturedFrame> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.grabs += 1;
        if self.fail_every.is_some_and(|n| self.grabs % n == 0) {
            return Err(CaptureError::Backend("synthetic grab failure".to_string()));
        }
        let shade = (self.sequence * 37 % 256) as u8;
        let pixels = (self.width * self.height) as usize;
        let data: Vec<u8> = [shade, 255 - shade, 128, 255]
            .iter()
            .copied()
            .cycle()
            .take(pixels * 4)
            .collect();
        let frame = CapturedFrame::new(
            Bytes::from(data),
            self.width,
            self.height,
            CaptureTimestamp::now(self.start),
            self.sequence,
        );
        self.sequence += 1;
        Ok(frame)
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Writes one line per frame so tests can tell the file was produced.
struct FakeVideoSink {
    file: File,
    path: PathBuf,
    config: VideoSinkConfig,
    frames: u64,
}

impl VideoSink for FakeVideoSink {
    fn write_frame(&mut self, frame: &CapturedFrame) -> EncoderResult<()> {
        self.config.check_frame(frame)?;
        writeln!(self.file, "frame {}", frame.sequence)?;
        self.frames += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }

    fn finish(mut self: Box<Self>) -> EncoderResult<VideoSummary> {
        self.file.flush()?;
        Ok(VideoSummary {
            path: self.path.clone(),
            frames: self.frames,
            fps: self.config.fps,
        })
    }
}

pub(crate) struct FakeLoopback {
    pub devices: Vec<AudioDevice>,
    pub level: f32,
    pub speedup: f64,
    /// Zero-based read that fails, once.
    pub fail_read: Option<u64>,
}

impl LoopbackProvider for FakeLoopback {
    fn devices(&self) -> AudioResult<Vec<AudioDevice>> {
        Ok(self.devices.clone())
    }

    fn open(&self, _device: &AudioDevice, format: StreamFormat) -> AudioResult<Box<dyn AudioSource>> {
        Ok(Box::new(ToneSource {
            format,
            level: self.level,
            speedup: self.speedup,
            fail_read: self.fail_read,
            reads: 0,
            sequence: 0,
        }))
    }
}

struct ToneSource {
    format: StreamFormat,
    level: f32,
    speedup: f64,
    fail_read: Option<u64>,
    reads: u64,
    sequence: u64,
}

impl AudioSource for ToneSource {
    fn read_block(&mut self, frames: usize) -> AudioResult<AudioBlock> {
        thread::sleep(self.format.duration_of(frames).div_f64(self.speedup));
        let read = self.reads;
        self.reads += 1;
        if self.fail_read == Some(read) {
            return Err(AudioError::DeviceLost);
        }
        let samples = vec![self.level; frames * self.format.channels as usize];
        let block = AudioBlock::new(samples, self.format.channels, self.sequence);
        self.sequence += 1;
        Ok(block)
    }

    fn format(&self) -> StreamFormat {
        self.format
    }
}

/// Copies the video to the output and remembers the audio length it saw.
#[derive(Default)]
pub(crate) struct FakeMuxer {
    pub fail: bool,
    pub jobs: Mutex<Vec<(MuxJob, Duration)>>,
}

impl Muxer for FakeMuxer {
    fn mux(&self, job: &MuxJob) -> EncoderResult<()> {
        if self.fail {
            return Err(EncoderError::FfmpegFailed("fake mux failure".to_string()));
        }
        let audio = wav_duration(&job.audio)?;
        fs::copy(&job.video, &job.output)?;
        self.jobs.lock().push((job.clone(), audio));
        Ok(())
    }
}
