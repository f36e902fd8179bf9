//! MP4 video sink backed by an ffmpeg child process.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use ffmpeg_sidecar::command::FfmpegCommand;
use parking_lot::Mutex;
use tracing::{debug, instrument, trace, warn};

use regionrec_capture::CapturedFrame;

use crate::error::EncoderError;
use crate::{EncoderResult, VideoSink, VideoSinkConfig, VideoSummary};

/// Environment variable that overrides the ffmpeg binary location.
const FFMPEG_ENV: &str = "REGIONREC_FFMPEG";

/// H.264 needs even dimensions.
const PAD_TO_EVEN: &str = "pad=ceil(iw/2)*2:ceil(ih/2)*2";

/// Build an ffmpeg command using `REGIONREC_FFMPEG`, a binary next to the
/// executable, or `ffmpeg` on `PATH`, in that order.
pub fn ffmpeg_command() -> FfmpegCommand {
    match std::env::var_os(FFMPEG_ENV) {
        Some(path) => FfmpegCommand::new_with_path(path),
        None => FfmpegCommand::new_with_path(ffmpeg_sidecar::paths::ffmpeg_path()),
    }
}

/// Streams raw RGB frames to `ffmpeg` which writes a silent H.264 MP4.
pub struct FfmpegVideoSink {
    config: VideoSinkConfig,
    path: PathBuf,
    stdin: Option<ChildStdin>,
    child: Option<Child>,
    stderr_reader: Option<JoinHandle<()>>,
    last_stderr: Arc<Mutex<Option<String>>>,
    frames: u64,
}

impl FfmpegVideoSink {
    /// Start the encoder process writing to `path`.
    #[instrument(name = "ffmpeg_sink_spawn", skip(path), fields(path = %path.display()))]
    pub fn spawn(path: &Path, config: VideoSinkConfig) -> EncoderResult<Self> {
        config.validate()?;

        let mut command = ffmpeg_command();
        command
            .args(["-f", "rawvideo"])
            .args(["-pix_fmt", "rgb24"])
            .args(["-s", &format!("{}x{}", config.width, config.height)])
            .args(["-r", &config.fps.to_string()])
            .args(["-i", "-"])
            .args(["-vf", PAD_TO_EVEN])
            .args(["-c:v", "libx264"])
            .args(["-preset", "ultrafast"])
            .args(["-pix_fmt", "yuv420p"])
            .args(["-y"])
            .arg(path.to_string_lossy().to_string());

        let inner = command.as_inner_mut();
        inner.stdin(Stdio::piped());
        inner.stdout(Stdio::null());
        inner.stderr(Stdio::piped());

        let mut child = inner
            .spawn()
            .map_err(|e| EncoderError::FfmpegSpawn(e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EncoderError::FfmpegSpawn("stdin was not captured".to_string()))?;

        let last_stderr = Arc::new(Mutex::new(None));
        let stderr_reader = match child.stderr.take() {
            Some(stderr) => {
                let last = Arc::clone(&last_stderr);
                Some(
                    thread::Builder::new()
                        .name("ffmpeg-stderr".to_string())
                        .spawn(move || drain_stderr(stderr, last))?,
                )
            }
            None => None,
        };

        debug!("ffmpeg video sink started");

        Ok(Self {
            config,
            path: path.to_path_buf(),
            stdin: Some(stdin),
            child: Some(child),
            stderr_reader,
            last_stderr,
            frames: 0,
        })
    }

    fn pipe_error(&self, err: std::io::Error) -> EncoderError {
        match self.last_stderr.lock().clone() {
            Some(line) => EncoderError::FfmpegFailed(format!("{err} ({line})")),
            None => EncoderError::FfmpegFailed(err.to_string()),
        }
    }
}

impl VideoSink for FfmpegVideoSink {
    fn write_frame(&mut self, frame: &CapturedFrame) -> EncoderResult<()> {
        self.config.check_frame(frame)?;
        let rgb = frame
            .to_rgb24()
            .map_err(|e| EncoderError::InvalidInput(e.to_string()))?;

        let result = match self.stdin.as_mut() {
            Some(stdin) => stdin.write_all(&rgb),
            None => return Err(EncoderError::FfmpegFailed("sink already closed".to_string())),
        };
        result.map_err(|e| self.pipe_error(e))?;

        self.frames += 1;
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }

    #[instrument(name = "ffmpeg_sink_finish", skip(self), fields(frames = self.frames))]
    fn finish(mut self: Box<Self>) -> EncoderResult<VideoSummary> {
        // Closing stdin ends the input stream.
        drop(self.stdin.take());

        let status = match self.child.take() {
            Some(mut child) => child.wait()?,
            None => return Err(EncoderError::FfmpegFailed("sink already finished".to_string())),
        };

        if let Some(reader) = self.stderr_reader.take() {
            let _ = reader.join();
        }

        if !status.success() {
            let detail = self
                .last_stderr
                .lock()
                .take()
                .unwrap_or_else(|| format!("exit code {:?}", status.code()));
            return Err(EncoderError::FfmpegFailed(detail));
        }

        debug!(path = %self.path.display(), "ffmpeg video sink finished");
        Ok(VideoSummary {
            path: self.path.clone(),
            frames: self.frames,
            fps: self.config.fps,
        })
    }
}

impl Drop for FfmpegVideoSink {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            warn!("ffmpeg video sink dropped without finish, killing encoder");
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn drain_stderr(stderr: std::process::ChildStderr, last: Arc<Mutex<Option<String>>>) {
    for line in BufReader::new(stderr).lines().map_while(Result::ok) {
        trace!(target: "ffmpeg", "{line}");
        if !line.trim().is_empty() {
            *last.lock() = Some(line);
        }
    }
}
