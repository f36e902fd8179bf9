//! Combining the silent video and the audio track into the deliverable.

use std::fs;
use std::path::PathBuf;
use std::process::Stdio;

use tracing::{debug, instrument, warn};

use crate::error::EncoderError;
use crate::ffmpeg::ffmpeg_command;
use crate::EncoderResult;

/// Inputs and output of one mux.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxJob {
    pub video: PathBuf,
    pub audio: PathBuf,
    pub output: PathBuf,
}

/// Writes `job.output` from a video file and an audio file.
pub trait Muxer: Send + Sync {
    fn mux(&self, job: &MuxJob) -> EncoderResult<()>;
}

/// Muxes with ffmpeg: video stream copied, audio encoded to AAC.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegMuxer;

impl Muxer for FfmpegMuxer {
    #[instrument(name = "ffmpeg_mux", skip(self, job), fields(output = %job.output.display()))]
    fn mux(&self, job: &MuxJob) -> EncoderResult<()> {
        let mut command = ffmpeg_command();
        command
            .args(["-i", job.video.to_string_lossy().as_ref()])
            .args(["-i", job.audio.to_string_lossy().as_ref()])
            .args(["-map", "0:v:0"])
            .args(["-map", "1:a:0"])
            .args(["-c:v", "copy"])
            .args(["-c:a", "aac"])
            .args(["-b:a", "192k"])
            .args(["-movflags", "+faststart"])
            .args(["-y"])
            .arg(job.output.to_string_lossy().to_string());

        let inner = command.as_inner_mut();
        inner.stdin(Stdio::null());
        inner.stdout(Stdio::null());
        inner.stderr(Stdio::piped());

        let output = inner
            .output()
            .map_err(|e| EncoderError::FfmpegSpawn(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("exit code {:?}", output.status.code()));

            if job.output.exists() {
                if let Err(e) = fs::remove_file(&job.output) {
                    warn!(error = %e, "Failed to remove partial mux output");
                }
            }
            return Err(EncoderError::FfmpegFailed(detail));
        }

        debug!("Mux finished");
        Ok(())
    }
}
