//! PCM16 WAV capture file and audio track preparation.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::{debug, instrument, warn};

use crate::error::EncoderError;
use crate::EncoderResult;

/// Sequential 16-bit PCM writer for the system audio track.
pub struct WavSink {
    writer: WavWriter<BufWriter<File>>,
    path: PathBuf,
    channels: u16,
    samples: u64,
}

impl WavSink {
    /// Create (or truncate) `path`.
    pub fn create(path: &Path, sample_rate: u32, channels: u16) -> EncoderResult<Self> {
        if channels == 0 || sample_rate == 0 {
            return Err(EncoderError::InvalidInput(format!(
                "{channels} channels at {sample_rate} Hz"
            )));
        }
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(path, spec)?;
        Ok(Self {
            writer,
            path: path.to_path_buf(),
            channels,
            samples: 0,
        })
    }

    /// Append interleaved samples.
    pub fn write_samples(&mut self, samples: &[i16]) -> EncoderResult<()> {
        for &sample in samples {
            self.writer.write_sample(sample)?;
        }
        self.samples += samples.len() as u64;
        Ok(())
    }

    /// Sample frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.samples / self.channels as u64
    }

    /// Patch the header and close the file.
    pub fn finish(self) -> EncoderResult<PathBuf> {
        let frames = self.frames_written();
        self.writer.finalize()?;
        debug!(frames, path = %self.path.display(), "WAV file closed");
        Ok(self.path)
    }
}

/// Length of a WAV file.
pub fn wav_duration(path: &Path) -> EncoderResult<Duration> {
    let reader = WavReader::open(path)?;
    let rate = reader.spec().sample_rate;
    if rate == 0 {
        return Ok(Duration::ZERO);
    }
    Ok(Duration::from_secs_f64(reader.duration() as f64 / rate as f64))
}

/// Rewrite `path` keeping at most `max` of audio. Returns true if it was shortened.
pub fn truncate_wav(path: &Path, max: Duration) -> EncoderResult<bool> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(EncoderError::InvalidInput(format!(
            "cannot trim {}-bit {:?} audio",
            spec.bits_per_sample, spec.sample_format
        )));
    }

    let frames = reader.duration() as u64;
    let keep = (max.as_secs_f64() * spec.sample_rate as f64).round() as u64;
    if frames <= keep {
        return Ok(false);
    }

    let trimmed = trimmed_path(path);
    let wanted = (keep * spec.channels as u64) as usize;
    let written = write_prefix(reader, &trimmed, wanted)
        .and_then(|()| fs::rename(&trimmed, path).map_err(EncoderError::from));
    if let Err(e) = written {
        if trimmed.exists() {
            if let Err(remove) = fs::remove_file(&trimmed) {
                warn!(error = %remove, path = %trimmed.display(), "Failed to remove partial trimmed audio");
            }
        }
        return Err(e);
    }

    debug!(from = frames, to = keep, "Audio track truncated");
    Ok(true)
}

fn trimmed_path(path: &Path) -> PathBuf {
    path.with_extension("trim.wav")
}

/// Copy the first `samples` samples of `reader` into a new file at `dest`.
fn write_prefix<R: std::io::Read>(reader: WavReader<R>, dest: &Path, samples: usize) -> EncoderResult<()> {
    let mut writer = WavWriter::create(dest, reader.spec())?;
    for sample in reader.into_samples::<i16>().take(samples) {
        writer.write_sample(sample?)?;
    }
    writer.finalize()?;
    Ok(())
}

/// State of the recorded audio track when finalize looks at it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioTrack {
    /// No file on disk.
    Missing,

    /// The file holds no sample frames.
    Empty,

    /// Usable for muxing.
    Ready { duration: Duration, truncated: bool },
}

impl AudioTrack {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// Check the WAV at `path` and cut it down to `video_duration` if it runs longer.
#[instrument(name = "prepare_audio_track", skip(path), fields(path = %path.display()))]
pub fn prepare_audio_track(path: &Path, video_duration: Duration) -> EncoderResult<AudioTrack> {
    if !path.exists() {
        return Ok(AudioTrack::Missing);
    }

    let duration = wav_duration(path)?;
    if duration.is_zero() {
        return Ok(AudioTrack::Empty);
    }
    if duration <= video_duration {
        return Ok(AudioTrack::Ready {
            duration,
            truncated: false,
        });
    }

    truncate_wav(path, video_duration)?;
    let duration = wav_duration(path)?;
    if duration.is_zero() {
        return Ok(AudioTrack::Empty);
    }
    Ok(AudioTrack::Ready {
        duration,
        truncated: true,
    })
}
