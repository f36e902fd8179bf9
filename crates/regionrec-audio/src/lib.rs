//! System audio (loopback) capture for the region recorder.
//!
//! Sources are pull-based: the recorder asks an [`AudioSource`] for one block
//! at a time and writes it straight to disk. Device discovery sits behind
//! [`LoopbackProvider`] so the engine and the probe can run against a fake
//! provider in tests.

mod block;
#[cfg(windows)]
mod device;
mod error;
mod probe;
mod select;
#[cfg(windows)]
mod wasapi;

pub use block::{f32_to_pcm16, AudioBlock};
#[cfg(windows)]
pub use device::enumerate_loopback_devices;
pub use error::AudioError;
pub use probe::{test_loopback_audio, PROBE_FRAMES, SILENCE_THRESHOLD};
pub use select::{select_loopback_device, LoopbackPolicy, DEFAULT_SPEAKER_HINTS};
#[cfg(windows)]
pub use wasapi::WasapiLoopbackSource;

use std::time::Duration;

use regionrec_ipc::AudioDevice;

/// Result type for audio operations.
pub type AudioResult<T> = Result<T, AudioError>;

/// Audio sample rate in Hz.
pub const SAMPLE_RATE: u32 = 44_100;

/// Number of audio channels.
pub const CHANNELS: u16 = 2;

/// Frames pulled per read while recording.
pub const BLOCK_FRAMES: usize = 1024;

/// Shortest wait for loopback packets before a block is padded with silence.
///
/// Several shared-mode engine periods (10 ms each), so a freshly started
/// stream gets to deliver its first packet.
pub const MIN_SILENCE_GRACE: Duration = Duration::from_millis(50);

/// How long a read of `block` worth of audio waits for packets before
/// treating the endpoint as idle.
pub fn silence_grace(block: Duration) -> Duration {
    block.max(MIN_SILENCE_GRACE)
}

/// Sample rate and channel layout of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl StreamFormat {
    /// Wall-clock length of `frames` sample frames.
    pub fn duration_of(&self, frames: usize) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }

    /// Sample frames that play in `duration`, to the nearest frame.
    pub fn frames_in(&self, duration: Duration) -> usize {
        (duration.as_secs_f64() * self.sample_rate as f64).round() as usize
    }
}

impl Default for StreamFormat {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
        }
    }
}

/// A blocking producer of interleaved float samples.
pub trait AudioSource {
    /// Block until `frames` sample frames are available and return them.
    fn read_block(&mut self, frames: usize) -> AudioResult<AudioBlock>;

    /// Format of the blocks this source produces.
    fn format(&self) -> StreamFormat;
}

/// Enumerates loopback-capable endpoints and opens them.
pub trait LoopbackProvider: Send + Sync {
    /// List endpoints in a stable order.
    fn devices(&self) -> AudioResult<Vec<AudioDevice>>;

    /// Open `device` for reading. The source stays on the calling thread.
    fn open(&self, device: &AudioDevice, format: StreamFormat)
        -> AudioResult<Box<dyn AudioSource>>;
}

/// The platform loopback provider (WASAPI on Windows, empty elsewhere).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLoopback;

impl LoopbackProvider for SystemLoopback {
    #[cfg(windows)]
    fn devices(&self) -> AudioResult<Vec<AudioDevice>> {
        enumerate_loopback_devices()
    }

    #[cfg(not(windows))]
    fn devices(&self) -> AudioResult<Vec<AudioDevice>> {
        Ok(Vec::new())
    }

    #[cfg(windows)]
    fn open(
        &self,
        device: &AudioDevice,
        format: StreamFormat,
    ) -> AudioResult<Box<dyn AudioSource>> {
        Ok(Box::new(WasapiLoopbackSource::open(&device.id, format)?))
    }

    #[cfg(not(windows))]
    fn open(
        &self,
        _device: &AudioDevice,
        _format: StreamFormat,
    ) -> AudioResult<Box<dyn AudioSource>> {
        Err(AudioError::NotSupported)
    }
}

/// Resolve the device `policy` selects from `provider`, or [`AudioError::DeviceNotFound`].
pub fn resolve_loopback_device(
    provider: &dyn LoopbackProvider,
    policy: &LoopbackPolicy,
) -> AudioResult<AudioDevice> {
    let devices = provider.devices()?;
    select_loopback_device(&devices, policy)
        .cloned()
        .ok_or(AudioError::DeviceNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_format_duration() {
        let format = StreamFormat::default();
        assert_eq!(format.sample_rate, 44_100);
        assert_eq!(format.channels, 2);
        let block = format.duration_of(BLOCK_FRAMES);
        assert!((block.as_secs_f64() - 1024.0 / 44_100.0).abs() < 1e-9);
    }

    #[test]
    fn test_silence_grace_covers_short_reads() {
        let format = StreamFormat::default();

        // A trial-sized read is far shorter than one engine period.
        let trial_block = format.duration_of(PROBE_FRAMES);
        assert!(trial_block < Duration::from_millis(10));
        assert_eq!(silence_grace(trial_block), MIN_SILENCE_GRACE);

        let long_block = format.duration_of(8192);
        assert_eq!(silence_grace(long_block), long_block);

        // Padding after the grace covers the whole idle time.
        assert_eq!(format.frames_in(MIN_SILENCE_GRACE), 2205);
        assert!(format.frames_in(MIN_SILENCE_GRACE) > PROBE_FRAMES);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_system_loopback_has_no_devices_off_windows() {
        let provider = SystemLoopback;
        assert!(provider.devices().unwrap().is_empty());
        let err = resolve_loopback_device(&provider, &LoopbackPolicy::default()).unwrap_err();
        assert!(matches!(err, AudioError::DeviceNotFound));
    }
}
