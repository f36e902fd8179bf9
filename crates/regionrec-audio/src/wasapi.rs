//! Shared-mode WASAPI loopback reader.

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, trace};
use windows::Win32::Media::Audio::{
    IAudioCaptureClient, IAudioClient, AUDCLNT_BUFFERFLAGS_SILENT, AUDCLNT_SHAREMODE_SHARED,
    AUDCLNT_STREAMFLAGS_AUTOCONVERTPCM, AUDCLNT_STREAMFLAGS_LOOPBACK,
    AUDCLNT_STREAMFLAGS_SRC_DEFAULT_QUALITY, WAVEFORMATEX,
};
use windows::Win32::System::Com::CLSCTX_ALL;

use crate::block::AudioBlock;
use crate::device::{ensure_com_initialized, find_device_by_id};
use crate::{silence_grace, AudioResult, AudioSource, StreamFormat};

const WAVE_FORMAT_IEEE_FLOAT: u16 = 3;

/// Engine buffer length in 100ns units (1 second).
const BUFFER_DURATION: i64 = 10_000_000;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Pulls fixed-size blocks from a render endpoint in loopback mode.
///
/// The engine converts the mix format to the requested float format. An idle
/// endpoint produces no packets at all, so a block that sees no data for
/// [`silence_grace`] is padded with silence to keep the track in step with time.
///
/// Not `Send`: open it on the thread that reads from it.
pub struct WasapiLoopbackSource {
    audio_client: IAudioClient,
    capture_client: IAudioCaptureClient,
    format: StreamFormat,
    pending: Vec<f32>,
    sequence: u64,
}

impl WasapiLoopbackSource {
    /// Open `device_id` and start the stream.
    #[instrument(name = "wasapi_loopback_open", skip(format))]
    pub fn open(device_id: &str, format: StreamFormat) -> AudioResult<Self> {
        ensure_com_initialized()?;

        let device = find_device_by_id(device_id)?;
        let audio_client: IAudioClient = unsafe { device.Activate(CLSCTX_ALL, None)? };

        let block_align = format.channels * 4;
        let wave_format = WAVEFORMATEX {
            wFormatTag: WAVE_FORMAT_IEEE_FLOAT,
            nChannels: format.channels,
            nSamplesPerSec: format.sample_rate,
            nAvgBytesPerSec: format.sample_rate * block_align as u32,
            nBlockAlign: block_align,
            wBitsPerSample: 32,
            cbSize: 0,
        };

        let stream_flags = AUDCLNT_STREAMFLAGS_LOOPBACK
            | AUDCLNT_STREAMFLAGS_AUTOCONVERTPCM
            | AUDCLNT_STREAMFLAGS_SRC_DEFAULT_QUALITY;

        unsafe {
            audio_client.Initialize(
                AUDCLNT_SHAREMODE_SHARED,
                stream_flags,
                BUFFER_DURATION,
                0,
                &wave_format,
                None,
            )?;
        }

        let capture_client: IAudioCaptureClient = unsafe { audio_client.GetService()? };
        unsafe { audio_client.Start()? };

        debug!(
            sample_rate = format.sample_rate,
            channels = format.channels,
            "Loopback stream started"
        );

        Ok(Self {
            audio_client,
            capture_client,
            format,
            pending: Vec::new(),
            sequence: 0,
        })
    }

    /// Drain every packet currently queued by the engine. Returns true if any arrived.
    fn drain_packets(&mut self) -> AudioResult<bool> {
        let channels = self.format.channels as usize;
        let mut received = false;

        loop {
            let packet_length = unsafe { self.capture_client.GetNextPacketSize()? };
            if packet_length == 0 {
                return Ok(received);
            }

            let mut data_ptr = std::ptr::null_mut();
            let mut num_frames = 0u32;
            let mut flags = 0u32;
            unsafe {
                self.capture_client
                    .GetBuffer(&mut data_ptr, &mut num_frames, &mut flags, None, None)?;
            }

            let sample_count = num_frames as usize * channels;
            if flags & AUDCLNT_BUFFERFLAGS_SILENT.0 as u32 != 0 || data_ptr.is_null() {
                self.pending.resize(self.pending.len() + sample_count, 0.0);
            } else if sample_count > 0 {
                let data =
                    unsafe { std::slice::from_raw_parts(data_ptr as *const f32, sample_count) };
                self.pending.extend_from_slice(data);
            }

            unsafe { self.capture_client.ReleaseBuffer(num_frames)? };
            received = true;
        }
    }
}

impl AudioSource for WasapiLoopbackSource {
    fn read_block(&mut self, frames: usize) -> AudioResult<AudioBlock> {
        let wanted = frames * self.format.channels as usize;
        let grace = silence_grace(self.format.duration_of(frames));
        let mut last_data = Instant::now();

        while self.pending.len() < wanted {
            if self.drain_packets()? {
                last_data = Instant::now();
                continue;
            }
            let idle = last_data.elapsed();
            if idle >= grace {
                // Pad with as much silence as time went by, so a long grace
                // does not shorten the track. The surplus serves later reads.
                let silent = self.format.frames_in(idle) * self.format.channels as usize;
                let target = (self.pending.len() + silent).max(wanted);
                trace!(
                    padded = target - self.pending.len(),
                    "No loopback data, padding with silence"
                );
                self.pending.resize(target, 0.0);
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }

        let samples: Vec<f32> = self.pending.drain(..wanted).collect();
        let block = AudioBlock::new(samples, self.format.channels, self.sequence);
        self.sequence += 1;
        Ok(block)
    }

    fn format(&self) -> StreamFormat {
        self.format
    }
}

impl Drop for WasapiLoopbackSource {
    fn drop(&mut self) {
        unsafe {
            let _ = self.audio_client.Stop();
        }
        debug!(blocks = self.sequence, "Loopback stream stopped");
    }
}
