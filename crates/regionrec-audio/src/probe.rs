//! One-shot loopback check used to warn the user before recording.

use tracing::{debug, instrument, warn};

use regionrec_ipc::{ProbeOutcome, ProbeStatus};

use crate::block::AudioBlock;
use crate::select::{select_loopback_device, LoopbackPolicy};
use crate::{LoopbackProvider, StreamFormat};

/// Sample frames read by the trial capture.
pub const PROBE_FRAMES: usize = 100;

/// Peak amplitude below which a trial capture counts as silence.
pub const SILENCE_THRESHOLD: f32 = 0.0001;

/// Check that a loopback device exists and delivers samples.
///
/// Advisory only. A silent device is reported as available, since it works
/// and is simply not playing anything right now.
#[instrument(name = "loopback_probe", skip(provider))]
pub fn test_loopback_audio(provider: &dyn LoopbackProvider, policy: &LoopbackPolicy) -> ProbeOutcome {
    let devices = match provider.devices() {
        Ok(devices) => devices,
        Err(e) => return failed(None, format!("device enumeration failed: {e}")),
    };

    let Some(device) = select_loopback_device(&devices, policy) else {
        debug!(candidates = devices.len(), "No loopback device matched");
        return outcome(ProbeStatus::NoDevice, None, 0.0);
    };

    let mut source = match provider.open(device, StreamFormat::default()) {
        Ok(source) => source,
        Err(e) => return failed(Some(device.name.clone()), format!("could not open device: {e}")),
    };

    let block = match source.read_block(PROBE_FRAMES) {
        Ok(block) => block,
        Err(e) => return failed(Some(device.name.clone()), format!("trial capture failed: {e}")),
    };

    let result = classify(&block);
    debug!(device = %device.name, status = ?result, peak = block.peak(), "Loopback probe finished");
    outcome(result, Some(device.name.clone()), block.peak())
}

fn classify(block: &AudioBlock) -> ProbeStatus {
    if block.is_empty() {
        ProbeStatus::EmptyData
    } else if block.peak() < SILENCE_THRESHOLD {
        ProbeStatus::Silent
    } else {
        ProbeStatus::Ok
    }
}

fn outcome(status: ProbeStatus, device: Option<String>, peak: f32) -> ProbeOutcome {
    let (available, message) = match status {
        ProbeStatus::NoDevice => (false, "no device"),
        ProbeStatus::EmptyData => (false, "empty data"),
        ProbeStatus::Silent => (true, "device ok but silent"),
        ProbeStatus::Ok => (true, "ok"),
        ProbeStatus::Failed => (false, "probe failed"),
    };
    ProbeOutcome {
        available,
        status,
        message: message.to_string(),
        device,
        peak,
    }
}

fn failed(device: Option<String>, message: String) -> ProbeOutcome {
    warn!(%message, "Loopback probe failed");
    ProbeOutcome {
        available: false,
        status: ProbeStatus::Failed,
        message,
        device,
        peak: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AudioError, AudioResult, AudioSource};
    use regionrec_ipc::AudioDevice;

    struct ConstantSource {
        level: f32,
        frames: Option<usize>,
    }

    impl AudioSource for ConstantSource {
        fn read_block(&mut self, frames: usize) -> AudioResult<AudioBlock> {
            let n = self.frames.unwrap_or(frames) * 2;
            Ok(AudioBlock::new(vec![self.level; n], 2, 0))
        }

        fn format(&self) -> StreamFormat {
            StreamFormat::default()
        }
    }

    struct FakeProvider {
        devices: Vec<AudioDevice>,
        level: f32,
        frames: Option<usize>,
        open_fails: bool,
    }

    impl FakeProvider {
        fn speaker(level: f32) -> Self {
            Self {
                devices: vec![AudioDevice {
                    id: "{0.0.0}".to_string(),
                    name: "Speakers (Test)".to_string(),
                    is_default: true,
                }],
                level,
                frames: None,
                open_fails: false,
            }
        }
    }

    impl LoopbackProvider for FakeProvider {
        fn devices(&self) -> AudioResult<Vec<AudioDevice>> {
            Ok(self.devices.clone())
        }

        fn open(
            &self,
            device: &AudioDevice,
            _format: StreamFormat,
        ) -> AudioResult<Box<dyn AudioSource>> {
            if self.open_fails {
                return Err(AudioError::DeviceUnavailable(device.id.clone()));
            }
            Ok(Box::new(ConstantSource {
                level: self.level,
                frames: self.frames,
            }))
        }
    }

    #[test]
    fn test_probe_no_device() {
        let mut provider = FakeProvider::speaker(0.5);
        provider.devices.clear();
        let result = test_loopback_audio(&provider, &LoopbackPolicy::DefaultEndpoint);
        assert!(!result.available);
        assert_eq!(result.status, ProbeStatus::NoDevice);
        assert_eq!(result.message, "no device");
    }

    #[test]
    fn test_probe_name_hints_miss_is_no_device() {
        let provider = FakeProvider::speaker(0.5);
        let policy = LoopbackPolicy::NameHints(vec!["Headphones".to_string()]);
        let result = test_loopback_audio(&provider, &policy);
        assert_eq!(result.status, ProbeStatus::NoDevice);
    }

    #[test]
    fn test_probe_empty_data() {
        let mut provider = FakeProvider::speaker(0.5);
        provider.frames = Some(0);
        let result = test_loopback_audio(&provider, &LoopbackPolicy::DefaultEndpoint);
        assert!(!result.available);
        assert_eq!(result.message, "empty data");
    }

    #[test]
    fn test_probe_silent_is_available() {
        let provider = FakeProvider::speaker(0.00005);
        let result = test_loopback_audio(&provider, &LoopbackPolicy::DefaultEndpoint);
        assert!(result.available);
        assert_eq!(result.status, ProbeStatus::Silent);
        assert_eq!(result.message, "device ok but silent");
        assert_eq!(result.device.as_deref(), Some("Speakers (Test)"));
    }

    #[test]
    fn test_probe_ok() {
        let provider = FakeProvider::speaker(0.25);
        let result = test_loopback_audio(&provider, &LoopbackPolicy::speaker_names());
        assert!(result.available);
        assert_eq!(result.status, ProbeStatus::Ok);
        assert_eq!(result.message, "ok");
        assert!((result.peak - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn test_probe_open_failure() {
        let mut provider = FakeProvider::speaker(0.25);
        provider.open_fails = true;
        let result = test_loopback_audio(&provider, &LoopbackPolicy::DefaultEndpoint);
        assert!(!result.available);
        assert_eq!(result.status, ProbeStatus::Failed);
        assert!(result.message.starts_with("could not open device"));
    }
}
