//! Sample blocks and PCM conversion.

/// Full-scale value used when converting float samples to 16-bit PCM.
const PCM16_SCALE: f32 = 32767.0;

/// One block of interleaved float samples pulled from a source.
#[derive(Debug, Clone, Default)]
pub struct AudioBlock {
    /// Interleaved samples in `[-1.0, 1.0]` (not enforced).
    pub samples: Vec<f32>,

    /// Number of interleaved channels.
    pub channels: u16,

    /// Monotonically increasing sequence number.
    pub sequence: u64,
}

impl AudioBlock {
    /// Create a block.
    pub fn new(samples: Vec<f32>, channels: u16, sequence: u64) -> Self {
        Self {
            samples,
            channels,
            sequence,
        }
    }

    /// Returns true if the block carries no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of sample frames (samples per channel).
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Largest absolute sample value, ignoring NaN.
    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .filter(|s| !s.is_nan())
            .fold(0.0f32, |peak, s| peak.max(s.abs()))
    }

    /// Convert to signed 16-bit PCM.
    pub fn to_pcm16(&self) -> Vec<i16> {
        self.samples.iter().copied().map(f32_to_pcm16).collect()
    }
}

/// Scale `[-1, 1]` to `[-32767, 32767]`, clamping out-of-range input.
pub fn f32_to_pcm16(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    (sample.clamp(-1.0, 1.0) * PCM16_SCALE) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm16_scaling_and_clamping() {
        assert_eq!(f32_to_pcm16(0.0), 0);
        assert_eq!(f32_to_pcm16(1.0), 32767);
        assert_eq!(f32_to_pcm16(-1.0), -32767);
        assert_eq!(f32_to_pcm16(0.5), 16383);
        assert_eq!(f32_to_pcm16(3.0), 32767);
        assert_eq!(f32_to_pcm16(-7.5), -32767);
        assert_eq!(f32_to_pcm16(f32::NAN), 0);
    }

    #[test]
    fn test_block_peak_and_frames() {
        let block = AudioBlock::new(vec![0.1, -0.6, 0.3, 0.2], 2, 0);
        assert_eq!(block.frame_count(), 2);
        assert!((block.peak() - 0.6).abs() < f32::EPSILON);
        assert_eq!(block.to_pcm16().len(), 4);
    }

    #[test]
    fn test_empty_block() {
        let block = AudioBlock::default();
        assert!(block.is_empty());
        assert_eq!(block.frame_count(), 0);
        assert_eq!(block.peak(), 0.0);
    }
}
