//! Captured frame types.

use bytes::Bytes;
use std::time::Instant;

use crate::error::CaptureError;
use crate::CaptureResult;

/// Timestamp for a captured frame.
#[derive(Debug, Clone, Copy)]
pub struct CaptureTimestamp {
    /// Monotonic timestamp when the frame was captured.
    pub capture_time: Instant,

    /// Offset from the start of capture in 100ns units.
    pub pts_100ns: u64,
}

impl CaptureTimestamp {
    /// Create a new capture timestamp.
    pub fn now(start_time: Instant) -> Self {
        let capture_time = Instant::now();
        let elapsed = capture_time.duration_since(start_time);
        let pts_100ns = elapsed.as_nanos() as u64 / 100;

        Self {
            capture_time,
            pts_100ns,
        }
    }
}

/// A captured video frame.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// RGBA8 pixel data, rows packed without padding.
    pub data: Bytes,

    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Capture timestamp.
    pub timestamp: CaptureTimestamp,

    /// Monotonically increasing sequence number.
    pub sequence: u64,
}

impl CapturedFrame {
    /// Create a new captured frame.
    pub fn new(
        data: Bytes,
        width: u32,
        height: u32,
        timestamp: CaptureTimestamp,
        sequence: u64,
    ) -> Self {
        Self {
            data,
            width,
            height,
            timestamp,
            sequence,
        }
    }

    /// Expected RGBA buffer size for given dimensions.
    pub fn rgba_buffer_size(width: u32, height: u32) -> usize {
        width as usize * height as usize * 4
    }

    /// Validate that the frame data matches expected dimensions.
    pub fn is_valid(&self) -> bool {
        self.data.len() == Self::rgba_buffer_size(self.width, self.height)
    }

    /// Drop the alpha channel, producing packed RGB24 as read by the MP4 sink.
    pub fn to_rgb24(&self) -> CaptureResult<Vec<u8>> {
        if !self.is_valid() {
            return Err(CaptureError::FrameConversion(format!(
                "expected {} bytes for {}x{} RGBA, got {}",
                Self::rgba_buffer_size(self.width, self.height),
                self.width,
                self.height,
                self.data.len()
            )));
        }

        let mut rgb = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for px in self.data.chunks_exact(4) {
            rgb.extend_from_slice(&px[..3]);
        }
        Ok(rgb)
    }
}
