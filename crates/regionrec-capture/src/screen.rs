//! Region grabbing from a monitor via xcap.

use std::time::Instant;

use bytes::Bytes;
use tracing::{debug, instrument, warn};
use xcap::Monitor;

use regionrec_ipc::CaptureRegion;

use crate::error::CaptureError;
use crate::frame::{CaptureTimestamp, CapturedFrame};
use crate::{CaptureResult, FrameSource};

/// Grabs one fixed rectangle of the monitor containing the region's origin.
///
/// Not `Send`: open it on the thread that will call [`FrameSource::grab`].
pub struct ScreenRegionSource {
    monitor: Monitor,
    offset_x: u32,
    offset_y: u32,
    width: u32,
    height: u32,
    start_time: Instant,
    sequence: u64,
}

impl ScreenRegionSource {
    /// Resolve the monitor and clamp the region to it.
    #[instrument(name = "screen_source_open", skip_all, fields(region = %region))]
    pub fn open(region: &CaptureRegion) -> CaptureResult<Self> {
        let monitor =
            Monitor::from_point(region.left, region.top).map_err(|_| CaptureError::MonitorNotFound {
                x: region.left,
                y: region.top,
            })?;

        let mon_x = monitor.x()?;
        let mon_y = monitor.y()?;
        let mon_w = monitor.width()?;
        let mon_h = monitor.height()?;

        let offset_x = region.left.saturating_sub(mon_x).max(0) as u32;
        let offset_y = region.top.saturating_sub(mon_y).max(0) as u32;
        let width = region.width.min(mon_w.saturating_sub(offset_x));
        let height = region.height.min(mon_h.saturating_sub(offset_y));

        if width == 0 || height == 0 {
            return Err(CaptureError::RegionOutOfBounds(region.to_string()));
        }
        if width != region.width || height != region.height {
            warn!(
                width,
                height, "Region extends past its monitor, capturing the visible part only"
            );
        }

        debug!(offset_x, offset_y, width, height, "Screen source ready");

        Ok(Self {
            monitor,
            offset_x,
            offset_y,
            width,
            height,
            start_time: Instant::now(),
            sequence: 0,
        })
    }
}

impl FrameSource for ScreenRegionSource {
    fn grab(&mut self) -> CaptureResult<CapturedFrame> {
        let image =
            self.monitor
                .capture_region(self.offset_x, self.offset_y, self.width, self.height)?;

        let (width, height) = image.dimensions();
        let frame = CapturedFrame::new(
            Bytes::from(image.into_raw()),
            width,
            height,
            CaptureTimestamp::now(self.start_time),
            self.sequence,
        );
        self.sequence += 1;
        Ok(frame)
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
