//! Screen region grabbing for the region recorder.
//!
//! A [`FrameSource`] hands out one RGBA bitmap per call. The Windows build
//! grabs pixels through xcap; other platforms report
//! [`CaptureError::NotSupported`] so the rest of the pipeline can still be
//! exercised with synthetic sources.

mod error;
mod frame;
#[cfg(windows)]
mod screen;

pub use error::CaptureError;
pub use frame::{CaptureTimestamp, CapturedFrame};
#[cfg(windows)]
pub use screen::ScreenRegionSource;

use regionrec_ipc::CaptureRegion;

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;

/// A blocking producer of bitmaps for one fixed region.
pub trait FrameSource {
    /// Grab the region once.
    fn grab(&mut self) -> CaptureResult<CapturedFrame>;

    /// Width and height of the frames this source produces.
    fn dimensions(&self) -> (u32, u32);
}

/// Open a source for the given screen region.
#[cfg(windows)]
pub fn open_screen_region(region: &CaptureRegion) -> CaptureResult<Box<dyn FrameSource>> {
    Ok(Box::new(ScreenRegionSource::open(region)?))
}

/// Open a source for the given screen region (stub for non-Windows platforms).
#[cfg(not(windows))]
pub fn open_screen_region(_region: &CaptureRegion) -> CaptureResult<Box<dyn FrameSource>> {
    Err(CaptureError::NotSupported)
}
