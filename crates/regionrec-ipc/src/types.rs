//! Common types shared between the recorder core and its callers.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Smallest width/height a region picker should hand to the recorder.
pub const MIN_REGION_SIZE: u32 = 10;

/// Errors produced when building or validating recording inputs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SettingsError {
    /// Region has a zero dimension.
    #[error("capture region must have a positive size, got {width}x{height}")]
    EmptyRegion { width: u32, height: u32 },

    /// Frame rate of zero.
    #[error("frame rate must be positive")]
    ZeroFps,

    /// Unknown output format string.
    #[error("unknown output format: {0}")]
    UnknownFormat(String),
}

/// A rectangle of screen pixels, top-left corner plus size.
///
/// Serialized as `[left, top, width, height]` to match the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i64; 4]", into = "[i64; 4]")]
pub struct CaptureRegion {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    /// Create a region, rejecting zero-sized rectangles.
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Result<Self, SettingsError> {
        let region = Self {
            left,
            top,
            width,
            height,
        };
        region.validate()?;
        Ok(region)
    }

    /// Build a region from two drag corners in any order.
    pub fn from_corners(x1: i32, y1: i32, x2: i32, y2: i32) -> Result<Self, SettingsError> {
        let left = x1.min(x2);
        let top = y1.min(y2);
        let width = x1.abs_diff(x2);
        let height = y1.abs_diff(y2);
        Self::new(left, top, width, height)
    }

    /// Check that both dimensions are positive.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.width == 0 || self.height == 0 {
            return Err(SettingsError::EmptyRegion {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Returns true if the region is at least [`MIN_REGION_SIZE`] on both axes.
    pub fn meets_minimum(&self) -> bool {
        self.width >= MIN_REGION_SIZE && self.height >= MIN_REGION_SIZE
    }
}

impl From<[i64; 4]> for CaptureRegion {
    fn from(v: [i64; 4]) -> Self {
        Self {
            left: v[0].clamp(i32::MIN as i64, i32::MAX as i64) as i32,
            top: v[1].clamp(i32::MIN as i64, i32::MAX as i64) as i32,
            width: v[2].clamp(0, u32::MAX as i64) as u32,
            height: v[3].clamp(0, u32::MAX as i64) as u32,
        }
    }
}

impl From<CaptureRegion> for [i64; 4] {
    fn from(r: CaptureRegion) -> Self {
        [r.left as i64, r.top as i64, r.width as i64, r.height as i64]
    }
}

impl fmt::Display for CaptureRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} at ({}, {})",
            self.width, self.height, self.left, self.top
        )
    }
}

/// Deliverable container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// H.264/AAC video with system audio.
    #[default]
    Mp4,

    /// Animated GIF, never with audio.
    Gif,
}

impl OutputFormat {
    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Gif => "gif",
        }
    }

    /// Whether recordings in this format capture system audio.
    pub fn has_audio(self) -> bool {
        matches!(self, Self::Mp4)
    }
}

impl FromStr for OutputFormat {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp4" => Ok(Self::Mp4),
            "gif" => Ok(Self::Gif),
            other => Err(SettingsError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Everything a session needs to know, fixed once recording starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingSettings {
    /// Screen rectangle to capture.
    pub region: CaptureRegion,

    /// Directory receiving the deliverable and the temporary files.
    pub output_dir: PathBuf,

    /// Target frames per second.
    pub fps: u32,

    /// Deliverable container.
    pub output_format: OutputFormat,
}

impl RecordingSettings {
    /// Create settings with the default 30 fps MP4 output.
    pub fn new(region: CaptureRegion, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            region,
            output_dir: output_dir.into(),
            fps: 30,
            output_format: OutputFormat::Mp4,
        }
    }

    /// Override the frame rate.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    /// Override the output format.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Check region and frame rate.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.region.validate()?;
        if self.fps == 0 {
            return Err(SettingsError::ZeroFps);
        }
        Ok(())
    }
}

/// Non-fatal problems collected during a session.
///
/// Each field is written by one capture thread (or by finalize) and read
/// only after the threads have been joined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Last video capture, encode, mux or GIF error.
    pub video_error: Option<String>,

    /// Why the recording has no audio track.
    pub audio_error: Option<String>,

    /// Audio trouble that did not cost the track, such as dropped blocks.
    #[serde(default)]
    pub audio_notice: Option<String>,
}

impl ErrorReport {
    /// Returns true if nothing went wrong.
    pub fn is_empty(&self) -> bool {
        self.video_error.is_none() && self.audio_error.is_none() && self.audio_notice.is_none()
    }

    /// Record a video error, replacing any earlier one.
    pub fn set_video(&mut self, message: impl Into<String>) {
        self.video_error = Some(message.into());
    }

    /// Record an audio error, replacing any earlier one.
    pub fn set_audio(&mut self, message: impl Into<String>) {
        self.audio_error = Some(message.into());
    }

    /// Record a non-fatal audio problem, replacing any earlier one.
    pub fn note_audio(&mut self, message: impl Into<String>) {
        self.audio_notice = Some(message.into());
    }

    /// The audio track made it into the file after all: keep the error
    /// as a notice only.
    pub fn downgrade_audio_error(&mut self) {
        if let Some(e) = self.audio_error.take() {
            self.audio_notice = Some(e);
        }
    }

    /// Messages a caller should show next to a "saved" notice.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if let Some(ref e) = self.video_error {
            warnings.push(format!("video: {e}"));
        }
        if let Some(ref e) = self.audio_error {
            warnings.push(format!("no system audio was captured ({e})"));
        }
        if let Some(ref e) = self.audio_notice {
            warnings.push(format!("system audio may have gaps ({e})"));
        }
        warnings
    }
}

/// What `stop()` hands back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingOutcome {
    /// Deliverable (or last-resort raw video) on disk, if any.
    pub output_path: Option<PathBuf>,

    /// Problems collected from capture and finalize.
    pub errors: ErrorReport,
}

impl RecordingOutcome {
    /// Returns true if a file was produced.
    pub fn is_saved(&self) -> bool {
        self.output_path.is_some()
    }

    /// One-line summary suitable for a notification.
    pub fn summary(&self) -> String {
        match (&self.output_path, self.errors.is_empty()) {
            (Some(path), true) => format!("Saved {}", path.display()),
            (Some(path), false) => format!(
                "Saved {}, with warnings: {}",
                path.display(),
                self.errors.warnings().join("; ")
            ),
            (None, _) => {
                let warnings = self.errors.warnings();
                if warnings.is_empty() {
                    "Nothing was recorded".to_string()
                } else {
                    format!("Recording failed: {}", warnings.join("; "))
                }
            }
        }
    }
}

/// A loopback-capable audio endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioDevice {
    /// Platform identifier used to reopen the device.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Whether this is the default render endpoint.
    pub is_default: bool,
}

/// Classification of a loopback trial capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeStatus {
    /// No loopback device matched.
    NoDevice,

    /// The trial capture returned no samples.
    EmptyData,

    /// Samples arrived but all below the silence threshold.
    Silent,

    /// Samples arrived with audible content.
    Ok,

    /// Opening or reading the device failed.
    Failed,
}

/// Result of the advisory loopback check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Whether system audio can be recorded.
    pub available: bool,

    /// Machine-readable classification.
    pub status: ProbeStatus,

    /// Human-readable explanation.
    pub message: String,

    /// Device that was tried, if any.
    pub device: Option<String>,

    /// Peak absolute amplitude of the trial capture.
    pub peak: f32,
}

/// Capture counters for a running or finished session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Frames handed to the video sink.
    pub frames_captured: u64,

    /// Grab or write failures that were skipped.
    pub frame_errors: u64,

    /// Audio blocks written to the PCM sink.
    pub audio_blocks: u64,

    /// Audio read or write failures that were skipped.
    pub audio_errors: u64,

    /// Effective capture rate since start.
    pub fps: f32,

    /// Target capture rate.
    pub target_fps: u32,

    /// Time since start in milliseconds.
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_rejects_zero_size() {
        assert_eq!(
            CaptureRegion::new(0, 0, 0, 10),
            Err(SettingsError::EmptyRegion {
                width: 0,
                height: 10
            })
        );
        assert!(CaptureRegion::new(5, 5, 1, 1).is_ok());
    }

    #[test]
    fn test_region_from_corners_normalizes() {
        let region = CaptureRegion::from_corners(300, 40, 100, 240).unwrap();
        assert_eq!(region.left, 100);
        assert_eq!(region.top, 40);
        assert_eq!(region.width, 200);
        assert_eq!(region.height, 200);
    }

    #[test]
    fn test_region_minimum_size() {
        assert!(!CaptureRegion::new(0, 0, 9, 100).unwrap().meets_minimum());
        assert!(CaptureRegion::new(0, 0, 10, 10).unwrap().meets_minimum());
    }

    #[test]
    fn test_region_serializes_as_array() {
        let region = CaptureRegion::new(-1920, 0, 640, 480).unwrap();
        let json = serde_json::to_string(&region).unwrap();
        assert_eq!(json, "[-1920,0,640,480]");

        let back: CaptureRegion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, region);
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("MP4".parse::<OutputFormat>(), Ok(OutputFormat::Mp4));
        assert_eq!(" gif ".parse::<OutputFormat>(), Ok(OutputFormat::Gif));
        assert!("webm".parse::<OutputFormat>().is_err());
        assert!(OutputFormat::Mp4.has_audio());
        assert!(!OutputFormat::Gif.has_audio());
    }

    #[test]
    fn test_settings_validate() {
        let region = CaptureRegion::new(0, 0, 100, 100).unwrap();
        let settings = RecordingSettings::new(region, "/tmp").with_fps(0);
        assert_eq!(settings.validate(), Err(SettingsError::ZeroFps));
        assert!(settings.with_fps(24).validate().is_ok());
    }

    #[test]
    fn test_error_report_audio_notice_wording() {
        let mut report = ErrorReport::default();
        report.note_audio("3 audio blocks were dropped");
        assert!(!report.is_empty());
        assert_eq!(
            report.warnings(),
            vec!["system audio may have gaps (3 audio blocks were dropped)".to_string()]
        );

        report.set_audio("close failed");
        report.downgrade_audio_error();
        assert!(report.audio_error.is_none());
        assert_eq!(report.audio_notice.as_deref(), Some("close failed"));
        assert!(!report.warnings()[0].contains("no system audio"));
    }

    #[test]
    fn test_outcome_summary() {
        let outcome = RecordingOutcome {
            output_path: Some(PathBuf::from("out.mp4")),
            errors: ErrorReport {
                video_error: None,
                audio_error: Some("no device".into()),
                audio_notice: None,
            },
        };
        assert!(outcome.summary().contains("no system audio was captured"));
        assert_eq!(
            RecordingOutcome::default().summary(),
            "Nothing was recorded"
        );
    }
}
