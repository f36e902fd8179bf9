//! Per-session file names.

use std::path::{Path, PathBuf};

use chrono::Local;

use regionrec_ipc::OutputFormat;

/// Timestamp format shared by the deliverable and the temporaries.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// The deliverable and the temporary files of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    /// `recording_<ts>.<mp4|gif>`
    pub output: PathBuf,

    /// `video_<ts>.mp4` (MP4 mode only)
    pub video: PathBuf,

    /// `system_audio_<ts>.wav` (MP4 mode only)
    pub audio: PathBuf,
}

impl SessionPaths {
    /// Names stamped with the current local time.
    pub fn allocate(dir: &Path, format: OutputFormat) -> Self {
        let stamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        Self::with_stamp(dir, format, &stamp)
    }

    /// Names for `stamp`, adding `_<n>` to all three when any already exists.
    pub fn with_stamp(dir: &Path, format: OutputFormat, stamp: &str) -> Self {
        let mut attempt = 0u32;
        loop {
            let suffix = if attempt == 0 {
                String::new()
            } else {
                format!("_{attempt}")
            };
            let paths = Self {
                output: dir.join(format!("recording_{stamp}{suffix}.{}", format.extension())),
                video: dir.join(format!("video_{stamp}{suffix}.mp4")),
                audio: dir.join(format!("system_audio_{stamp}{suffix}.wav")),
            };
            if !paths.any_exists() {
                return paths;
            }
            attempt += 1;
        }
    }

    fn any_exists(&self) -> bool {
        self.output.exists() || self.video.exists() || self.audio.exists()
    }
}
