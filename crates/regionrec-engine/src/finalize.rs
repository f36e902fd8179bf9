//! Turning capture output into the deliverable.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use regionrec_encoder::{prepare_audio_track, AudioTrack, GifAssembler, MuxJob, Muxer, VideoSummary};
use regionrec_ipc::ErrorReport;

use crate::paths::SessionPaths;

/// Combine the temporary MP4 with the audio track, if one is usable.
///
/// Audio longer than the video is cut to the video's length first. A failed
/// mux falls back to the raw temporary video when it is still on disk. Once
/// audio is in the file, audio errors are reported as notices only.
#[instrument(name = "finalize_mp4", skip_all, fields(frames = video.frames))]
pub(crate) fn finalize_mp4(
    video: VideoSummary,
    paths: &SessionPaths,
    audio_joined: bool,
    muxer: &dyn Muxer,
    errors: &mut ErrorReport,
) -> Option<PathBuf> {
    if video.frames == 0 {
        if errors.video_error.is_none() {
            errors.set_video("no frames were captured");
        }
        return None;
    }

    let track = if audio_joined {
        match prepare_audio_track(&paths.audio, video.duration()) {
            Ok(track) => track,
            Err(e) => {
                errors.set_audio(format!("could not prepare audio track: {e}"));
                AudioTrack::Missing
            }
        }
    } else {
        AudioTrack::Missing
    };

    if track == AudioTrack::Empty && errors.audio_error.is_none() {
        errors.set_audio("no audio samples were captured");
    }

    if track.is_ready() {
        let job = MuxJob {
            video: video.path.clone(),
            audio: paths.audio.clone(),
            output: paths.output.clone(),
        };
        return match muxer.mux(&job) {
            Ok(()) => {
                errors.downgrade_audio_error();
                info!(output = %paths.output.display(), "Recording saved with audio");
                Some(paths.output.clone())
            }
            Err(e) => {
                errors.set_video(format!("mux failed: {e}"));
                salvage(&video.path)
            }
        };
    }

    match fs::rename(&video.path, &paths.output) {
        Ok(()) => {
            info!(output = %paths.output.display(), "Recording saved without audio");
            Some(paths.output.clone())
        }
        Err(e) => {
            errors.set_video(format!("could not move video into place: {e}"));
            salvage(&video.path)
        }
    }
}

/// Encode the buffered frames straight to the output path. No fallback.
#[instrument(name = "finalize_gif", skip_all, fields(frames = frames.len()))]
pub(crate) fn finalize_gif(
    frames: GifAssembler,
    paths: &SessionPaths,
    errors: &mut ErrorReport,
) -> Option<PathBuf> {
    match frames.encode(&paths.output) {
        Ok(summary) => {
            info!(output = %summary.path.display(), frames = summary.frames, "GIF saved");
            Some(summary.path)
        }
        Err(e) => {
            errors.set_video(format!("GIF encoding failed: {e}"));
            None
        }
    }
}

/// Delete the temporaries, except `keep`.
pub(crate) fn cleanup(paths: &SessionPaths, keep: Option<&Path>) {
    for temp in [&paths.video, &paths.audio] {
        if Some(temp.as_path()) == keep || !temp.exists() {
            continue;
        }
        match fs::remove_file(temp) {
            Ok(()) => debug!(path = %temp.display(), "Removed temporary file"),
            Err(e) => warn!(path = %temp.display(), error = %e, "Failed to remove temporary file"),
        }
    }
}

fn salvage(raw: &Path) -> Option<PathBuf> {
    if raw.exists() {
        warn!(path = %raw.display(), "Keeping raw video as the recording");
        Some(raw.to_path_buf())
    } else {
        None
    }
}
