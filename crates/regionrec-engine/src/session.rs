//! The recording session state machine.

use std::fs;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use regionrec_audio::{LoopbackPolicy, BLOCK_FRAMES};
use regionrec_encoder::DEFAULT_GIF_SPEED;
use regionrec_ipc::{ErrorReport, RecordingOutcome, RecordingSettings, SessionState, SessionStats};

use crate::backend::{MediaBackend, SystemBackend};
use crate::error::SessionError;
use crate::finalize::{cleanup, finalize_gif, finalize_mp4};
use crate::paths::SessionPaths;
use crate::slot::{SessionSlot, SlotClaim};
use crate::stats::CaptureStats;
use crate::SessionResult;
use crate::worker::{
    run_audio_loop, run_video_loop, AudioJob, AudioOutput, RunFlag, VideoJob, VideoOutput,
    VideoProduct,
};

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Called with `(previous, current)` on every state change.
pub type StateObserver = Box<dyn Fn(SessionState, SessionState) + Send + Sync>;

/// Tunables that are not part of the per-recording settings.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// How long `stop()` waits for each capture thread.
    pub join_timeout: Duration,

    /// Which loopback endpoint records system audio.
    pub loopback_policy: LoopbackPolicy,

    /// Sample frames per audio read.
    pub audio_block_frames: usize,

    /// GIF quantizer speed (1..=30).
    pub gif_speed: i32,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            join_timeout: Duration::from_secs(5),
            loopback_policy: LoopbackPolicy::default(),
            audio_block_frames: BLOCK_FRAMES,
            gif_speed: DEFAULT_GIF_SPEED,
        }
    }
}

struct ActiveRecording {
    settings: RecordingSettings,
    paths: SessionPaths,
    run: RunFlag,
    video: JoinHandle<VideoOutput>,
    audio: Option<JoinHandle<AudioOutput>>,
    claim: SlotClaim,
}

enum JoinFailure {
    TimedOut,
    Panicked,
}

/// One recording, from `start()` to the file returned by `stop()`.
///
/// Sessions are single-use. Only one session per [`SessionSlot`] can be
/// recording, stopping or finalizing at a time.
pub struct RecordingSession {
    backend: Arc<dyn MediaBackend>,
    options: SessionOptions,
    slot: Arc<SessionSlot>,
    state: SessionState,
    errors: ErrorReport,
    stats: Arc<CaptureStats>,
    active: Option<ActiveRecording>,
    observer: Option<StateObserver>,
}

impl RecordingSession {
    /// A session on the real screen, loopback device and ffmpeg.
    pub fn new() -> Self {
        Self::with_backend(Arc::new(SystemBackend::new()))
    }

    /// A session on a custom backend, sharing the global slot.
    pub fn with_backend(backend: Arc<dyn MediaBackend>) -> Self {
        Self {
            backend,
            options: SessionOptions::default(),
            slot: SessionSlot::global(),
            state: SessionState::Idle,
            errors: ErrorReport::default(),
            stats: Arc::new(CaptureStats::new()),
            active: None,
            observer: None,
        }
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Use `slot` instead of the process-wide one.
    pub fn with_slot(mut self, slot: Arc<SessionSlot>) -> Self {
        self.slot = slot;
        self
    }

    pub fn on_state_change(
        mut self,
        observer: impl Fn(SessionState, SessionState) + Send + Sync + 'static,
    ) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True while recording, stopping or finalizing.
    pub fn is_running(&self) -> bool {
        self.state.is_hot()
    }

    /// Errors from the last `stop()`.
    pub fn last_errors(&self) -> &ErrorReport {
        &self.errors
    }

    pub fn stats(&self) -> SessionStats {
        self.stats.snapshot()
    }

    /// Settings of the recording in progress.
    pub fn settings(&self) -> Option<&RecordingSettings> {
        self.active.as_ref().map(|a| &a.settings)
    }

    /// Begin capturing. Returns as soon as the capture threads are running.
    #[instrument(name = "session_start", skip_all, fields(region = %settings.region, fps = settings.fps, format = %settings.output_format))]
    pub fn start(&mut self, settings: RecordingSettings) -> SessionResult<()> {
        if self.state.is_hot() {
            return Err(SessionError::AlreadyRunning);
        }
        if self.state.is_terminal() {
            return Err(SessionError::SessionConsumed);
        }

        settings.validate()?;
        let claim = self.slot.claim().ok_or(SessionError::AlreadyRunning)?;

        fs::create_dir_all(&settings.output_dir)?;
        let paths = SessionPaths::allocate(&settings.output_dir, settings.output_format);

        self.errors = ErrorReport::default();
        self.stats.start(settings.fps);

        let run = RunFlag::new();
        run.raise();

        let video_job = VideoJob {
            backend: Arc::clone(&self.backend),
            settings: settings.clone(),
            temp_path: paths.video.clone(),
            gif_speed: self.options.gif_speed,
            run: run.clone(),
            stats: Arc::clone(&self.stats),
        };
        let video = thread::Builder::new()
            .name("regionrec-video".to_string())
            .spawn(move || run_video_loop(video_job))?;

        let audio = if settings.output_format.has_audio() {
            let audio_job = AudioJob {
                backend: Arc::clone(&self.backend),
                policy: self.options.loopback_policy.clone(),
                block_frames: self.options.audio_block_frames,
                temp_path: paths.audio.clone(),
                run: run.clone(),
                stats: Arc::clone(&self.stats),
            };
            let spawned = thread::Builder::new()
                .name("regionrec-audio".to_string())
                .spawn(move || run_audio_loop(audio_job));
            match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    run.clear();
                    let deadline = Instant::now() + self.options.join_timeout;
                    if join_bounded(video, deadline).is_err() {
                        warn!("Video thread did not exit after a failed launch");
                    }
                    cleanup(&paths, None);
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        info!(output = %paths.output.display(), "Recording started");

        self.active = Some(ActiveRecording {
            settings,
            paths,
            run,
            video,
            audio,
            claim,
        });
        self.transition_to(SessionState::Recording);
        Ok(())
    }

    /// Stop capturing and produce the deliverable.
    ///
    /// Never fails: problems are reported in the returned [`ErrorReport`].
    /// Does nothing unless the session is recording.
    #[instrument(name = "session_stop", skip(self))]
    pub fn stop(&mut self) -> RecordingOutcome {
        if self.state != SessionState::Recording {
            debug!(state = %self.state.name(), "Not recording, ignoring stop");
            return self.idle_outcome();
        }
        let Some(active) = self.active.take() else {
            return self.idle_outcome();
        };
        let ActiveRecording {
            settings,
            paths,
            run,
            video,
            audio,
            claim,
        } = active;

        self.transition_to(SessionState::Stopping);
        run.clear();

        let mut errors = ErrorReport::default();
        let timeout = self.options.join_timeout;
        let deadline = Instant::now() + timeout;

        let video_output = match join_bounded(video, deadline) {
            Ok(output) => {
                if let Some(e) = output.error {
                    errors.set_video(e);
                }
                Some(output.product)
            }
            Err(JoinFailure::TimedOut) => {
                errors.set_video(format!("video capture did not stop within {timeout:?}"));
                None
            }
            Err(JoinFailure::Panicked) => {
                errors.set_video("video capture thread panicked");
                None
            }
        };

        let audio_joined = match audio {
            None => false,
            Some(handle) => match join_bounded(handle, deadline) {
                Ok(output) => {
                    debug!(frames = output.frames, dropped = output.dropped_blocks, "Audio thread joined");
                    if let Some(note) = output.dropout_summary() {
                        errors.note_audio(note);
                    }
                    if let Some(e) = output.error {
                        errors.set_audio(e);
                    }
                    true
                }
                Err(JoinFailure::TimedOut) => {
                    errors.set_audio(format!("audio capture did not stop within {timeout:?}"));
                    false
                }
                Err(JoinFailure::Panicked) => {
                    errors.set_audio("audio capture thread panicked");
                    false
                }
            },
        };

        self.stats.stop();
        self.transition_to(SessionState::Finalizing);

        let output_path = match video_output {
            Some(VideoProduct::Encoded(summary)) => finalize_mp4(
                summary,
                &paths,
                audio_joined,
                self.backend.muxer(),
                &mut errors,
            ),
            Some(VideoProduct::Frames(frames)) => finalize_gif(frames, &paths, &mut errors),
            Some(VideoProduct::Nothing) | None => None,
        };
        cleanup(&paths, output_path.as_deref());

        for warning in errors.warnings() {
            warn!(%warning, format = %settings.output_format, "Recording finished with a problem");
        }

        self.errors = errors.clone();
        drop(claim);

        if output_path.is_some() {
            self.transition_to(SessionState::Completed);
        } else {
            self.transition_to(SessionState::Failed);
        }

        RecordingOutcome {
            output_path,
            errors,
        }
    }

    fn idle_outcome(&self) -> RecordingOutcome {
        RecordingOutcome {
            output_path: None,
            errors: self.errors.clone(),
        }
    }

    fn transition_to(&mut self, new_state: SessionState) {
        let previous = self.state;
        debug_assert!(
            previous.can_transition_to(new_state),
            "illegal transition {previous:?} -> {new_state:?}"
        );
        self.state = new_state;

        debug!(
            previous = %previous.name(),
            current = %new_state.name(),
            "State transition"
        );

        if let Some(observer) = &self.observer {
            observer(previous, new_state);
        }
    }
}

impl Default for RecordingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if self.state == SessionState::Recording {
            warn!("Recording session dropped while recording, finalizing");
            let _ = self.stop();
        }
    }
}

/// Wait for `handle` until `deadline`; a thread still running then is detached.
fn join_bounded<T>(handle: JoinHandle<T>, deadline: Instant) -> Result<T, JoinFailure> {
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!(thread = ?handle.thread().name(), "Capture thread did not stop in time, detaching");
            return Err(JoinFailure::TimedOut);
        }
        thread::sleep(JOIN_POLL_INTERVAL);
    }
    handle.join().map_err(|_| JoinFailure::Panicked)
}
