//! Command loop driving recording sessions on behalf of a front-end.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info, instrument, warn};

use regionrec_audio::test_loopback_audio;
use regionrec_ipc::{RecorderCommand, RecorderEvent, RecordingSettings, SessionState};

use crate::backend::{MediaBackend, SystemBackend};
use crate::session::{RecordingSession, SessionOptions};
use crate::slot::SessionSlot;

const COMMAND_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Owns at most one live [`RecordingSession`] and reports on it.
pub struct Engine {
    command_rx: Receiver<RecorderCommand>,
    event_tx: Sender<RecorderEvent>,
    backend: Arc<dyn MediaBackend>,
    options: SessionOptions,
    slot: Arc<SessionSlot>,
    session: Option<RecordingSession>,
    stats_interval: Duration,
    last_stats: Instant,
}

impl Engine {
    /// Create an engine on the system backend and the global session slot.
    pub fn new(command_rx: Receiver<RecorderCommand>, event_tx: Sender<RecorderEvent>) -> Self {
        Self {
            command_rx,
            event_tx,
            backend: Arc::new(SystemBackend::new()),
            options: SessionOptions::default(),
            slot: SessionSlot::global(),
            session: None,
            stats_interval: Duration::from_secs(1),
            last_stats: Instant::now(),
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn MediaBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_slot(mut self, slot: Arc<SessionSlot>) -> Self {
        self.slot = slot;
        self
    }

    /// How often `Stats` events are sent while recording.
    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    /// Run the engine (blocking) until `Shutdown` or the command channel closes.
    #[instrument(name = "engine_run", skip(self))]
    pub fn run(&mut self) {
        info!("Engine starting");
        self.send_event(RecorderEvent::Ready);

        loop {
            match self.command_rx.recv_timeout(COMMAND_POLL_INTERVAL) {
                Ok(command) => {
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.is_recording() && self.last_stats.elapsed() >= self.stats_interval {
                        self.emit_stats();
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    info!("Command channel disconnected, shutting down");
                    self.stop_recording();
                    break;
                }
            }
        }

        info!("Engine stopped");
    }

    /// Handle a command. Returns false if the engine should stop.
    fn handle_command(&mut self, command: RecorderCommand) -> bool {
        debug!(?command, "Handling command");

        match command {
            RecorderCommand::Start { settings } => self.start_recording(settings),
            RecorderCommand::Stop => self.stop_recording(),
            RecorderCommand::Toggle { settings } => {
                if self.is_recording() {
                    self.stop_recording();
                } else {
                    self.start_recording(settings);
                }
            }
            RecorderCommand::ProbeAudio => self.probe_audio(),
            RecorderCommand::GetState => self.send_state(),
            RecorderCommand::Shutdown => {
                self.stop_recording();
                self.send_event(RecorderEvent::Shutdown);
                return false;
            }
        }

        true
    }

    fn is_recording(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_running())
    }

    #[instrument(name = "engine_start_recording", skip_all)]
    fn start_recording(&mut self, settings: RecordingSettings) {
        if self.is_recording() {
            debug!("Already recording, ignoring start command");
            self.send_event(RecorderEvent::Error {
                message: "A recording is already in progress".to_string(),
            });
            return;
        }

        let event_tx = self.event_tx.clone();
        let mut session = RecordingSession::with_backend(Arc::clone(&self.backend))
            .with_options(self.options.clone())
            .with_slot(Arc::clone(&self.slot))
            .on_state_change(move |previous, current| {
                if let Err(e) = event_tx.try_send(RecorderEvent::StateChanged { previous, current }) {
                    warn!("Failed to send event: {}", e);
                }
            });

        match session.start(settings) {
            Ok(()) => {
                self.last_stats = Instant::now();
                self.session = Some(session);
            }
            Err(e) => {
                error!("Recording start failed: {}", e);
                self.send_event(RecorderEvent::Error {
                    message: e.to_string(),
                });
            }
        }
    }

    #[instrument(name = "engine_stop_recording", skip(self))]
    fn stop_recording(&mut self) {
        let Some(session) = self.session.as_mut() else {
            debug!("No session, ignoring stop command");
            return;
        };
        if !session.is_running() {
            debug!("Not recording, ignoring stop command");
            return;
        }

        let outcome = session.stop();
        let stats = session.stats();
        info!(summary = %outcome.summary(), frames = stats.frames_captured, "Recording finished");

        self.send_event(RecorderEvent::Stats(stats));
        self.send_event(RecorderEvent::Finished(outcome));
    }

    fn probe_audio(&self) {
        let outcome = test_loopback_audio(self.backend.loopback(), &self.options.loopback_policy);
        self.send_event(RecorderEvent::AudioProbe(outcome));
    }

    fn send_state(&self) {
        let state = self
            .session
            .as_ref()
            .map(|s| s.state())
            .unwrap_or(SessionState::Idle);
        self.send_event(RecorderEvent::StateChanged {
            previous: state,
            current: state,
        });
    }

    fn emit_stats(&mut self) {
        if let Some(session) = &self.session {
            self.send_event(RecorderEvent::Stats(session.stats()));
        }
        self.last_stats = Instant::now();
    }

    fn send_event(&self, event: RecorderEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("Failed to send event: {}", e);
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop_recording();
    }
}
