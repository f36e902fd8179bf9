//! Events sent from the engine to a front-end.

use serde::{Deserialize, Serialize};

use crate::state::SessionState;
use crate::types::{ProbeOutcome, RecordingOutcome, SessionStats};

/// Events that the engine can send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RecorderEvent {
    /// Engine is ready to accept commands.
    Ready,

    /// Session state has changed.
    StateChanged {
        previous: SessionState,
        current: SessionState,
    },

    /// Periodic capture counters while recording.
    Stats(SessionStats),

    /// A recording was stopped and finalized.
    Finished(RecordingOutcome),

    /// Result of a loopback audio check.
    AudioProbe(ProbeOutcome),

    /// A command could not be carried out.
    Error { message: String },

    /// Engine has shut down.
    Shutdown,
}
