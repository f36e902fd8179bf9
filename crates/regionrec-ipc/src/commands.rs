//! Commands sent from a front-end to the engine.

use serde::{Deserialize, Serialize};

use crate::types::RecordingSettings;

/// Commands that a front-end (CLI, hotkey handler, tray) can send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RecorderCommand {
    /// Start recording with the given settings.
    Start { settings: RecordingSettings },

    /// Stop the current recording and finalize it.
    Stop,

    /// Stop if recording, otherwise start with the given settings.
    Toggle { settings: RecordingSettings },

    /// Run the loopback audio check.
    ProbeAudio,

    /// Request current session state.
    GetState,

    /// Stop any recording and shut the engine down.
    Shutdown,
}
