//! Data model and typed front-end <-> engine messages for the region recorder.
//!
//! Every other crate in the workspace speaks in these types, so the capture,
//! audio and encoder crates stay independent of one another.

mod commands;
mod events;
mod state;
mod types;

pub use commands::RecorderCommand;
pub use events::RecorderEvent;
pub use state::SessionState;
pub use types::{
    AudioDevice, CaptureRegion, ErrorReport, OutputFormat, ProbeOutcome, ProbeStatus,
    RecordingOutcome, RecordingSettings, SessionStats, SettingsError, MIN_REGION_SIZE,
};

use crossbeam_channel::{Receiver, Sender};

/// Channel capacity for commands (front-end → engine).
pub const COMMAND_CHANNEL_CAPACITY: usize = 16;

/// Channel capacity for events (engine → front-end).
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Creates a bounded command channel.
pub fn command_channel() -> (Sender<RecorderCommand>, Receiver<RecorderCommand>) {
    crossbeam_channel::bounded(COMMAND_CHANNEL_CAPACITY)
}

/// Creates a bounded event channel.
pub fn event_channel() -> (Sender<RecorderEvent>, Receiver<RecorderEvent>) {
    crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY)
}
