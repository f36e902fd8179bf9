//! Recording core for the region recorder.
//!
//! A [`RecordingSession`] runs one video capture thread and, for MP4, one
//! system audio thread, then finalizes their output into a single file.
//! [`Engine`] wraps sessions in a command/event loop for front-ends.

mod backend;
mod error;
mod finalize;
mod orchestrator;
mod pacing;
mod paths;
mod session;
mod slot;
mod stats;
#[cfg(test)]
mod testing;
mod worker;

pub use backend::{MediaBackend, SystemBackend};
pub use error::SessionError;
pub use orchestrator::Engine;
pub use pacing::FramePacer;
pub use paths::SessionPaths;
pub use session::{RecordingSession, SessionOptions, StateObserver};
pub use slot::{SessionSlot, SlotClaim};
pub use stats::CaptureStats;
pub use worker::RunFlag;

use crossbeam_channel::{Receiver, Sender};

use regionrec_ipc::{RecorderCommand, RecorderEvent};

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Create an engine instance with IPC channels.
pub fn create_engine(
    command_rx: Receiver<RecorderCommand>,
    event_tx: Sender<RecorderEvent>,
) -> Engine {
    Engine::new(command_rx, event_tx)
}
