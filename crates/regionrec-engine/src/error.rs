//! Error types for the engine module.

use thiserror::Error;

use regionrec_ipc::SettingsError;

/// Reasons `RecordingSession::start` can refuse to launch.
///
/// Capture and finalize problems are never raised; they are collected in
/// the `ErrorReport` that `stop()` returns.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Another session is recording, stopping or finalizing.
    #[error("A recording is already in progress")]
    AlreadyRunning,

    /// Settings failed validation.
    #[error("Invalid recording settings: {0}")]
    InvalidSettings(#[from] SettingsError),

    /// This session already ran to completion.
    #[error("Recording session has already been used")]
    SessionConsumed,

    /// Output directory or thread creation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
