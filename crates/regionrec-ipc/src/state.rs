//! Recording session state machine types.

use serde::{Deserialize, Serialize};

/// Lifecycle of a single recording session.
///
/// `Idle → Recording → Stopping → Finalizing → Completed | Failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Created, not started.
    #[default]
    Idle,

    /// Capture threads are running.
    Recording,

    /// Run flag cleared, waiting for capture threads.
    Stopping,

    /// Muxing or assembling the deliverable.
    Finalizing,

    /// A deliverable was produced.
    Completed,

    /// No deliverable was produced.
    Failed,
}

impl SessionState {
    /// Returns true while the session owns capture threads or temp files.
    pub fn is_hot(self) -> bool {
        matches!(self, Self::Recording | Self::Stopping | Self::Finalizing)
    }

    /// Returns true if the session is recording.
    pub fn is_recording(self) -> bool {
        matches!(self, Self::Recording)
    }

    /// Returns true once the session can no longer be used.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Recording)
                | (Self::Recording, Self::Stopping)
                | (Self::Stopping, Self::Finalizing)
                | (Self::Finalizing, Self::Completed)
                | (Self::Finalizing, Self::Failed)
        )
    }

    /// Returns a simple string representation of the state.
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Recording => "Recording",
            Self::Stopping => "Stopping",
            Self::Finalizing => "Finalizing",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hot_states() {
        assert!(!SessionState::Idle.is_hot());
        assert!(SessionState::Recording.is_hot());
        assert!(SessionState::Stopping.is_hot());
        assert!(SessionState::Finalizing.is_hot());
        assert!(!SessionState::Completed.is_hot());
        assert!(!SessionState::Failed.is_hot());
    }

    #[test]
    fn test_transitions_follow_lifecycle() {
        use SessionState::*;

        assert!(Idle.can_transition_to(Recording));
        assert!(Recording.can_transition_to(Stopping));
        assert!(Stopping.can_transition_to(Finalizing));
        assert!(Finalizing.can_transition_to(Completed));
        assert!(Finalizing.can_transition_to(Failed));

        assert!(!Idle.can_transition_to(Stopping));
        assert!(!Recording.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Recording));
    }
}
