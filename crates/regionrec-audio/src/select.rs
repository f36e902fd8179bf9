//! Choosing which loopback endpoint to record.

use regionrec_ipc::AudioDevice;

/// Name fragments the legacy heuristic treats as "speaker" endpoints.
pub const DEFAULT_SPEAKER_HINTS: [&str; 2] = ["Speaker", "扬声器"];

/// How the recorder picks a loopback device out of the enumerated list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoopbackPolicy {
    /// The default render endpoint, falling back to the first endpoint.
    #[default]
    DefaultEndpoint,

    /// The first endpoint whose name contains any of the hints.
    NameHints(Vec<String>),
}

impl LoopbackPolicy {
    /// Name matching with [`DEFAULT_SPEAKER_HINTS`].
    pub fn speaker_names() -> Self {
        Self::NameHints(DEFAULT_SPEAKER_HINTS.iter().map(|s| s.to_string()).collect())
    }
}

/// Apply `policy` to `devices`. Deterministic for a given list order.
pub fn select_loopback_device<'a>(
    devices: &'a [AudioDevice],
    policy: &LoopbackPolicy,
) -> Option<&'a AudioDevice> {
    match policy {
        LoopbackPolicy::DefaultEndpoint => devices
            .iter()
            .find(|d| d.is_default)
            .or_else(|| devices.first()),
        LoopbackPolicy::NameHints(hints) => devices
            .iter()
            .find(|d| hints.iter().any(|hint| d.name.contains(hint.as_str()))),
    }
}
