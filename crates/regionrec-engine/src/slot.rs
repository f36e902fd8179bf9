//! Process-wide "one hot session" guard.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::debug;

static GLOBAL_SLOT: OnceLock<Arc<SessionSlot>> = OnceLock::new();

/// At most one claim is outstanding at any time.
#[derive(Debug, Default)]
pub struct SessionSlot {
    taken: AtomicBool,
}

impl SessionSlot {
    /// A private slot, for callers that want isolated sessions.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The slot shared by every session that does not bring its own.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL_SLOT.get_or_init(Self::new))
    }

    /// Take the slot. Returns `None` while another claim is alive.
    pub fn claim(self: &Arc<Self>) -> Option<SlotClaim> {
        self.taken
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| {
                debug!("Session slot claimed");
                SlotClaim {
                    slot: Arc::clone(self),
                }
            })
    }

    /// Whether a claim is alive.
    pub fn is_taken(&self) -> bool {
        self.taken.load(Ordering::Acquire)
    }
}

/// Releases the slot on drop.
#[derive(Debug)]
pub struct SlotClaim {
    slot: Arc<SessionSlot>,
}

impl Drop for SlotClaim {
    fn drop(&mut self) {
        self.slot.taken.store(false, Ordering::Release);
        debug!("Session slot released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_claim() {
        let slot = SessionSlot::new();
        let claim = slot.claim().unwrap();
        assert!(slot.is_taken());
        assert!(slot.claim().is_none());
        drop(claim);
        assert!(!slot.is_taken());
        assert!(slot.claim().is_some());
    }

    #[test]
    fn test_global_is_shared() {
        assert!(Arc::ptr_eq(&SessionSlot::global(), &SessionSlot::global()));
    }
}
