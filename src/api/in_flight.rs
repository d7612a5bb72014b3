use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Single-slot guard for a component that must never have two requests of
/// the same kind outstanding. Each owner holds its own guard; clones share
/// the slot.
#[derive(Debug, Clone, Default)]
pub struct InFlightGuard {
    busy: Arc<AtomicBool>,
}

/// Holds the slot until dropped.
#[derive(Debug)]
pub struct InFlightTicket {
    busy: Arc<AtomicBool>,
}

impl InFlightGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<InFlightTicket> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightTicket {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
