//! Process-wide overlay-port allocation.
//!
//! Hardware overlay ports (XVideo ports and their DirectDraw analogue) are a
//! process-wide resource: a port grabbed by one surface must not be grabbed
//! by another, including surfaces belonging to different managers. The
//! registry owns that state with an explicit lifecycle so tests can reset it
//! between cases.

use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};

use tracing::debug;

fn grabbed() -> &'static Mutex<HashSet<u32>> {
    static GRABBED: OnceLock<Mutex<HashSet<u32>>> = OnceLock::new();
    GRABBED.get_or_init(|| Mutex::new(HashSet::new()))
}

/// The process-wide port allocator.
pub struct OverlayPortRegistry;

impl OverlayPortRegistry {
    /// Grab the first free port among `candidates`. Returns `None` when all
    /// are taken (or the candidate list is empty).
    pub fn grab(candidates: &[u32]) -> Option<OverlayPort> {
        let mut set = grabbed().lock().expect("port registry poisoned");
        for &id in candidates {
            if set.insert(id) {
                debug!(port = id, "grabbed overlay port");
                return Some(OverlayPort { id });
            }
        }
        None
    }

    /// Number of currently grabbed ports.
    pub fn grabbed_count() -> usize {
        grabbed().lock().expect("port registry poisoned").len()
    }

    /// Whether a specific port is currently grabbed.
    pub fn is_grabbed(id: u32) -> bool {
        grabbed().lock().expect("port registry poisoned").contains(&id)
    }

    /// Release every grabbed port. Test support; live [`OverlayPort`] values
    /// become stale after this.
    pub fn reset() {
        grabbed().lock().expect("port registry poisoned").clear();
    }

    fn release(id: u32) {
        let mut set = grabbed().lock().expect("port registry poisoned");
        if set.remove(&id) {
            debug!(port = id, "released overlay port");
        }
    }
}

/// An acquired overlay port; released back to the registry on drop.
#[derive(Debug)]
pub struct OverlayPort {
    id: u32,
}

impl OverlayPort {
    /// The native port identifier.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl Drop for OverlayPort {
    fn drop(&mut self) {
        OverlayPortRegistry::release(self.id);
    }
}

/// Serializes tests that touch the process-wide registry.
#[cfg(test)]
pub(crate) fn test_guard() -> std::sync::MutexGuard<'static, ()> {
    static TEST_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    TEST_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner())
}
