// ── Backend reachability ──
//
// A single boolean derived from request outcomes. Observers subscribe to a
// broadcast channel and only hear about transitions.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;
use tracing::info;

const TRANSITION_CHANNEL_SIZE: usize = 32;

/// Tracks whether the backend answered the most recent request.
///
/// Starts optimistic (`reachable`). Concurrent requests race on the same
/// cell; last writer wins, and a notification goes out only when the stored
/// value actually flips.
#[derive(Debug)]
pub struct ConnectionMonitor {
    reachable: AtomicBool,
    transitions: broadcast::Sender<bool>,
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionMonitor {
    pub fn new() -> Self {
        let (transitions, _) = broadcast::channel(TRANSITION_CHANNEL_SIZE);
        Self {
            reachable: AtomicBool::new(true),
            transitions,
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::Acquire)
    }

    /// Record that the backend answered. Returns `true` on a transition.
    pub fn mark_reachable(&self) -> bool {
        self.set(true)
    }

    /// Record that the backend could not be reached. Returns `true` on a transition.
    pub fn mark_unreachable(&self) -> bool {
        self.set(false)
    }

    fn set(&self, reachable: bool) -> bool {
        let previous = self.reachable.swap(reachable, Ordering::AcqRel);
        if previous == reachable {
            return false;
        }
        info!(reachable, "backend connectivity changed");
        let _ = self.transitions.send(reachable);
        true
    }

    /// Subscribe to transitions. Late subscribers get no replay; read
    /// [`is_reachable`](Self::is_reachable) for the current value.
    pub fn subscribe(&self) -> broadcast::Receiver<bool> {
        self.transitions.subscribe()
    }
}
