//! In-flight request accounting behind the network-quiet load gate.

use std::collections::HashSet;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{sleep, Instant};
use tracing::trace;

/// A page counts as quiet while at most this many requests are open.
pub const MAX_QUIET_INFLIGHT: usize = 2;

struct TrackerState {
    inflight: HashSet<String>,
    quiet_since: Option<Instant>,
}

/// Open requests of one page, fed from network events.
pub struct NetworkTracker {
    state: Mutex<TrackerState>,
}

impl Default for NetworkTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkTracker {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TrackerState {
                inflight: HashSet::new(),
                quiet_since: Some(Instant::now()),
            }),
        }
    }

    /// Redirects reuse their request id and are counted once.
    pub fn request_started(&self, request_id: &str) {
        let mut state = self.state.lock();
        state.inflight.insert(request_id.to_string());
        if state.inflight.len() > MAX_QUIET_INFLIGHT {
            state.quiet_since = None;
        }
    }

    pub fn request_finished(&self, request_id: &str) {
        let mut state = self.state.lock();
        state.inflight.remove(request_id);
        if state.inflight.len() <= MAX_QUIET_INFLIGHT && state.quiet_since.is_none() {
            state.quiet_since = Some(Instant::now());
        }
    }

    /// Forget everything before a new navigation; the quiet window restarts.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.inflight.clear();
        state.quiet_since = Some(Instant::now());
    }

    pub fn inflight(&self) -> usize {
        self.state.lock().inflight.len()
    }

    /// True once the page has stayed under the in-flight limit for `window`.
    pub fn is_quiet(&self, window: Duration) -> bool {
        self.state
            .lock()
            .quiet_since
            .map(|since| since.elapsed() >= window)
            .unwrap_or(false)
    }

    /// Resolve once the page is quiet. Unbounded; callers apply a deadline.
    pub async fn wait_until_quiet(&self, window: Duration, poll: Duration) {
        while !self.is_quiet(window) {
            trace!(target: "cdp-adapter", inflight = self.inflight(), "waiting for network quiet");
            sleep(poll).await;
        }
    }
}
