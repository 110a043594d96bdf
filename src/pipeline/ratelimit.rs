//! Per-connection request rate limiting
//!
//! Independent of any HTTP-layer limiter: one counter per WebSocket
//! connection, checked before a request is handed to the worker pool.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::clock::Clock;

struct ClientRateState {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window counter per connection.
///
/// The window is anchored to the first request after an idle period, not to
/// wall-clock boundaries: when `reset_at` has passed, the counter restarts
/// and a new window opens `window` from now. A client that stops sending
/// keeps its window open until it sends again. This is observable behavior
/// and preserved deliberately.
pub struct ClientRateLimiter {
    states: DashMap<Uuid, ClientRateState>,
    limit: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl ClientRateLimiter {
    pub fn new(limit: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            states: DashMap::new(),
            limit,
            window,
            clock,
        }
    }

    /// Count one request for this connection and report whether it is within
    /// the limit. The call that tips the count over the limit is itself
    /// counted and rejected.
    pub fn allow(&self, connection_id: Uuid) -> bool {
        let now = self.clock.now();

        let mut state = self
            .states
            .entry(connection_id)
            .or_insert_with(|| ClientRateState {
                count: 0,
                reset_at: now + self.window,
            });

        if now >= state.reset_at {
            state.count = 0;
            state.reset_at = now + self.window;
        }

        state.count += 1;
        let allowed = state.count <= self.limit;

        if !allowed {
            debug!(%connection_id, count = state.count, "Rate limit exceeded");
        }

        allowed
    }

    /// Drop all state for a disconnected client
    pub fn forget(&self, connection_id: Uuid) {
        self.states.remove(&connection_id);
    }

    pub fn tracked_clients(&self) -> usize {
        self.states.len()
    }
}
