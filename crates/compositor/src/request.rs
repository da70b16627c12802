//! Generation counters with shared cancellation flags.
//!
//! Every asynchronous load or extraction is stamped with the tracker's
//! generation at the time it was issued. Issuing a newer request flips the
//! previous token's flag so its worker can bail out early, and any result that
//! still arrives is rejected by [`RequestTracker::accepts`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Handle carried by a worker thread for one request.
#[derive(Debug, Clone)]
pub struct RequestToken {
    generation: u64,
    cancelled: Arc<AtomicBool>,
}

impl RequestToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn is_current(&self) -> bool {
        !self.is_cancelled()
    }
}

#[derive(Debug, Default)]
pub struct RequestTracker {
    generation: u64,
    latest: Option<RequestToken>,
    pending_since: Option<Instant>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supersedes whatever was in flight and returns the token for a new request.
    pub fn issue(&mut self, now: Instant) -> RequestToken {
        self.cancel_latest();
        self.generation = self.generation.wrapping_add(1);
        let token = RequestToken {
            generation: self.generation,
            cancelled: Arc::new(AtomicBool::new(false)),
        };
        self.latest = Some(token.clone());
        self.pending_since = Some(now);
        token
    }

    /// True when `generation` belongs to the newest request and it was not cancelled.
    pub fn accepts(&self, generation: u64) -> bool {
        self.latest
            .as_ref()
            .is_some_and(|token| token.generation == generation && !token.is_cancelled())
    }

    /// Marks the newest request as delivered so it no longer counts toward timeouts.
    pub fn settle(&mut self, generation: u64) {
        if self.accepts(generation) {
            self.pending_since = None;
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending_since.is_some()
    }

    /// Cancels the newest request when it has been pending longer than `timeout`.
    pub fn expire(&mut self, now: Instant, timeout: Duration) -> Option<u64> {
        let since = self.pending_since?;
        if now.saturating_duration_since(since) < timeout {
            return None;
        }
        self.pending_since = None;
        self.cancel_latest();
        Some(self.generation)
    }

    pub fn cancel_all(&mut self) {
        self.cancel_latest();
        self.pending_since = None;
    }

    fn cancel_latest(&mut self) {
        if let Some(token) = self.latest.as_ref() {
            token.cancelled.store(true, Ordering::Release);
        }
    }
}
