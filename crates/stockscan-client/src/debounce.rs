//! # Debouncer
//!
//! Latest-call-wins gate for bursty input (search-as-you-type).
//!
//! ```text
//!   call "a"  ──┐ 50ms
//!   call "ab" ──┼──┐ 50ms
//!   call "abc"──┼──┼──┐
//!               ▼  ▼  ▼
//!         Superseded   └── quiet window elapses ──► request("abc") ──► Ready
//! ```
//!
//! Every call takes a ticket. After the quiet window a call only proceeds if
//! its ticket is still the newest; a result that comes back after a newer
//! call arrived is dropped as well, so stale responses never overwrite
//! fresher ones.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::trace;

/// Outcome of a debounced call.
#[derive(Debug, Clone, PartialEq)]
pub enum Debounced<T> {
    /// This call was the latest; here is its result.
    Ready(T),

    /// A newer call (or a cancel) replaced this one.
    Superseded,
}

impl<T> Debounced<T> {
    pub fn is_superseded(&self) -> bool {
        matches!(self, Debounced::Superseded)
    }

    /// Returns the value if this call won.
    pub fn ready(self) -> Option<T> {
        match self {
            Debounced::Ready(value) => Some(value),
            Debounced::Superseded => None,
        }
    }
}

/// Debounces async calls over a fixed quiet window.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    generation: AtomicU64,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Debouncer {
            window,
            generation: AtomicU64::new(0),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Waits out the quiet window, then runs `f` if no newer call arrived.
    ///
    /// `f` is never invoked for a superseded call.
    pub async fn run<F, Fut, T>(&self, f: F) -> Debounced<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let ticket = self.next_ticket();

        tokio::time::sleep(self.window).await;
        if !self.is_current(ticket) {
            trace!(ticket, "Debounced call superseded before running");
            return Debounced::Superseded;
        }

        let value = f().await;
        if !self.is_current(ticket) {
            trace!(ticket, "Debounced result arrived after a newer call");
            return Debounced::Superseded;
        }

        Debounced::Ready(value)
    }

    /// Supersedes every pending call without starting a new one.
    pub fn cancel(&self) {
        self.next_ticket();
    }

    fn next_ticket(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket
    }
}
