//! # Event Emitter
//!
//! Fire-and-forget notifications from the scanner core to the UI layer
//! (control enablement, toasts). Nothing here affects scan correctness.
//!
//! ```text
//! ScanSession ──emit_state/emit_error──┐
//!                                      ├──► ScanEventEmitter ──► UI / logs
//! ScanCoordinator ──emit_outcome───────┘
//! ```

use tracing::{info, warn};

use stockscan_core::{NoticeLevel, SessionState};

use crate::coordinator::ScanOutcome;

/// Trait for emitting scanner events (implemented by the UI integration).
pub trait ScanEventEmitter: Send + Sync {
    /// Session state changed (enable/disable Start, Stop, Torch).
    fn emit_state(&self, state: &SessionState);

    /// A scan was resolved against the catalog.
    fn emit_outcome(&self, outcome: &ScanOutcome);

    /// A device error the user should act on. Reported once per failure.
    fn emit_error(&self, message: &str, retryable: bool);
}

/// No-op event emitter for headless use and tests.
pub struct NoOpEmitter;

impl ScanEventEmitter for NoOpEmitter {
    fn emit_state(&self, _state: &SessionState) {}
    fn emit_outcome(&self, _outcome: &ScanOutcome) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
}

/// Emitter that turns events into log lines (console use).
pub struct LogEmitter;

impl ScanEventEmitter for LogEmitter {
    fn emit_state(&self, state: &SessionState) {
        info!(state = %state, "Scanner state");
    }

    fn emit_outcome(&self, outcome: &ScanOutcome) {
        let notice = outcome.result.notice();
        match notice.level {
            NoticeLevel::Error => warn!(code = %outcome.event.code, "{}", notice.message),
            _ => info!(code = %outcome.event.code, "{}", notice.message),
        }
    }

    fn emit_error(&self, message: &str, retryable: bool) {
        warn!(retryable, "{}", message);
    }
}
