//! # Scan Coordinator
//!
//! Turns decoded scans into catalog answers and keeps the recent-scan log.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Scan Coordinator                               │
//! │                                                                         │
//! │  ScanSession ──broadcast──► pump ──► duplicate filter                   │
//! │                                          │                              │
//! │                                          ▼                              │
//! │                                   record_scan() ──► ScanHistory (50)    │
//! │                                          │                              │
//! │                                          ▼ (one task per scan)          │
//! │                                   resolve(code) ──► CatalogClient       │
//! │                                          │                              │
//! │                      ┌───────────────────┼───────────────────┐          │
//! │                      ▼                   ▼                   ▼          │
//! │                   Found             NotFound               Error        │
//! │                                   (create draft)     (network/status)   │
//! │                                          │                              │
//! │                                          ▼                              │
//! │                   ScanOutcome ──► mpsc channel + emitter                │
//! │                                                                         │
//! │  Manual search: search(query) ──► Debouncer ──► CatalogClient           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use stockscan_core::validation::validate_search_query;
use stockscan_core::{
    CoreError, Item, ItemDraft, ResolutionResult, ScanEvent, ScanHistory, ScanStats,
};

use crate::catalog::CatalogClient;
use crate::config::ScannerConfig;
use crate::debounce::{Debounced, Debouncer};
use crate::emitter::{NoOpEmitter, ScanEventEmitter};
use crate::error::ScanResult;

// =============================================================================
// Outcome
// =============================================================================

/// A scan together with what the catalog said about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOutcome {
    pub event: ScanEvent,
    pub result: ResolutionResult,
}

impl ScanOutcome {
    /// Pre-filled create form, only when the code is unknown.
    pub fn create_suggestion(&self) -> Option<ItemDraft> {
        self.result
            .is_not_found()
            .then(|| ItemDraft::from_scan(&self.event))
    }
}

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Quiet window for manual search.
    pub debounce: Duration,

    /// Repeat reads of a code inside this window are dropped by the pump.
    pub duplicate_window: Option<Duration>,

    /// Capacity of the outcome channel returned by `attach`.
    pub outcome_buffer: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        CoordinatorConfig {
            debounce: Duration::from_millis(300),
            duplicate_window: Some(Duration::from_millis(1500)),
            outcome_buffer: 32,
        }
    }
}

impl From<&ScannerConfig> for CoordinatorConfig {
    fn from(config: &ScannerConfig) -> Self {
        CoordinatorConfig {
            debounce: config.debounce_window(),
            duplicate_window: config.duplicate_window(),
            ..CoordinatorConfig::default()
        }
    }
}

// =============================================================================
// Scan Coordinator
// =============================================================================

/// Bounded scan history, catalog resolution and debounced search.
pub struct ScanCoordinator {
    catalog: Arc<dyn CatalogClient>,
    history: RwLock<ScanHistory>,
    debouncer: Debouncer,
    config: CoordinatorConfig,
    emitter: Arc<dyn ScanEventEmitter>,
}

impl ScanCoordinator {
    pub fn new(catalog: Arc<dyn CatalogClient>, config: CoordinatorConfig) -> Self {
        Self::with_emitter(catalog, config, Arc::new(NoOpEmitter))
    }

    pub fn with_emitter(
        catalog: Arc<dyn CatalogClient>,
        config: CoordinatorConfig,
        emitter: Arc<dyn ScanEventEmitter>,
    ) -> Self {
        ScanCoordinator {
            catalog,
            history: RwLock::new(ScanHistory::new()),
            debouncer: Debouncer::new(config.debounce),
            config,
            emitter,
        }
    }

    // =========================================================================
    // History
    // =========================================================================

    /// Adds a scan to the front of the history, evicting the oldest past 50.
    pub fn record_scan(&self, event: ScanEvent) {
        debug!(code = %event.code, format = %event.format, "Recording scan");
        self.history
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .record(event);
    }

    /// Recent scans, newest first.
    pub fn history(&self) -> Vec<ScanEvent> {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .to_vec()
    }

    pub fn latest(&self) -> Option<ScanEvent> {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .latest()
            .cloned()
    }

    pub fn clear_history(&self) {
        info!("Clearing scan history");
        self.history
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Aggregates over the current history; `today` uses the local day.
    pub fn stats(&self) -> ScanStats {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .stats()
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Looks `code` up in the catalog.
    ///
    /// ## Outcomes
    /// - One match: `Found`
    /// - Several matches: the exact barcode match (or the first) is `Found`
    /// - No match: `NotFound(code)`
    /// - Lookup failure: `Error`, never `NotFound`
    pub async fn resolve(&self, code: &str) -> ResolutionResult {
        let code = code.trim();
        if code.is_empty() {
            return ResolutionResult::Error(CoreError::EmptyCode.to_string());
        }

        match self.catalog.find_by_code(code).await {
            Ok(items) => pick_match(code, items),
            Err(e) => {
                warn!(code, error = %e, "Catalog lookup failed");
                ResolutionResult::Error(e.to_string())
            }
        }
    }

    /// Debounced free-text catalog search.
    ///
    /// Only the last call within the quiet window reaches the catalog; the
    /// others return `Superseded` without a request. An empty query clears
    /// results immediately and cancels any pending call.
    pub async fn search(&self, query: &str) -> ScanResult<Debounced<Vec<Item>>> {
        let query = validate_search_query(query).map_err(CoreError::from)?;

        if query.is_empty() {
            self.debouncer.cancel();
            return Ok(Debounced::Ready(Vec::new()));
        }

        match self
            .debouncer
            .run(|| self.catalog.search_catalog(&query))
            .await
        {
            Debounced::Ready(result) => {
                let items = result?;
                debug!(query = %query, results = items.len(), "Search complete");
                Ok(Debounced::Ready(items))
            }
            Debounced::Superseded => Ok(Debounced::Superseded),
        }
    }

    // =========================================================================
    // Event Pump
    // =========================================================================

    /// Consumes session events: filters repeats, records each scan and
    /// resolves it on its own task.
    ///
    /// Outcomes arrive on the returned channel (and at the emitter) in
    /// completion order. The pump ends when the session's event channel
    /// closes; resolutions already in flight still complete.
    pub fn attach(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<ScanEvent>,
    ) -> (mpsc::Receiver<ScanOutcome>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(self.config.outcome_buffer.max(1));
        let coordinator = self.clone();

        let task = tokio::spawn(async move {
            let mut filter = DuplicateFilter::new(coordinator.config.duplicate_window);

            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Scan pump lagged, events dropped");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                if !filter.accept(&event.code, Instant::now()) {
                    trace!(code = %event.code, "Dropping repeat read");
                    continue;
                }

                coordinator.record_scan(event.clone());

                let coordinator = coordinator.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let result = coordinator.resolve(&event.code).await;
                    let outcome = ScanOutcome { event, result };

                    coordinator.emitter.emit_outcome(&outcome);
                    if tx.send(outcome).await.is_err() {
                        trace!("Outcome receiver dropped");
                    }
                });
            }

            debug!("Scan pump finished");
        });

        (rx, task)
    }
}

/// Chooses the item for a barcode lookup.
fn pick_match(code: &str, mut items: Vec<Item>) -> ResolutionResult {
    match items.len() {
        0 => ResolutionResult::NotFound(code.to_string()),
        1 => ResolutionResult::Found(items.remove(0)),
        n => {
            warn!(code, matches = n, "Barcode matches several items");
            let idx = items.iter().position(|i| i.matches_code(code)).unwrap_or(0);
            ResolutionResult::Found(items.swap_remove(idx))
        }
    }
}

// =============================================================================
// Duplicate Filter
// =============================================================================

/// Drops a code seen again within `window` of its last accepted read.
struct DuplicateFilter {
    window: Option<Duration>,
    seen: HashMap<String, Instant>,
}

impl DuplicateFilter {
    fn new(window: Option<Duration>) -> Self {
        DuplicateFilter {
            window,
            seen: HashMap::new(),
        }
    }

    fn accept(&mut self, code: &str, now: Instant) -> bool {
        let Some(window) = self.window else {
            return true;
        };

        self.seen
            .retain(|_, last| now.saturating_duration_since(*last) < window);

        if self.seen.contains_key(code) {
            return false;
        }
        self.seen.insert(code.to_string(), now);
        true
    }
}
