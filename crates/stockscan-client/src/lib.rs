//! # stockscan-client: Camera Session & Catalog Resolution for StockScan
//!
//! Everything in the scan workflow that touches a device or the network.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Scanner Client Architecture                       │
//! │                                                                         │
//! │  ┌──────────────────┐          ┌──────────────────┐                     │
//! │  │  CameraBackend   │ acquire  │   ScanSession    │                     │
//! │  │  (platform or    │ ◄─────── │                  │                     │
//! │  │   keyboard wedge)│ ───────► │ Idle/Starting/   │                     │
//! │  └──────────────────┘  frames  │ Active/Stopping/ │                     │
//! │                                │ Error            │                     │
//! │                                └────────┬─────────┘                     │
//! │                                         │ ScanEvent (broadcast)         │
//! │                                         ▼                               │
//! │  ┌──────────────────┐          ┌──────────────────┐                     │
//! │  │  CatalogClient   │ ◄─────── │ ScanCoordinator  │ ──► ScanOutcome     │
//! │  │  (HTTP/JSON)     │ ───────► │ history (50)     │     (mpsc+emitter)  │
//! │  └────────┬─────────┘          │ resolve/search   │                     │
//! │           │                    └──────────────────┘                     │
//! │           │ AlertSource                                                 │
//! │           ▼                                                             │
//! │  ┌──────────────────┐                                                   │
//! │  │PollingCoordinator│ ──► Subscription callbacks                        │
//! │  └──────────────────┘                                                   │
//! │                                                                         │
//! │  UI EVENTS (ScanEventEmitter):                                         │
//! │  • state changes (enable/disable controls)                             │
//! │  • scan outcomes (toasts, create-item prompt)                          │
//! │  • device errors (once per failure)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`backend`] - Camera/decoder seam and the keyboard-wedge backend
//! - [`session`] - `ScanSession` lifecycle state machine
//! - [`coordinator`] - `ScanCoordinator`: history, resolution, search
//! - [`catalog`] - Catalog and alert traits, HTTP client
//! - [`debounce`] - Latest-call-wins debouncer
//! - [`polling`] - Alert polling with subscriptions
//! - [`config`] - Scanner configuration (TOML + env)
//! - [`emitter`] - UI notification trait
//! - [`error`] - Scanner error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use stockscan_client::{
//!     HttpCatalogClient, ScanCoordinator, ScanSession, ScannerConfig, WedgeBackend,
//! };
//!
//! let config = ScannerConfig::load_or_default(None);
//! let catalog = Arc::new(HttpCatalogClient::new(&config.catalog)?);
//! let session = ScanSession::new(Arc::new(WedgeBackend::stdin()), config.session_config());
//! let coordinator = Arc::new(ScanCoordinator::new(catalog, (&config).into()));
//!
//! let (mut outcomes, _pump) = coordinator.attach(session.subscribe());
//! session.start("wedge", config.camera.mode).await?;
//!
//! while let Some(outcome) = outcomes.recv().await {
//!     println!("{}", outcome.result.notice().message);
//! }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod backend;
pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod debounce;
pub mod emitter;
pub mod error;
pub mod polling;
pub mod session;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use backend::{
    BackendError, CameraBackend, CaptureRequest, CaptureStream, DecodedSymbol, FrameError,
    WedgeBackend, WEDGE_DEVICE_ID,
};
pub use catalog::{AlertSource, CatalogClient, HttpCatalogClient};
pub use config::{
    AlertSettings, CameraSettings, CatalogSettings, ScanSettings, ScannerConfig, SearchSettings,
};
pub use coordinator::{CoordinatorConfig, ScanCoordinator, ScanOutcome};
pub use debounce::{Debounced, Debouncer};
pub use emitter::{LogEmitter, NoOpEmitter, ScanEventEmitter};
pub use error::{ScanError, ScanResult};
pub use polling::{PollingCoordinator, Subscription};
pub use session::{ScanSession, SessionConfig};
