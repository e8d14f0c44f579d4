//! # stockscan-core: Pure Scan Bookkeeping for StockScan
//!
//! This crate holds the domain model of the barcode/QR scanning workflow as
//! plain data and pure functions, with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        StockScan Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Inventory Dashboard (browser)                   │   │
//! │  │    Scanner modal ──► Recent scans ──► Create item form          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ generated TS bindings                  │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  stockscan-client                               │   │
//! │  │    ScanSession, ScanCoordinator, HttpCatalogClient              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ stockscan-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐                  │   │
//! │  │   │   types   │  │  history  │  │validation │                  │   │
//! │  │   │ ScanEvent │  │ScanHistory│  │ GTIN check│                  │   │
//! │  │   │   Item    │  │ ScanStats │  │  digits   │                  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘                  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO CAMERA • NO NETWORK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (ScanEvent, Item, SessionState, ResolutionResult)
//! - [`history`] - Bounded scan history and derived stats
//! - [`error`] - Domain error types
//! - [`validation`] - Code and query validation
//!
//! ## Example Usage
//!
//! ```rust
//! use stockscan_core::{BarcodeFormat, ScanEvent, ScanHistory};
//!
//! let mut history = ScanHistory::new();
//! history.record(ScanEvent::new("0123456789012", BarcodeFormat::Ean13).unwrap());
//!
//! assert_eq!(history.latest().unwrap().code, "0123456789012");
//! assert_eq!(history.stats().total, 1);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod history;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use history::{ScanHistory, ScanStats};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum number of scans kept in a coordinator's history.
///
/// Older scans are evicted silently; the recent-scans panel only ever shows
/// this many rows.
pub const HISTORY_CAPACITY: usize = 50;

/// Longest payload accepted from a decoder (QR codes top out near 4,300
/// alphanumeric characters).
pub const MAX_CODE_LENGTH: usize = 4096;

/// Longest manual search query sent to the catalog.
pub const MAX_QUERY_LENGTH: usize = 100;
