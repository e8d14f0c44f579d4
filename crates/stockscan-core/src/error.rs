//! # Error Types
//!
//! Domain-specific error types for stockscan-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  stockscan-core errors (this file)                                     │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  stockscan-client errors (separate crate)                              │
//! │  └── ScanError        - Camera, lookup and config failures             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ScanError → UI notice             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A decoder produced an empty payload.
    ///
    /// ## When This Occurs
    /// - Decoder reported a symbol with no content
    /// - Keyboard-wedge scanner sent a bare Enter
    #[error("Decoded code is empty")]
    EmptyCode,

    /// A barcode format string could not be recognised.
    #[error("Unknown barcode format: {0}")]
    UnknownFormat(String),

    /// A scan mode string could not be recognised.
    #[error("Unknown scan mode: '{0}'. Valid options: barcode, qr, both")]
    UnknownScanMode(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (e.g., letters in a numeric barcode).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// GTIN check digit does not match the payload.
    #[error("Invalid check digit for {code}: expected {expected}, got {actual}")]
    CheckDigit {
        code: String,
        expected: u32,
        actual: u32,
    },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
