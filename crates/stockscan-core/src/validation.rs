//! # Validation Module
//!
//! Input checks for scanned codes and manual search queries.
//!
//! ## GTIN Check Digit
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  EAN-13: 0 1 2 3 4 5 6 7 8 9 0 1 [2]                                    │
//! │  weights 1 3 1 3 1 3 1 3 1 3 1 3   (from the left, EAN-13)              │
//! │                                                                         │
//! │  Weights always alternate 3,1,3,1... starting from the digit next to    │
//! │  the check digit, so one routine covers EAN-8, UPC-A and EAN-13.        │
//! │                                                                         │
//! │  check = (10 - (weighted_sum % 10)) % 10                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use stockscan_core::validation::{validate_code, validate_gtin};
//! use stockscan_core::BarcodeFormat;
//!
//! assert!(validate_gtin("4006381333931").is_ok());
//! assert!(validate_code("4006381333931", BarcodeFormat::Ean13).is_ok());
//! assert!(validate_code("", BarcodeFormat::QrCode).is_err());
//! ```

use crate::error::ValidationError;
use crate::types::BarcodeFormat;
use crate::{MAX_CODE_LENGTH, MAX_QUERY_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Code Validators
// =============================================================================

/// Validates a decoded payload for the given symbology.
///
/// ## Rules
/// - Must not be empty
/// - At most [`MAX_CODE_LENGTH`] characters
/// - GTIN formats (EAN-8, UPC-A, EAN-13) must be all digits, the right
///   length, with a valid check digit
pub fn validate_code(code: &str, format: BarcodeFormat) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }

    if code.len() > MAX_CODE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: MAX_CODE_LENGTH,
        });
    }

    let expected_len = match format {
        BarcodeFormat::Ean8 => Some(8),
        BarcodeFormat::UpcA => Some(12),
        BarcodeFormat::Ean13 => Some(13),
        _ => None,
    };

    if let Some(len) = expected_len {
        if code.len() != len {
            return Err(ValidationError::InvalidFormat {
                field: "code".to_string(),
                reason: format!("{} requires {} digits, got {}", format, len, code.len()),
            });
        }
        validate_gtin(code)?;
    }

    Ok(())
}

/// Validates a GTIN-8/12/13/14 check digit.
pub fn validate_gtin(code: &str) -> ValidationResult<()> {
    if code.len() < 2 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "GTIN must contain only digits".to_string(),
        });
    }

    let (payload, check) = code.split_at(code.len() - 1);
    let expected = gtin_check_digit(payload);
    let actual = check.chars().next().and_then(|c| c.to_digit(10)).unwrap_or(0);

    if expected != actual {
        return Err(ValidationError::CheckDigit {
            code: code.to_string(),
            expected,
            actual,
        });
    }

    Ok(())
}

/// Computes the mod-10 check digit for a GTIN payload (without check digit).
///
/// Non-digit characters are ignored.
pub fn gtin_check_digit(payload: &str) -> u32 {
    let sum: u32 = payload
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { d * 3 } else { d })
        .sum();

    (10 - (sum % 10)) % 10
}

// =============================================================================
// Search Query
// =============================================================================

/// Normalises a manual search query.
///
/// ## Rules
/// - Can be empty (caller clears results without a request)
/// - Maximum [`MAX_QUERY_LENGTH`] characters
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.chars().count() > MAX_QUERY_LENGTH {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: MAX_QUERY_LENGTH,
        });
    }

    Ok(query.to_string())
}
