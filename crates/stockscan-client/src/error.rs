//! # Scan Error Types
//!
//! Error types for camera, catalog and configuration operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Scan Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │     Device      │  │     Lookup      │  │     Configuration       │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Enumeration    │  │  Network        │  │  InvalidConfig          │ │
//! │  │  Acquisition    │  │  Status         │  │  InvalidUrl             │ │
//! │  │                 │  │  Decode         │  │  ConfigLoad/Save        │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Per-frame decode misses are NOT errors: they never leave the decode   │
//! │  loop (see backend::FrameError).                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::backend::BackendError;

/// Result type alias for scanner operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// Scanner error type.
#[derive(Debug, Error)]
pub enum ScanError {
    // =========================================================================
    // Device Errors
    // =========================================================================
    /// The platform refused to list capture devices.
    #[error("Cannot list cameras: {0}")]
    DeviceEnumeration(BackendError),

    /// The selected camera could not be opened.
    #[error("Cannot open camera {camera_id}: {reason}")]
    DeviceAcquisition {
        camera_id: String,
        reason: BackendError,
    },

    /// `stop()` or `shutdown()` ran while the camera was still opening.
    #[error("Camera start for {camera_id} was cancelled")]
    StartCancelled { camera_id: String },

    // =========================================================================
    // Lookup Errors
    // =========================================================================
    /// Catalog request did not complete (DNS, connect, timeout, reset).
    #[error("Catalog request failed: {0}")]
    LookupNetwork(String),

    /// Catalog answered with a non-success status.
    #[error("Catalog returned HTTP {status}: {message}")]
    LookupStatus { status: u16, message: String },

    /// Catalog answered with a body we could not parse.
    #[error("Invalid catalog response: {0}")]
    LookupDecode(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid scanner configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid catalog URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Invalid input rejected by stockscan-core.
    #[error(transparent)]
    Core(#[from] stockscan_core::CoreError),

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<reqwest::Error> for ScanError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ScanError::LookupDecode(err.to_string())
        } else if let Some(status) = err.status() {
            ScanError::LookupStatus {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            ScanError::LookupNetwork(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        ScanError::LookupDecode(err.to_string())
    }
}

impl From<url::ParseError> for ScanError {
    fn from(err: url::ParseError) -> Self {
        ScanError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for ScanError {
    fn from(err: std::io::Error) -> Self {
        ScanError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ScanError {
    fn from(err: toml::de::Error) -> Self {
        ScanError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ScanError {
    fn from(err: toml::ser::Error) -> Self {
        ScanError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl ScanError {
    /// Returns true if retrying the same call may succeed.
    ///
    /// ## Retryable Errors
    /// - Busy camera (another tab/app released it)
    /// - Network failures and 5xx responses
    pub fn is_retryable(&self) -> bool {
        match self {
            ScanError::DeviceAcquisition { reason, .. } => {
                matches!(reason, BackendError::DeviceBusy | BackendError::Platform(_))
            }
            ScanError::LookupNetwork(_) => true,
            ScanError::LookupStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true for camera errors.
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            ScanError::DeviceEnumeration(_) | ScanError::DeviceAcquisition { .. }
        )
    }

    /// Returns true for catalog errors.
    pub fn is_lookup_error(&self) -> bool {
        matches!(
            self,
            ScanError::LookupNetwork(_)
                | ScanError::LookupStatus { .. }
                | ScanError::LookupDecode(_)
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ScanError::InvalidConfig(_)
                | ScanError::InvalidUrl(_)
                | ScanError::ConfigLoadFailed(_)
                | ScanError::ConfigSaveFailed(_)
        )
    }

    /// Single actionable message for the UI.
    pub fn user_message(&self) -> String {
        match self {
            ScanError::DeviceEnumeration(_) => {
                "Unable to list cameras. Check camera permissions and retry.".to_string()
            }
            ScanError::DeviceAcquisition { reason, .. } => format!(
                "Unable to start the camera ({}). Check camera permissions and retry.",
                reason
            ),
            e if e.is_lookup_error() => format!("Search failed: {}", e),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(ScanError::LookupNetwork("connection reset".into()).is_retryable());
        assert!(ScanError::LookupStatus {
            status: 503,
            message: "unavailable".into()
        }
        .is_retryable());
        assert!(ScanError::DeviceAcquisition {
            camera_id: "cam-1".into(),
            reason: BackendError::DeviceBusy,
        }
        .is_retryable());

        assert!(!ScanError::LookupStatus {
            status: 401,
            message: "unauthorized".into()
        }
        .is_retryable());
        assert!(!ScanError::DeviceAcquisition {
            camera_id: "cam-1".into(),
            reason: BackendError::PermissionDenied,
        }
        .is_retryable());
        assert!(!ScanError::InvalidConfig("bad".into()).is_retryable());
    }

    #[test]
    fn test_user_messages() {
        let err = ScanError::DeviceAcquisition {
            camera_id: "cam-1".into(),
            reason: BackendError::PermissionDenied,
        };
        assert!(err.user_message().contains("Check camera permissions and retry"));

        let err = ScanError::LookupNetwork("timed out".into());
        assert!(err.user_message().starts_with("Search failed"));
        assert!(err.is_lookup_error());
        assert!(!err.is_device_error());
    }
}
