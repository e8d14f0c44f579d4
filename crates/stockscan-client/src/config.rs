//! # Scanner Configuration
//!
//! Configuration for the camera session, catalog client and pollers.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     STOCKSCAN_CATALOG_URL=https://inventory.example.com/api            │
//! │     STOCKSCAN_SCAN_MODE=qr                                             │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/stockscan/scanner.toml (Linux)                           │
//! │     ~/Library/Application Support/com.stockscan.stockscan/... (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     mode = both, debounce 300ms, alerts every 60s                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # scanner.toml
//! [camera]
//! preferred_camera_id = "usb-0c45-6366"
//! mode = "both"          # barcode | qr | both
//! torch = false
//!
//! [catalog]
//! base_url = "https://inventory.example.com/api"
//! request_timeout_secs = 10
//!
//! [search]
//! debounce_ms = 300
//!
//! [scan]
//! duplicate_window_ms = 1500   # 0 disables duplicate suppression
//!
//! [alerts]
//! enabled = true
//! poll_interval_secs = 60
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use stockscan_core::ScanMode;

use crate::error::{ScanError, ScanResult};
use crate::session::SessionConfig;

// =============================================================================
// Camera Settings
// =============================================================================

/// Camera and decode-loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraSettings {
    /// Camera to open when it is present; otherwise a rear-facing one wins.
    #[serde(default)]
    pub preferred_camera_id: Option<String>,

    #[serde(default)]
    pub mode: ScanMode,

    #[serde(default)]
    pub torch: bool,

    /// Upper bound on how long `stop()` waits for the decode loop.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_ms: u64,

    /// Scan events buffered per subscriber before the slowest one lags.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_stop_timeout() -> u64 {
    2_000
}

fn default_event_buffer() -> usize {
    64
}

impl Default for CameraSettings {
    fn default() -> Self {
        CameraSettings {
            preferred_camera_id: None,
            mode: ScanMode::default(),
            torch: false,
            stop_timeout_ms: default_stop_timeout(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl From<&CameraSettings> for SessionConfig {
    fn from(settings: &CameraSettings) -> Self {
        SessionConfig {
            stop_timeout: Duration::from_millis(settings.stop_timeout_ms),
            event_buffer: settings.event_buffer,
        }
    }
}

// =============================================================================
// Catalog Settings
// =============================================================================

/// Remote catalog connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Static bearer token sent with every request.
    #[serde(default)]
    pub api_token: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for CatalogSettings {
    fn default() -> Self {
        CatalogSettings {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            api_token: None,
        }
    }
}

// =============================================================================
// Search / Scan / Alert Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Quiet window before a manual search is sent.
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,
}

fn default_debounce() -> u64 {
    300
}

impl Default for SearchSettings {
    fn default() -> Self {
        SearchSettings {
            debounce_ms: default_debounce(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Repeat reads of the same code inside this window are dropped.
    /// Set to 0 to keep every read.
    #[serde(default = "default_duplicate_window")]
    pub duplicate_window_ms: u64,
}

fn default_duplicate_window() -> u64 {
    1_500
}

impl Default for ScanSettings {
    fn default() -> Self {
        ScanSettings {
            duplicate_window_ms: default_duplicate_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    60
}

impl Default for AlertSettings {
    fn default() -> Self {
        AlertSettings {
            enabled: true,
            poll_interval_secs: default_poll_interval(),
        }
    }
}

// =============================================================================
// Main Scanner Configuration
// =============================================================================

/// Complete scanner configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default)]
    pub camera: CameraSettings,

    #[serde(default)]
    pub catalog: CatalogSettings,

    #[serde(default)]
    pub search: SearchSettings,

    #[serde(default)]
    pub scan: ScanSettings,

    #[serde(default)]
    pub alerts: AlertSettings,
}

impl ScannerConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (scanner.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ScanResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading scanner config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load scanner config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ScanResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ScanError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ScanError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ScanError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Scanner config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ScanResult<()> {
        let url = self.catalog.base_url.as_str();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ScanError::InvalidUrl(format!(
                "Catalog URL must start with http:// or https://, got: {}",
                url
            )));
        }

        if self.search.debounce_ms == 0 {
            return Err(ScanError::InvalidConfig(
                "debounce_ms must be greater than 0".into(),
            ));
        }

        if self.camera.event_buffer == 0 {
            return Err(ScanError::InvalidConfig(
                "event_buffer must be greater than 0".into(),
            ));
        }

        if self.alerts.poll_interval_secs == 0 {
            return Err(ScanError::InvalidConfig(
                "poll_interval_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `STOCKSCAN_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("STOCKSCAN_CATALOG_URL") {
            debug!(url = %url, "Overriding catalog URL from environment");
            self.catalog.base_url = url;
        }

        if let Some(token) = lookup("STOCKSCAN_API_TOKEN") {
            self.catalog.api_token = Some(token);
        }

        if let Some(id) = lookup("STOCKSCAN_CAMERA_ID") {
            debug!(camera_id = %id, "Overriding camera from environment");
            self.camera.preferred_camera_id = Some(id);
        }

        if let Some(mode) = lookup("STOCKSCAN_SCAN_MODE") {
            match mode.parse() {
                Ok(parsed) => self.camera.mode = parsed,
                Err(_) => warn!(mode = %mode, "Unknown scan mode in environment"),
            }
        }

        if let Some(ms) = lookup("STOCKSCAN_DEBOUNCE_MS") {
            if let Ok(ms) = ms.parse::<u64>() {
                self.search.debounce_ms = ms;
            }
        }

        if let Some(secs) = lookup("STOCKSCAN_ALERT_POLL_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                self.alerts.poll_interval_secs = secs;
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "stockscan", "stockscan")
            .map(|dirs| dirs.config_dir().join("scanner.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::from(&self.camera)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.search.debounce_ms)
    }

    /// `None` when duplicate suppression is disabled.
    pub fn duplicate_window(&self) -> Option<Duration> {
        match self.scan.duplicate_window_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn alert_poll_interval(&self) -> Duration {
        Duration::from_secs(self.alerts.poll_interval_secs)
    }
}
