//! # Domain Types
//!
//! Core domain types shared by the scanner session, the coordinator and the
//! dashboard UI (via generated TypeScript bindings).
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   ScanEvent     │   │  CameraDevice   │   │      Item       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  code           │   │  id             │   │  id             │       │
//! │  │  format         │   │  label          │   │  name           │       │
//! │  │  timestamp      │   └─────────────────┘   │  barcode        │       │
//! │  └─────────────────┘                         │  ...opaque      │       │
//! │                                              └─────────────────┘       │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ BarcodeFormat   │   │  SessionState   │   │ResolutionResult │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  UPC_A, EAN_13  │   │  Idle           │   │  Found(item)    │       │
//! │  │  CODE_128, ...  │   │  Starting       │   │  NotFound(code) │       │
//! │  │  QR_CODE        │   │  Active         │   │  Error(reason)  │       │
//! │  └─────────────────┘   │  Stopping       │   └─────────────────┘       │
//! │                        │  Error(reason)  │                              │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Barcode Format
// =============================================================================

/// Symbologies the decoder can be asked for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BarcodeFormat {
    UpcA,
    UpcE,
    #[serde(rename = "EAN_13")]
    Ean13,
    #[serde(rename = "EAN_8")]
    Ean8,
    #[serde(rename = "CODE_128")]
    Code128,
    #[serde(rename = "CODE_39")]
    Code39,
    #[serde(rename = "CODE_93")]
    Code93,
    Codabar,
    QrCode,
}

impl BarcodeFormat {
    /// Every supported format, linear symbologies first.
    pub const ALL: [BarcodeFormat; 9] = [
        BarcodeFormat::UpcA,
        BarcodeFormat::UpcE,
        BarcodeFormat::Ean13,
        BarcodeFormat::Ean8,
        BarcodeFormat::Code128,
        BarcodeFormat::Code39,
        BarcodeFormat::Code93,
        BarcodeFormat::Codabar,
        BarcodeFormat::QrCode,
    ];

    /// Linear (1D) symbologies.
    pub const LINEAR: [BarcodeFormat; 8] = [
        BarcodeFormat::UpcA,
        BarcodeFormat::UpcE,
        BarcodeFormat::Ean13,
        BarcodeFormat::Ean8,
        BarcodeFormat::Code128,
        BarcodeFormat::Code39,
        BarcodeFormat::Code93,
        BarcodeFormat::Codabar,
    ];

    /// Returns the wire name (`"EAN_13"`, `"QR_CODE"`, ...).
    pub const fn as_str(&self) -> &'static str {
        match self {
            BarcodeFormat::UpcA => "UPC_A",
            BarcodeFormat::UpcE => "UPC_E",
            BarcodeFormat::Ean13 => "EAN_13",
            BarcodeFormat::Ean8 => "EAN_8",
            BarcodeFormat::Code128 => "CODE_128",
            BarcodeFormat::Code39 => "CODE_39",
            BarcodeFormat::Code93 => "CODE_93",
            BarcodeFormat::Codabar => "CODABAR",
            BarcodeFormat::QrCode => "QR_CODE",
        }
    }

    /// Returns true for 2D matrix symbologies.
    #[inline]
    pub const fn is_two_dimensional(&self) -> bool {
        matches!(self, BarcodeFormat::QrCode)
    }

    /// Returns true for GTIN symbologies that carry a mod-10 check digit.
    #[inline]
    pub const fn has_gtin_check_digit(&self) -> bool {
        matches!(
            self,
            BarcodeFormat::UpcA | BarcodeFormat::Ean13 | BarcodeFormat::Ean8
        )
    }

    /// Guesses the symbology of a code that arrived without format metadata.
    ///
    /// ## Why This Exists
    /// Keyboard-wedge scanners "type" the payload followed by Enter and never
    /// say which symbology they read. Retail codes are recognisable by length:
    ///
    /// - 8 digits → EAN-8
    /// - 12 digits → UPC-A
    /// - 13 digits → EAN-13
    /// - anything else → CODE-128 (the catch-all alphanumeric symbology)
    pub fn infer(code: &str) -> BarcodeFormat {
        let code = code.trim();
        if !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()) {
            match code.len() {
                8 => return BarcodeFormat::Ean8,
                12 => return BarcodeFormat::UpcA,
                13 => return BarcodeFormat::Ean13,
                _ => {}
            }
        }
        BarcodeFormat::Code128
    }
}

impl std::fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BarcodeFormat {
    type Err = CoreError;

    /// Accepts the wire name plus the loose spellings decoders use
    /// (`ean13`, `EAN-13`, `qr`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        match normalized.as_str() {
            "UPCA" => Ok(BarcodeFormat::UpcA),
            "UPCE" => Ok(BarcodeFormat::UpcE),
            "EAN13" => Ok(BarcodeFormat::Ean13),
            "EAN8" => Ok(BarcodeFormat::Ean8),
            "CODE128" => Ok(BarcodeFormat::Code128),
            "CODE39" => Ok(BarcodeFormat::Code39),
            "CODE93" => Ok(BarcodeFormat::Code93),
            "CODABAR" => Ok(BarcodeFormat::Codabar),
            "QR" | "QRCODE" => Ok(BarcodeFormat::QrCode),
            _ => Err(CoreError::UnknownFormat(s.to_string())),
        }
    }
}

// =============================================================================
// Scan Mode
// =============================================================================

/// Which family of symbols the decoder is asked to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Linear product barcodes only.
    Barcode,
    /// QR codes only.
    Qr,
    /// Everything the decoder supports.
    #[default]
    Both,
}

impl ScanMode {
    /// Formats requested from the decoder in this mode.
    pub fn formats(&self) -> Vec<BarcodeFormat> {
        match self {
            ScanMode::Barcode => BarcodeFormat::LINEAR.to_vec(),
            ScanMode::Qr => vec![BarcodeFormat::QrCode],
            ScanMode::Both => BarcodeFormat::ALL.to_vec(),
        }
    }

    /// Returns true if a decoded symbol of `format` belongs to this mode.
    pub fn accepts(&self, format: BarcodeFormat) -> bool {
        match self {
            ScanMode::Barcode => !format.is_two_dimensional(),
            ScanMode::Qr => format.is_two_dimensional(),
            ScanMode::Both => true,
        }
    }
}

impl std::fmt::Display for ScanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanMode::Barcode => write!(f, "barcode"),
            ScanMode::Qr => write!(f, "qr"),
            ScanMode::Both => write!(f, "both"),
        }
    }
}

impl std::str::FromStr for ScanMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "barcode" | "1d" | "linear" => Ok(ScanMode::Barcode),
            "qr" | "qrcode" | "2d" => Ok(ScanMode::Qr),
            "both" | "all" => Ok(ScanMode::Both),
            other => Err(CoreError::UnknownScanMode(other.to_string())),
        }
    }
}

// =============================================================================
// Scan Event
// =============================================================================

/// One successful decode.
///
/// Immutable once created; whoever receives it owns its copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ScanEvent {
    /// Decoded payload, never empty.
    pub code: String,

    /// Symbology the decoder reported.
    pub format: BarcodeFormat,

    /// When the frame was decoded.
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
}

impl ScanEvent {
    /// Creates an event stamped with the current time.
    pub fn new(code: impl Into<String>, format: BarcodeFormat) -> CoreResult<Self> {
        Self::at(code, format, Utc::now())
    }

    /// Creates an event with an explicit timestamp.
    ///
    /// Surrounding whitespace is stripped (wedge scanners append `\r\n`).
    pub fn at(
        code: impl Into<String>,
        format: BarcodeFormat,
        timestamp: DateTime<Utc>,
    ) -> CoreResult<Self> {
        let code = code.into().trim().to_string();
        if code.is_empty() {
            return Err(CoreError::EmptyCode);
        }

        Ok(ScanEvent {
            code,
            format,
            timestamp,
        })
    }
}

// =============================================================================
// Camera Device
// =============================================================================

/// An available capture device, as reported by the platform.
///
/// Never persisted: labels and ids go stale when permissions change, so the
/// list is re-enumerated every time the scanner opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CameraDevice {
    pub id: String,
    pub label: String,
}

impl CameraDevice {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        CameraDevice {
            id: id.into(),
            label: label.into(),
        }
    }

    /// Heuristic on the platform label: "Back Camera", "rear", "environment".
    pub fn is_rear_facing(&self) -> bool {
        let label = self.label.to_lowercase();
        ["back", "rear", "environment"]
            .iter()
            .any(|hint| label.contains(hint))
    }

    /// Picks the camera to open when the user has not chosen one.
    ///
    /// ## Order
    /// 1. `preferred_id`, if it is still present in the list
    /// 2. The first rear-facing camera (better for scanning labels)
    /// 3. The first camera
    pub fn pick_default<'a>(
        devices: &'a [CameraDevice],
        preferred_id: Option<&str>,
    ) -> Option<&'a CameraDevice> {
        if let Some(id) = preferred_id {
            if let Some(device) = devices.iter().find(|d| d.id == id) {
                return Some(device);
            }
        }

        devices
            .iter()
            .find(|d| d.is_rear_facing())
            .or_else(|| devices.first())
    }
}

// =============================================================================
// Session State
// =============================================================================

/// Lifecycle state of a scan session.
///
/// ```text
///   Idle ──start──► Starting ──acquired──► Active ──stop──► Stopping ──► Idle
///                      │                     │ ▲
///                      │ failure             └─┘ decode (emits ScanEvent)
///                      ▼
///                    Error ──start──► Starting
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Starting,
    Active,
    Stopping,
    Error { reason: String },
}

impl SessionState {
    /// Returns true if the decode loop is attached and emitting.
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active)
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, SessionState::Error { .. })
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Starting => write!(f, "starting"),
            SessionState::Active => write!(f, "active"),
            SessionState::Stopping => write!(f, "stopping"),
            SessionState::Error { reason } => write!(f, "error: {}", reason),
        }
    }
}

// =============================================================================
// Catalog Item
// =============================================================================

/// An inventory item as returned by the catalog API.
///
/// Only `id`, `name` and `barcode` drive scanner logic. Everything else is
/// carried through untouched so the UI can render the full record, including
/// fields this crate does not know about (`extra`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(alias = "_id")]
    pub id: String,

    pub name: String,

    #[serde(default)]
    #[ts(type = "number")]
    pub quantity: i64,

    #[serde(default)]
    pub price: Option<f64>,

    /// Folder reference (id or embedded folder object).
    #[serde(default)]
    #[ts(type = "unknown")]
    pub folder: Option<Value>,

    #[serde(default)]
    #[ts(type = "unknown[]")]
    pub images: Vec<Value>,

    #[serde(default)]
    pub barcode: Option<String>,

    /// Format string as stored by the backend (not validated).
    #[serde(default)]
    pub barcode_format: Option<String>,

    /// Unknown fields, passed through as-is.
    #[serde(flatten)]
    #[ts(skip)]
    pub extra: Map<String, Value>,
}

impl Item {
    /// Returns true if this item's barcode equals `code` exactly.
    pub fn matches_code(&self, code: &str) -> bool {
        self.barcode.as_deref().map(str::trim) == Some(code.trim())
    }

    /// Parses the stored format string, if any.
    pub fn format(&self) -> Option<BarcodeFormat> {
        self.barcode_format.as_deref()?.parse().ok()
    }
}

/// Pre-filled "create item" form offered when a scan finds nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ItemDraft {
    pub name: String,
    #[ts(type = "number")]
    pub quantity: i64,
    pub barcode: String,
    pub barcode_format: BarcodeFormat,
}

impl ItemDraft {
    /// Draft for a code read by the camera (format known).
    pub fn from_scan(event: &ScanEvent) -> Self {
        ItemDraft {
            name: String::new(),
            quantity: 1,
            barcode: event.code.clone(),
            barcode_format: event.format,
        }
    }

    /// Draft for a code without format metadata.
    pub fn for_code(code: &str) -> Self {
        ItemDraft {
            name: String::new(),
            quantity: 1,
            barcode: code.trim().to_string(),
            barcode_format: BarcodeFormat::infer(code),
        }
    }
}

// =============================================================================
// Resolution Result
// =============================================================================

/// Outcome of resolving one scanned code against the catalog.
///
/// `NotFound` and `Error` are deliberately separate: a dropped network call
/// must never look like "this item does not exist".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum ResolutionResult {
    /// Exactly one catalog item carries this code.
    Found(Item),
    /// Lookup completed with no match.
    NotFound(String),
    /// Lookup did not complete.
    Error(String),
}

impl ResolutionResult {
    #[inline]
    pub fn is_found(&self) -> bool {
        matches!(self, ResolutionResult::Found(_))
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolutionResult::NotFound(_))
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, ResolutionResult::Error(_))
    }

    /// Returns the matched item, if any.
    pub fn item(&self) -> Option<&Item> {
        match self {
            ResolutionResult::Found(item) => Some(item),
            _ => None,
        }
    }

    /// "Create new item with this barcode" suggestion.
    ///
    /// Only `NotFound` produces one; an `Error` must be retried, not turned
    /// into a duplicate item.
    pub fn create_suggestion(&self) -> Option<ItemDraft> {
        match self {
            ResolutionResult::NotFound(code) => Some(ItemDraft::for_code(code)),
            _ => None,
        }
    }

    /// Toast shown for this outcome.
    pub fn notice(&self) -> Notice {
        match self {
            ResolutionResult::Found(item) => Notice::success(format!("Found: {}", item.name)),
            ResolutionResult::NotFound(code) => Notice::info(format!(
                "No item found for {}. Create a new item with this barcode?",
                code
            )),
            ResolutionResult::Error(reason) => Notice::error(format!("Search failed: {}", reason)),
        }
    }
}

// =============================================================================
// Notices
// =============================================================================

/// Severity of a fire-and-forget notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

/// A toast message for the notification surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

// =============================================================================
// Alerts
// =============================================================================

/// Kind of stock alert raised by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    LowStock,
    OutOfStock,
    Expiring,
    #[serde(other)]
    Other,
}

/// A stock alert polled from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(alias = "_id")]
    pub id: String,

    #[serde(default)]
    pub item_id: Option<String>,

    #[serde(default)]
    pub item_name: Option<String>,

    pub kind: AlertKind,

    #[serde(default)]
    pub message: String,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub read: bool,
}
