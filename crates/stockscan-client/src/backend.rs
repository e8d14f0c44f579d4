//! # Camera Backend
//!
//! The seam between [`ScanSession`](crate::session::ScanSession) and whatever
//! actually owns the camera and the symbol decoder.
//!
//! ## Contracts
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Backend Contracts                                │
//! │                                                                         │
//! │  ONE-SHOT (async result)              ONGOING (event stream)            │
//! │  ───────────────────────              ──────────────────────            │
//! │  enumerate() → [CameraDevice]         next_frame() → Symbol             │
//! │  acquire(request) → CaptureStream                  → NoSymbol (noise)   │
//! │                                                    → Decoder (noise)    │
//! │                                                    → None (device lost  │
//! │                                                       or input ended)   │
//! │                                                                         │
//! │  release() ── gives the device back; idempotent; also run on Drop       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`WedgeBackend`] is the one concrete backend shipped here: it treats a
//! line-oriented reader (stdin by default) as a "camera", which is exactly
//! how USB keyboard-wedge barcode scanners present themselves.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, warn};

use stockscan_core::{BarcodeFormat, CameraDevice, ScanMode};

// =============================================================================
// Backend Types
// =============================================================================

/// Platform failure while listing or opening a camera.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("camera is in use by another application")]
    DeviceBusy,

    #[error("camera {0} not found")]
    NotFound(String),

    #[error("no camera available")]
    NoCamera,

    #[error("{0}")]
    Platform(String),
}

/// Per-frame decoder result that is not a symbol.
///
/// Continuous scanning produces these on almost every frame; they are
/// steady-state noise and never leave the decode loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("no symbol in frame")]
    NoSymbol,

    #[error("decoder error: {0}")]
    Decoder(String),
}

/// What the session asks the backend to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub camera_id: String,
    pub mode: ScanMode,
    pub torch: bool,
}

impl CaptureRequest {
    pub fn new(camera_id: impl Into<String>, mode: ScanMode) -> Self {
        CaptureRequest {
            camera_id: camera_id.into(),
            mode,
            torch: false,
        }
    }

    /// Symbologies the decoder should look for.
    pub fn formats(&self) -> Vec<BarcodeFormat> {
        self.mode.formats()
    }

    /// Returns true if this request targets the same camera and mode.
    pub fn same_target(&self, camera_id: &str, mode: ScanMode) -> bool {
        self.camera_id == camera_id && self.mode == mode
    }
}

/// A symbol read from one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedSymbol {
    pub code: String,
    pub format: BarcodeFormat,
}

// =============================================================================
// Backend Traits
// =============================================================================

/// Enumerates and opens capture devices.
#[async_trait]
pub trait CameraBackend: Send + Sync {
    /// Lists available devices. Called on every open; never cached.
    async fn enumerate(&self) -> Result<Vec<CameraDevice>, BackendError>;

    /// Opens a device and attaches the decoder for the requested formats.
    async fn acquire(
        &self,
        request: &CaptureRequest,
    ) -> Result<Box<dyn CaptureStream>, BackendError>;
}

/// A live, exclusively owned capture with an attached decoder.
///
/// The session shares the stream with its decode task, so `release()` takes
/// `&self` and may run while a `next_frame` call is pending. Implementations
/// must also release on drop (as a no-op if already released).
#[async_trait]
pub trait CaptureStream: Send + Sync {
    /// Waits for the next decoded frame. `None` means the stream is over:
    /// the device went away, or [`finished`](Self::finished) says the input
    /// simply ran out.
    ///
    /// Must be cancel-safe: the session races it against its stop signal.
    async fn next_frame(&self) -> Option<Result<DecodedSymbol, FrameError>>;

    /// Releases the device. Idempotent.
    fn release(&self);

    /// True once the stream ended because its input was exhausted (end of
    /// file on a wedge scanner), which is an orderly end, not device loss.
    fn finished(&self) -> bool {
        false
    }
}

// =============================================================================
// Keyboard-Wedge Backend
// =============================================================================

/// Device id reported by [`WedgeBackend`].
pub const WEDGE_DEVICE_ID: &str = "wedge";

type SharedLines<R> = Arc<Mutex<Option<Lines<R>>>>;

/// Line-oriented "camera": every non-empty line is one decoded symbol.
///
/// The reader is the device. Acquiring takes it out of the backend and
/// releasing puts it back, so a second concurrent acquire sees the device
/// as busy, just like a real camera.
pub struct WedgeBackend<R> {
    device: CameraDevice,
    reader: SharedLines<R>,
}

impl WedgeBackend<BufReader<Stdin>> {
    /// Wedge scanner on standard input.
    pub fn stdin() -> Self {
        WedgeBackend::new("Keyboard wedge (stdin)", BufReader::new(tokio::io::stdin()))
    }
}

impl<R> WedgeBackend<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(label: impl Into<String>, reader: R) -> Self {
        WedgeBackend {
            device: CameraDevice::new(WEDGE_DEVICE_ID, label),
            reader: Arc::new(Mutex::new(Some(reader.lines()))),
        }
    }
}

#[async_trait]
impl<R> CameraBackend for WedgeBackend<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn enumerate(&self) -> Result<Vec<CameraDevice>, BackendError> {
        Ok(vec![self.device.clone()])
    }

    async fn acquire(
        &self,
        request: &CaptureRequest,
    ) -> Result<Box<dyn CaptureStream>, BackendError> {
        if request.camera_id != self.device.id {
            return Err(BackendError::NotFound(request.camera_id.clone()));
        }

        if request.torch {
            debug!("Wedge scanner has no torch, ignoring");
        }

        let lines = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(BackendError::DeviceBusy)?;

        Ok(Box::new(WedgeStream {
            lines: tokio::sync::Mutex::new(Some(lines)),
            slot: self.reader.clone(),
            mode: request.mode,
            released: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        }))
    }
}

struct WedgeStream<R> {
    lines: tokio::sync::Mutex<Option<Lines<R>>>,
    slot: SharedLines<R>,
    mode: ScanMode,
    released: AtomicBool,
    finished: AtomicBool,
}

impl<R> WedgeStream<R> {
    /// Puts the reader back into the backend.
    ///
    /// A read in flight holds the reader; it goes back when the stream drops.
    fn give_back(&self) {
        if let Ok(mut lines) = self.lines.try_lock() {
            if let Some(lines) = lines.take() {
                *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(lines);
            }
        }
    }
}

#[async_trait]
impl<R> CaptureStream for WedgeStream<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn next_frame(&self) -> Option<Result<DecodedSymbol, FrameError>> {
        if self.released.load(Ordering::Acquire) {
            return None;
        }
        let mut guard = self.lines.lock().await;
        let lines = guard.as_mut()?;

        match lines.next_line().await {
            Ok(Some(line)) => {
                let code = line.trim();
                if code.is_empty() {
                    return Some(Err(FrameError::NoSymbol));
                }
                // Wedge input carries no symbology; anything typed in QR mode
                // is taken as a QR payload.
                let format = match self.mode {
                    ScanMode::Qr => BarcodeFormat::QrCode,
                    _ => BarcodeFormat::infer(code),
                };
                Some(Ok(DecodedSymbol {
                    code: code.to_string(),
                    format,
                }))
            }
            Ok(None) => {
                debug!("Wedge input reached end of file");
                self.finished.store(true, Ordering::Release);
                None
            }
            Err(e) => {
                warn!(?e, "Wedge input failed");
                None
            }
        }
    }

    fn release(&self) {
        self.released.store(true, Ordering::Release);
        self.give_back();
    }

    fn finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

impl<R> Drop for WedgeStream<R> {
    fn drop(&mut self) {
        self.give_back();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wedge(input: &'static str) -> WedgeBackend<BufReader<&'static [u8]>> {
        WedgeBackend::new("test wedge", BufReader::new(input.as_bytes()))
    }

    #[tokio::test]
    async fn test_wedge_reads_symbols_and_noise() {
        let backend = wedge("0123456789012\n\nSKU-42\n");
        let stream = backend
            .acquire(&CaptureRequest::new(WEDGE_DEVICE_ID, ScanMode::Both))
            .await
            .unwrap();

        let first = stream.next_frame().await.unwrap().unwrap();
        assert_eq!(first.code, "0123456789012");
        assert_eq!(first.format, BarcodeFormat::Ean13);

        assert_eq!(stream.next_frame().await, Some(Err(FrameError::NoSymbol)));

        let third = stream.next_frame().await.unwrap().unwrap();
        assert_eq!(third.format, BarcodeFormat::Code128);

        assert!(!stream.finished());
        assert!(stream.next_frame().await.is_none());
        assert!(stream.finished());
    }

    #[tokio::test]
    async fn test_wedge_is_exclusive_until_released() {
        let backend = wedge("a\n");
        let request = CaptureRequest::new(WEDGE_DEVICE_ID, ScanMode::Both);

        let stream = backend.acquire(&request).await.unwrap();
        assert_eq!(
            backend.acquire(&request).await.err(),
            Some(BackendError::DeviceBusy)
        );

        stream.release();
        stream.release();
        assert!(stream.next_frame().await.is_none());
        assert!(!stream.finished());
        assert!(backend.acquire(&request).await.is_ok());
    }

    #[tokio::test]
    async fn test_wedge_released_on_drop() {
        let backend = wedge("a\n");
        let request = CaptureRequest::new(WEDGE_DEVICE_ID, ScanMode::Both);

        drop(backend.acquire(&request).await.unwrap());
        assert!(backend.acquire(&request).await.is_ok());
    }

    #[tokio::test]
    async fn test_wedge_unknown_camera() {
        let backend = wedge("");
        let err = backend
            .acquire(&CaptureRequest::new("usb-cam", ScanMode::Both))
            .await
            .err();
        assert_eq!(err, Some(BackendError::NotFound("usb-cam".into())));
        assert_eq!(backend.enumerate().await.unwrap()[0].id, WEDGE_DEVICE_ID);
    }
}
