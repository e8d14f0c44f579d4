//! Test doubles for the camera backend and the catalog.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;

use stockscan_core::{Alert, AlertKind, BarcodeFormat, CameraDevice, Item, SessionState};

use crate::backend::{
    BackendError, CameraBackend, CaptureRequest, CaptureStream, DecodedSymbol, FrameError,
};
use crate::catalog::{AlertSource, CatalogClient};
use crate::coordinator::ScanOutcome;
use crate::emitter::ScanEventEmitter;
use crate::error::{ScanError, ScanResult};

type Frame = Result<DecodedSymbol, FrameError>;

// =============================================================================
// Mock Camera Backend
// =============================================================================

/// Scriptable backend that tracks how many devices are held at once.
pub(crate) struct MockBackend {
    devices: Vec<CameraDevice>,
    enumerate_error: Mutex<Option<BackendError>>,
    hang_acquire: AtomicBool,
    acquire_errors: Mutex<VecDeque<BackendError>>,
    requests: Mutex<Vec<CaptureRequest>>,
    feeds: Mutex<Vec<mpsc::UnboundedSender<Frame>>>,
    held: Arc<AtomicUsize>,
    max_held: Arc<AtomicUsize>,
    log: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    pub fn with_cameras(ids: &[&str]) -> Self {
        MockBackend {
            devices: ids
                .iter()
                .map(|id| CameraDevice::new(*id, format!("Camera {}", id)))
                .collect(),
            enumerate_error: Mutex::new(None),
            hang_acquire: AtomicBool::new(false),
            acquire_errors: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            feeds: Mutex::new(Vec::new()),
            held: Arc::new(AtomicUsize::new(0)),
            max_held: Arc::new(AtomicUsize::new(0)),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn fail_enumerate(&self, err: BackendError) {
        *self.enumerate_error.lock().unwrap() = Some(err);
    }

    /// Makes `acquire` wait forever, like an unanswered permission prompt.
    pub fn hang_acquire(&self, hang: bool) {
        self.hang_acquire.store(hang, Ordering::SeqCst);
    }

    pub fn fail_next_acquire(&self, err: BackendError) {
        self.acquire_errors.lock().unwrap().push_back(err);
    }

    /// Sends a decoded symbol to the most recently acquired stream.
    pub fn feed(&self, code: &str, format: BarcodeFormat) {
        self.send(Ok(DecodedSymbol {
            code: code.to_string(),
            format,
        }));
    }

    pub fn feed_noise(&self, err: FrameError) {
        self.send(Err(err));
    }

    /// Ends the most recent stream as if the device was unplugged.
    pub fn disconnect(&self) {
        self.feeds.lock().unwrap().pop();
    }

    pub fn held(&self) -> usize {
        self.held.load(Ordering::SeqCst)
    }

    pub fn max_held(&self) -> usize {
        self.max_held.load(Ordering::SeqCst)
    }

    pub fn acquire_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CaptureRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn send(&self, frame: Frame) {
        if let Some(tx) = self.feeds.lock().unwrap().last() {
            let _ = tx.send(frame);
        }
    }
}

#[async_trait]
impl CameraBackend for MockBackend {
    async fn enumerate(&self) -> Result<Vec<CameraDevice>, BackendError> {
        match self.enumerate_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(self.devices.clone()),
        }
    }

    async fn acquire(
        &self,
        request: &CaptureRequest,
    ) -> Result<Box<dyn CaptureStream>, BackendError> {
        if self.hang_acquire.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if let Some(err) = self.acquire_errors.lock().unwrap().pop_front() {
            return Err(err);
        }
        if !self.devices.iter().any(|d| d.id == request.camera_id) {
            return Err(BackendError::NotFound(request.camera_id.clone()));
        }

        self.requests.lock().unwrap().push(request.clone());
        let now_held = self.held.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_held.fetch_max(now_held, Ordering::SeqCst);
        self.log
            .lock()
            .unwrap()
            .push(format!("acquire:{}", request.camera_id));

        let (tx, rx) = mpsc::unbounded_channel();
        self.feeds.lock().unwrap().push(tx);

        Ok(Box::new(MockStream {
            camera_id: request.camera_id.clone(),
            rx: tokio::sync::Mutex::new(rx),
            released: AtomicBool::new(false),
            held: self.held.clone(),
            log: self.log.clone(),
        }))
    }
}

struct MockStream {
    camera_id: String,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Frame>>,
    released: AtomicBool,
    held: Arc<AtomicUsize>,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl CaptureStream for MockStream {
    async fn next_frame(&self) -> Option<Frame> {
        if self.released.load(Ordering::SeqCst) {
            return None;
        }
        self.rx.lock().await.recv().await
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.held.fetch_sub(1, Ordering::SeqCst);
            if let Ok(mut log) = self.log.lock() {
                log.push(format!("release:{}", self.camera_id));
            }
        }
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.release();
    }
}

// =============================================================================
// Mock Catalog
// =============================================================================

pub(crate) fn item(id: &str, name: &str, barcode: Option<&str>) -> Item {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "name": name,
        "quantity": 3,
        "barcode": barcode,
    }))
    .unwrap()
}

/// In-memory catalog with a network kill switch.
pub(crate) struct MockCatalog {
    items: Vec<Item>,
    alerts: Mutex<Vec<Alert>>,
    offline: AtomicBool,
    lookups: Mutex<Vec<String>>,
    searches: Mutex<Vec<String>>,
    alert_fetches: AtomicUsize,
}

impl MockCatalog {
    pub fn new(items: Vec<Item>) -> Self {
        MockCatalog {
            items,
            alerts: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
            lookups: Mutex::new(Vec::new()),
            searches: Mutex::new(Vec::new()),
            alert_fetches: AtomicUsize::new(0),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_alerts(&self, alerts: Vec<Alert>) {
        *self.alerts.lock().unwrap() = alerts;
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }

    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().unwrap().clone()
    }

    pub fn alert_fetches(&self) -> usize {
        self.alert_fetches.load(Ordering::SeqCst)
    }

    async fn round_trip(&self) -> ScanResult<()> {
        tokio::task::yield_now().await;
        if self.offline.load(Ordering::SeqCst) {
            return Err(ScanError::LookupNetwork("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogClient for MockCatalog {
    async fn find_by_code(&self, code: &str) -> ScanResult<Vec<Item>> {
        self.lookups.lock().unwrap().push(code.to_string());
        self.round_trip().await?;
        Ok(self
            .items
            .iter()
            .filter(|i| i.matches_code(code))
            .cloned()
            .collect())
    }

    async fn search_catalog(&self, query: &str) -> ScanResult<Vec<Item>> {
        self.searches.lock().unwrap().push(query.to_string());
        self.round_trip().await?;
        let needle = query.to_lowercase();
        Ok(self
            .items
            .iter()
            .filter(|i| i.name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AlertSource for MockCatalog {
    async fn fetch_alerts(&self) -> ScanResult<Vec<Alert>> {
        self.alert_fetches.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await?;
        Ok(self.alerts.lock().unwrap().clone())
    }
}

pub(crate) fn alert(id: &str, kind: AlertKind, read: bool) -> Alert {
    Alert {
        id: id.to_string(),
        item_id: Some(format!("item-{}", id)),
        item_name: Some("Office Chair".to_string()),
        kind,
        message: "Stock is running low".to_string(),
        created_at: Utc::now(),
        read,
    }
}

// =============================================================================
// Recording Emitter
// =============================================================================

/// Emitter that keeps everything it was told.
#[derive(Default)]
pub(crate) struct RecordingEmitter {
    pub states: Mutex<Vec<SessionState>>,
    pub outcomes: Mutex<Vec<ScanOutcome>>,
    pub errors: Mutex<Vec<String>>,
}

impl ScanEventEmitter for RecordingEmitter {
    fn emit_state(&self, state: &SessionState) {
        self.states.lock().unwrap().push(state.clone());
    }

    fn emit_outcome(&self, outcome: &ScanOutcome) {
        self.outcomes.lock().unwrap().push(outcome.clone());
    }

    fn emit_error(&self, message: &str, _retryable: bool) {
        self.errors.lock().unwrap().push(message.to_string());
    }
}
