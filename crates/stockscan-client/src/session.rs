//! # Scan Session
//!
//! Owns one camera capture and its continuous decode loop.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Scan Session States                               │
//! │                                                                         │
//! │  ┌────────┐  start()   ┌──────────┐  acquired   ┌────────┐             │
//! │  │  Idle  │ ─────────► │ Starting │ ──────────► │ Active │ ◄─┐ decode  │
//! │  └────────┘            └────┬─────┘             └───┬────┘ ──┘ (emit)  │
//! │      ▲                      │ acquisition           │                   │
//! │      │                      │ failed                │ stop()            │
//! │      │                      ▼                       ▼                   │
//! │      │                 ┌─────────┐            ┌──────────┐              │
//! │      │◄──── stop() ─── │  Error  │            │ Stopping │              │
//! │      │                 └─────────┘            └────┬─────┘              │
//! │      └─────────────────────────────────────────────┘                    │
//! │                                                                         │
//! │  RESTART (camera switch / torch toggle)                                │
//! │  ──────────────────────────────────────                                │
//! │  Active ──► Stopping ──► (decode loop joined, device released)         │
//! │         ──► Starting ──► Active                                        │
//! │  Two decode loops never run at the same time.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ownership
//! The capture stream is shared between the spawned decode task and the
//! session, so dropping the session can release the device on the spot.
//! Lifecycle operations are serialized by one async mutex around the active
//! capture, so `start`, `stop`, `toggle_torch` and `shutdown` never
//! interleave. A pending acquisition is the one exception: `stop` and
//! `shutdown` bump a cancel epoch before taking the lock, and `start` races
//! the backend against that epoch, so an unanswered permission prompt can
//! never block teardown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use stockscan_core::validation::validate_code;
use stockscan_core::{CameraDevice, ScanEvent, ScanMode, SessionState};

use crate::backend::{CameraBackend, CaptureRequest, CaptureStream, FrameError};
use crate::emitter::{NoOpEmitter, ScanEventEmitter};
use crate::error::{ScanError, ScanResult};

// =============================================================================
// Session Configuration
// =============================================================================

/// Tunables for a scan session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long `stop()` waits for the decode loop before aborting it.
    pub stop_timeout: Duration,

    /// Capacity of the ScanEvent broadcast channel.
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            stop_timeout: Duration::from_secs(2),
            event_buffer: 64,
        }
    }
}

// =============================================================================
// Scan Session
// =============================================================================

/// The decode loop currently attached to a device.
struct ActiveCapture {
    request: CaptureRequest,
    stream: Arc<dyn CaptureStream>,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Camera + decoder lifecycle manager.
///
/// ## Usage
/// ```rust,ignore
/// let session = ScanSession::new(backend, SessionConfig::default());
/// let mut events = session.subscribe();
///
/// let cameras = session.list_cameras().await?;
/// session.start(&cameras[0].id, ScanMode::Both).await?;
///
/// while let Ok(event) = events.recv().await {
///     println!("{} ({})", event.code, event.format);
/// }
/// ```
pub struct ScanSession {
    id: Uuid,
    backend: Arc<dyn CameraBackend>,
    config: SessionConfig,
    state_tx: Arc<watch::Sender<SessionState>>,
    events_tx: broadcast::Sender<ScanEvent>,
    capture: Mutex<Option<ActiveCapture>>,
    /// Bumped by `stop`/`shutdown`; a `start` that saw an older value gives up.
    cancel_tx: watch::Sender<u64>,
    emitter: Arc<dyn ScanEventEmitter>,
}

impl ScanSession {
    /// Creates an idle session over `backend`.
    pub fn new(backend: Arc<dyn CameraBackend>, config: SessionConfig) -> Self {
        Self::with_emitter(backend, config, Arc::new(NoOpEmitter))
    }

    /// Creates an idle session with a custom event emitter.
    pub fn with_emitter(
        backend: Arc<dyn CameraBackend>,
        config: SessionConfig,
        emitter: Arc<dyn ScanEventEmitter>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Idle);
        let (events_tx, _) = broadcast::channel(config.event_buffer.max(1));
        let (cancel_tx, _) = watch::channel(0);

        ScanSession {
            id: Uuid::new_v4(),
            backend,
            config,
            state_tx: Arc::new(state_tx),
            events_tx,
            capture: Mutex::new(None),
            cancel_tx,
            emitter,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Receiver for decoded events, in decode order.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.events_tx.subscribe()
    }

    /// Parameters of the attached capture, if any.
    pub async fn current_request(&self) -> Option<CaptureRequest> {
        self.capture.lock().await.as_ref().map(|c| c.request.clone())
    }

    /// Enumerates capture devices.
    ///
    /// Always asks the backend: device ids and labels go stale when
    /// permissions change, so the list is never cached.
    pub async fn list_cameras(&self) -> ScanResult<Vec<CameraDevice>> {
        match self.backend.enumerate().await {
            Ok(devices) => {
                debug!(count = devices.len(), "Enumerated cameras");
                Ok(devices)
            }
            Err(reason) => {
                warn!(error = %reason, "Camera enumeration failed");
                Err(ScanError::DeviceEnumeration(reason))
            }
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Opens `camera_id` and starts decoding symbols for `mode`.
    ///
    /// ## Behavior
    /// - Already `Active` with the same camera and mode: no-op
    /// - `Active` with different parameters: the current capture is fully
    ///   stopped and released before the new camera is acquired
    /// - From `Idle` or `Error`: a fresh acquisition
    ///
    /// On failure the session moves to `Error` and the error is reported to
    /// the emitter exactly once. A `stop()` or `shutdown()` issued while the
    /// camera is still being opened wins: the session ends in `Idle` and this
    /// returns [`ScanError::StartCancelled`].
    pub async fn start(&self, camera_id: &str, mode: ScanMode) -> ScanResult<()> {
        let epoch = *self.cancel_tx.borrow();
        let mut capture = self.capture.lock().await;

        if let Some(active) = capture.as_ref() {
            if active.request.same_target(camera_id, mode) && self.state().is_active() {
                debug!(session_id = %self.id, camera_id, "Session already active");
                return Ok(());
            }
        }

        self.restart(&mut capture, CaptureRequest::new(camera_id, mode), epoch)
            .await
    }

    /// Stops decoding and releases the camera.
    ///
    /// Safe in every state and never fails; always ends in `Idle`.
    pub async fn stop(&self) {
        self.cancel_pending_start();
        let mut capture = self.capture.lock().await;

        if let Some(active) = capture.take() {
            info!(
                session_id = %self.id,
                camera_id = %active.request.camera_id,
                "Stopping scan session"
            );
            self.set_state(SessionState::Stopping);
            self.teardown(active, true).await;
        }

        self.set_state(SessionState::Idle);
    }

    /// Switches the torch by reacquiring the camera with the new flag.
    ///
    /// The torch is a capture constraint here, so this is a stop + start
    /// rather than a hot toggle. Outside `Active` it is a no-op.
    pub async fn toggle_torch(&self, enabled: bool) -> ScanResult<()> {
        let epoch = *self.cancel_tx.borrow();
        let mut capture = self.capture.lock().await;

        let request = match capture.as_ref() {
            Some(active) if self.state().is_active() => active.request.clone(),
            _ => {
                debug!(enabled, "Torch toggle ignored, session not active");
                return Ok(());
            }
        };

        if request.torch == enabled {
            return Ok(());
        }

        info!(session_id = %self.id, enabled, "Restarting capture to toggle torch");
        self.restart(
            &mut capture,
            CaptureRequest {
                torch: enabled,
                ..request
            },
            epoch,
        )
        .await
    }

    /// Forced teardown: aborts the decode loop without waiting for a
    /// graceful stop and releases the device before returning.
    ///
    /// A pending `start` is cancelled; an in-flight `stop` is waited for, so
    /// the device is guaranteed released when this returns.
    pub async fn shutdown(&self) {
        self.cancel_pending_start();
        let mut capture = self.capture.lock().await;

        if let Some(active) = capture.take() {
            info!(session_id = %self.id, "Shutting down scan session");
            self.teardown(active, false).await;
        }

        self.set_state(SessionState::Idle);
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Tears down whatever is attached, then acquires `request`.
    ///
    /// `epoch` is the cancel epoch the caller saw before queueing for the
    /// lock; any `stop`/`shutdown` since then aborts the acquisition.
    async fn restart(
        &self,
        slot: &mut Option<ActiveCapture>,
        request: CaptureRequest,
        epoch: u64,
    ) -> ScanResult<()> {
        if *self.cancel_tx.borrow() != epoch {
            debug!(session_id = %self.id, camera_id = %request.camera_id, "Start superseded by stop");
            return Err(ScanError::StartCancelled {
                camera_id: request.camera_id,
            });
        }

        if let Some(active) = slot.take() {
            self.set_state(SessionState::Stopping);
            self.teardown(active, true).await;
        }

        self.set_state(SessionState::Starting);
        info!(
            session_id = %self.id,
            camera_id = %request.camera_id,
            mode = %request.mode,
            torch = request.torch,
            "Starting scan session"
        );

        let acquired = tokio::select! {
            biased;

            _ = cancelled(self.cancel_tx.subscribe(), epoch) => None,
            result = self.backend.acquire(&request) => Some(result),
        };

        match acquired {
            None => {
                // The acquire future is dropped here; a stream it was about
                // to hand back is released by its own Drop.
                info!(session_id = %self.id, camera_id = %request.camera_id, "Camera start cancelled");
                self.set_state(SessionState::Idle);
                Err(ScanError::StartCancelled {
                    camera_id: request.camera_id,
                })
            }
            Some(Ok(stream)) => {
                self.set_state(SessionState::Active);
                *slot = Some(self.spawn_decode_loop(Arc::from(stream), request));
                Ok(())
            }
            Some(Err(reason)) => {
                let err = ScanError::DeviceAcquisition {
                    camera_id: request.camera_id.clone(),
                    reason,
                };
                warn!(session_id = %self.id, error = %err, "Camera acquisition failed");

                self.set_state(SessionState::Error {
                    reason: err.to_string(),
                });
                self.emitter.emit_error(&err.user_message(), err.is_retryable());
                Err(err)
            }
        }
    }

    fn spawn_decode_loop(
        &self,
        stream: Arc<dyn CaptureStream>,
        request: CaptureRequest,
    ) -> ActiveCapture {
        let (stop_tx, stop_rx) = watch::channel(false);

        let task = tokio::spawn(decode_loop(DecodeLoop {
            session_id: self.id,
            stream: stream.clone(),
            mode: request.mode,
            stop_rx,
            state_tx: self.state_tx.clone(),
            events_tx: self.events_tx.clone(),
            emitter: self.emitter.clone(),
        }));

        ActiveCapture {
            request,
            stream,
            stop_tx,
            task,
        }
    }

    /// Signals the decode loop and waits (bounded) for it to release the
    /// device. Falls back to aborting the task so this always returns.
    async fn teardown(&self, mut active: ActiveCapture, graceful: bool) {
        active.stop_tx.send_replace(true);

        if graceful {
            match timeout(self.config.stop_timeout, &mut active.task).await {
                Ok(Ok(())) => {
                    debug!(session_id = %self.id, "Decode loop stopped");
                    return;
                }
                Ok(Err(e)) => {
                    warn!(session_id = %self.id, ?e, "Decode loop ended abnormally");
                    return;
                }
                Err(_) => {
                    warn!(
                        session_id = %self.id,
                        timeout_ms = self.config.stop_timeout.as_millis() as u64,
                        "Decode loop did not stop in time, aborting"
                    );
                }
            }
        }

        active.task.abort();
        active.stream.release();
        if timeout(self.config.stop_timeout, active.task).await.is_err() {
            warn!(session_id = %self.id, "Decode task still running after abort");
        }
    }

    fn cancel_pending_start(&self) {
        self.cancel_tx
            .send_modify(|epoch| *epoch = epoch.wrapping_add(1));
    }

    fn set_state(&self, next: SessionState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        });

        if changed {
            debug!(session_id = %self.id, state = %next, "Session state changed");
            self.emitter.emit_state(&next);
        }
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        if let Some(active) = self.capture.get_mut().take() {
            active.stop_tx.send_replace(true);
            active.task.abort();
            active.stream.release();
            debug!(session_id = %self.id, "Session dropped while capturing, device released");
        }
        self.state_tx.send_replace(SessionState::Idle);
    }
}

/// Resolves once the cancel epoch moves past `epoch`.
async fn cancelled(mut rx: watch::Receiver<u64>, epoch: u64) {
    loop {
        if *rx.borrow_and_update() != epoch {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

// =============================================================================
// Decode Loop
// =============================================================================

/// Why the decode loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopExit {
    Stopped,
    EndOfInput,
    DeviceLost,
}

struct DecodeLoop {
    session_id: Uuid,
    stream: Arc<dyn CaptureStream>,
    mode: ScanMode,
    stop_rx: watch::Receiver<bool>,
    state_tx: Arc<watch::Sender<SessionState>>,
    events_tx: broadcast::Sender<ScanEvent>,
    emitter: Arc<dyn ScanEventEmitter>,
}

/// Pulls frames until stopped or the device goes away.
///
/// Emits only while the session is `Active`. Misses, decoder hiccups and
/// payloads that fail validation (bad GTIN check digit, oversized) are
/// counted and dropped.
async fn decode_loop(mut ctx: DecodeLoop) {
    let mut decoded = 0u64;
    let mut noise = 0u64;

    let exit = loop {
        tokio::select! {
            biased;

            _ = ctx.stop_rx.changed() => break LoopExit::Stopped,

            frame = ctx.stream.next_frame() => match frame {
                Some(Ok(symbol)) => {
                    if !ctx.mode.accepts(symbol.format) {
                        trace!(format = %symbol.format, "Ignoring symbol outside scan mode");
                        continue;
                    }

                    let active = ctx.state_tx.borrow().is_active();
                    if !active {
                        continue;
                    }

                    if let Err(e) = validate_code(&symbol.code, symbol.format) {
                        noise += 1;
                        trace!(format = %symbol.format, error = %e, "Dropping invalid symbol");
                        continue;
                    }

                    match ScanEvent::new(symbol.code, symbol.format) {
                        Ok(event) => {
                            decoded += 1;
                            debug!(code = %event.code, format = %event.format, "Decoded symbol");
                            // No subscribers is fine; the scan is simply unobserved.
                            let _ = ctx.events_tx.send(event);
                        }
                        Err(e) => trace!(?e, "Dropping empty symbol"),
                    }
                }
                Some(Err(FrameError::NoSymbol)) => noise += 1,
                Some(Err(FrameError::Decoder(reason))) => {
                    noise += 1;
                    trace!(%reason, "Decoder miss");
                }
                None => {
                    let stopping = *ctx.stop_rx.borrow();
                    let exit = if stopping {
                        LoopExit::Stopped
                    } else if ctx.stream.finished() {
                        LoopExit::EndOfInput
                    } else {
                        LoopExit::DeviceLost
                    };
                    break exit;
                }
            }
        }
    };

    ctx.stream.release();

    match exit {
        LoopExit::Stopped => {}
        LoopExit::EndOfInput => {
            info!(session_id = %ctx.session_id, "Capture input ended");
            let changed = ctx.state_tx.send_if_modified(|state| {
                if state.is_active() {
                    *state = SessionState::Idle;
                    true
                } else {
                    false
                }
            });
            if changed {
                ctx.emitter.emit_state(&SessionState::Idle);
            }
        }
        LoopExit::DeviceLost => report_device_lost(&ctx),
    }

    debug!(session_id = %ctx.session_id, decoded, noise, "Decode loop finished");
}

fn report_device_lost(ctx: &DecodeLoop) {
    warn!(session_id = %ctx.session_id, "Capture stream ended unexpectedly");
    let reason = "camera disconnected".to_string();
    let changed = ctx.state_tx.send_if_modified(|state| {
        if state.is_active() {
            *state = SessionState::Error {
                reason: reason.clone(),
            };
            true
        } else {
            false
        }
    });

    if changed {
        ctx.emitter.emit_state(&SessionState::Error { reason });
        ctx.emitter
            .emit_error("The camera was disconnected. Check the camera and retry.", true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::testing::{MockBackend, RecordingEmitter};
    use stockscan_core::BarcodeFormat;
    use tokio::sync::broadcast::error::TryRecvError;

    fn session(backend: &Arc<MockBackend>) -> ScanSession {
        ScanSession::new(backend.clone(), SessionConfig::default())
    }

    async fn next_event(rx: &mut broadcast::Receiver<ScanEvent>) -> ScanEvent {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for scan event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_start_emits_decoded_events() {
        let backend = Arc::new(MockBackend::with_cameras(&["cam-a"]));
        let session = session(&backend);
        let mut events = session.subscribe();

        session.start("cam-a", ScanMode::Both).await.unwrap();
        assert_eq!(session.state(), SessionState::Active);

        backend.feed("0123456789012", BarcodeFormat::Ean13);
        let event = next_event(&mut events).await;
        assert_eq!(event.code, "0123456789012");
        assert_eq!(event.format, BarcodeFormat::Ean13);
    }

    #[tokio::test]
    async fn test_stop_is_safe_in_every_state() {
        let backend = Arc::new(MockBackend::with_cameras(&["cam-a"]));
        let session = session(&backend);

        // Idle
        session.stop().await;
        assert_eq!(session.state(), SessionState::Idle);

        // Active, twice
        session.start("cam-a", ScanMode::Both).await.unwrap();
        session.stop().await;
        session.stop().await;
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(backend.held(), 0);

        // Error (never reached Active)
        backend.fail_next_acquire(BackendError::PermissionDenied);
        assert!(session.start("cam-a", ScanMode::Both).await.is_err());
        assert!(session.state().is_error());
        session.stop().await;
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_identical_start_is_noop() {
        let backend = Arc::new(MockBackend::with_cameras(&["cam-a"]));
        let session = session(&backend);
        let mut events = session.subscribe();

        session.start("cam-a", ScanMode::Barcode).await.unwrap();
        session.start("cam-a", ScanMode::Barcode).await.unwrap();
        assert_eq!(backend.acquire_count(), 1);

        backend.feed("SKU-1", BarcodeFormat::Code128);
        next_event(&mut events).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_acquisition_failure_then_retry() {
        let backend = Arc::new(MockBackend::with_cameras(&["cam-a"]));
        let session = session(&backend);

        backend.fail_next_acquire(BackendError::PermissionDenied);
        let err = session.start("cam-a", ScanMode::Both).await.unwrap_err();
        assert!(matches!(
            err,
            ScanError::DeviceAcquisition {
                reason: BackendError::PermissionDenied,
                ..
            }
        ));
        assert!(session.state().is_error());
        assert_eq!(backend.held(), 0);

        session.start("cam-a", ScanMode::Both).await.unwrap();
        assert_eq!(session.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_failure_reported_once_with_states() {
        let backend = Arc::new(MockBackend::with_cameras(&["cam-a"]));
        let emitter = Arc::new(RecordingEmitter::default());
        let session =
            ScanSession::with_emitter(backend.clone(), SessionConfig::default(), emitter.clone());

        backend.fail_next_acquire(BackendError::DeviceBusy);
        let err = session.start("cam-a", ScanMode::Both).await.unwrap_err();
        assert!(err.is_retryable());

        let errors = emitter.errors.lock().unwrap().clone();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Check camera permissions and retry"));

        let states = emitter.states.lock().unwrap().clone();
        assert_eq!(states[0], SessionState::Starting);
        assert!(states[1].is_error());
    }

    #[tokio::test]
    async fn test_camera_switch_releases_previous_device_first() {
        let backend = Arc::new(MockBackend::with_cameras(&["cam-a", "cam-b"]));
        let session = session(&backend);

        session.start("cam-a", ScanMode::Both).await.unwrap();
        session.start("cam-b", ScanMode::Both).await.unwrap();

        assert_eq!(backend.max_held(), 1);
        assert_eq!(backend.held(), 1);
        assert_eq!(
            backend.log(),
            vec!["acquire:cam-a", "release:cam-a", "acquire:cam-b"]
        );
        assert_eq!(session.current_request().await.unwrap().camera_id, "cam-b");
    }

    #[tokio::test]
    async fn test_mode_change_restarts_capture() {
        let backend = Arc::new(MockBackend::with_cameras(&["cam-a"]));
        let session = session(&backend);

        session.start("cam-a", ScanMode::Barcode).await.unwrap();
        session.start("cam-a", ScanMode::Qr).await.unwrap();

        assert_eq!(backend.acquire_count(), 2);
        assert_eq!(backend.max_held(), 1);
        assert_eq!(backend.requests().last().unwrap().mode, ScanMode::Qr);
    }

    #[tokio::test]
    async fn test_decode_noise_is_never_reported() {
        let backend = Arc::new(MockBackend::with_cameras(&["cam-a"]));
        let session = session(&backend);
        let mut events = session.subscribe();
        let mut states = session.watch_state();

        session.start("cam-a", ScanMode::Both).await.unwrap();
        states.borrow_and_update();

        for _ in 0..25 {
            backend.feed_noise(FrameError::NoSymbol);
        }
        backend.feed_noise(FrameError::Decoder("checksum mismatch".into()));
        backend.feed("QR-PAYLOAD", BarcodeFormat::QrCode);

        assert_eq!(next_event(&mut events).await.code, "QR-PAYLOAD");
        assert_eq!(session.state(), SessionState::Active);
        assert!(!states.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_symbols_outside_mode_are_dropped() {
        let backend = Arc::new(MockBackend::with_cameras(&["cam-a"]));
        let session = session(&backend);
        let mut events = session.subscribe();

        session.start("cam-a", ScanMode::Qr).await.unwrap();
        backend.feed("0123456789012", BarcodeFormat::Ean13);
        backend.feed("https://example.com/i/42", BarcodeFormat::QrCode);

        assert_eq!(next_event(&mut events).await.format, BarcodeFormat::QrCode);
    }

    #[tokio::test]
    async fn test_toggle_torch_restarts_with_flag() {
        let backend = Arc::new(MockBackend::with_cameras(&["cam-a"]));
        let session = session(&backend);

        // Not active: ignored
        session.toggle_torch(true).await.unwrap();
        assert_eq!(backend.acquire_count(), 0);

        session.start("cam-a", ScanMode::Both).await.unwrap();
        session.toggle_torch(true).await.unwrap();

        assert_eq!(backend.acquire_count(), 2);
        assert_eq!(backend.max_held(), 1);
        assert!(backend.requests().last().unwrap().torch);
        assert_eq!(session.state(), SessionState::Active);

        // Same flag again: nothing to do
        session.toggle_torch(true).await.unwrap();
        assert_eq!(backend.acquire_count(), 2);
    }

    #[tokio::test]
    async fn test_device_loss_moves_to_error() {
        let backend = Arc::new(MockBackend::with_cameras(&["cam-a"]));
        let session = session(&backend);
        let mut states = session.watch_state();

        session.start("cam-a", ScanMode::Both).await.unwrap();
        backend.disconnect();

        timeout(Duration::from_secs(1), states.wait_for(|s| s.is_error()))
            .await
            .expect("timed out waiting for error state")
            .unwrap();
        assert_eq!(backend.held(), 0);

        session.stop().await;
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_list_cameras_enumeration_error() {
        let backend = Arc::new(MockBackend::with_cameras(&["cam-a", "cam-b"]));
        let session = session(&backend);

        assert_eq!(session.list_cameras().await.unwrap().len(), 2);

        backend.fail_enumerate(BackendError::PermissionDenied);
        assert!(matches!(
            session.list_cameras().await,
            Err(ScanError::DeviceEnumeration(BackendError::PermissionDenied))
        ));
        // Enumeration failure is not a session state change
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_shutdown_during_stop_releases_device() {
        let backend = Arc::new(MockBackend::with_cameras(&["cam-a"]));
        let session = Arc::new(session(&backend));

        session.start("cam-a", ScanMode::Both).await.unwrap();

        let stopper = {
            let session = session.clone();
            tokio::spawn(async move { session.stop().await })
        };
        session.shutdown().await;
        stopper.await.unwrap();

        assert_eq!(backend.held(), 0);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_drop_releases_device() {
        let backend = Arc::new(MockBackend::with_cameras(&["cam-a"]));
        let session = session(&backend);

        session.start("cam-a", ScanMode::Both).await.unwrap();
        assert_eq!(backend.held(), 1);

        drop(session);
        assert_eq!(backend.held(), 0);
        assert_eq!(backend.log(), vec!["acquire:cam-a", "release:cam-a"]);
    }

    #[tokio::test]
    async fn test_stop_cancels_pending_start() {
        let backend = Arc::new(MockBackend::with_cameras(&["cam-a"]));
        backend.hang_acquire(true);
        let session = Arc::new(session(&backend));
        let mut states = session.watch_state();

        let starter = {
            let session = session.clone();
            tokio::spawn(async move { session.start("cam-a", ScanMode::Both).await })
        };
        timeout(
            Duration::from_secs(1),
            states.wait_for(|s| *s == SessionState::Starting),
        )
        .await
        .expect("session never reached starting")
        .unwrap();

        timeout(Duration::from_secs(1), session.stop())
            .await
            .expect("stop blocked behind a pending start");
        assert_eq!(session.state(), SessionState::Idle);

        let result = starter.await.unwrap();
        assert!(matches!(result, Err(ScanError::StartCancelled { .. })));
        assert_eq!(backend.held(), 0);

        // The session is usable again once the camera answers
        backend.hang_acquire(false);
        session.start("cam-a", ScanMode::Both).await.unwrap();
        assert_eq!(session.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending_start() {
        let backend = Arc::new(MockBackend::with_cameras(&["cam-a"]));
        backend.hang_acquire(true);
        let emitter = Arc::new(RecordingEmitter::default());
        let session = Arc::new(ScanSession::with_emitter(
            backend.clone(),
            SessionConfig::default(),
            emitter.clone(),
        ));
        let mut states = session.watch_state();

        let starter = {
            let session = session.clone();
            tokio::spawn(async move { session.start("cam-a", ScanMode::Both).await })
        };
        timeout(
            Duration::from_secs(1),
            states.wait_for(|s| *s == SessionState::Starting),
        )
        .await
        .expect("session never reached starting")
        .unwrap();

        timeout(Duration::from_secs(1), session.shutdown())
            .await
            .expect("shutdown blocked behind a pending start");
        assert!(starter.await.unwrap().is_err());
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(backend.acquire_count(), 0);
        // Cancellation is not a failure the user has to act on
        assert!(emitter.errors.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_symbols_are_dropped_as_noise() {
        let backend = Arc::new(MockBackend::with_cameras(&["cam-a"]));
        let session = session(&backend);
        let mut events = session.subscribe();

        session.start("cam-a", ScanMode::Both).await.unwrap();
        // Bad check digit, wrong length, oversized payload
        backend.feed("0123456789013", BarcodeFormat::Ean13);
        backend.feed("01234567", BarcodeFormat::UpcA);
        backend.feed(
            &"x".repeat(stockscan_core::MAX_CODE_LENGTH + 1),
            BarcodeFormat::QrCode,
        );
        backend.feed("0123456789012", BarcodeFormat::Ean13);

        assert_eq!(next_event(&mut events).await.code, "0123456789012");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(session.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_end_of_input_is_an_orderly_stop() {
        let reader = tokio::io::BufReader::new("0123456789012\n".as_bytes());
        let backend = Arc::new(crate::backend::WedgeBackend::new("test wedge", reader));
        let emitter = Arc::new(RecordingEmitter::default());
        let session =
            ScanSession::with_emitter(backend, SessionConfig::default(), emitter.clone());
        let mut events = session.subscribe();
        let mut states = session.watch_state();

        session
            .start(crate::backend::WEDGE_DEVICE_ID, ScanMode::Both)
            .await
            .unwrap();
        assert_eq!(next_event(&mut events).await.code, "0123456789012");

        timeout(
            Duration::from_secs(1),
            states.wait_for(|s| *s == SessionState::Idle),
        )
        .await
        .expect("session did not return to idle at end of input")
        .unwrap();
        assert!(emitter.errors.lock().unwrap().is_empty());
        assert!(!emitter.states.lock().unwrap().iter().any(|s| s.is_error()));

        session.stop().await;
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_no_events_after_stop() {
        let backend = Arc::new(MockBackend::with_cameras(&["cam-a"]));
        let session = session(&backend);
        let mut events = session.subscribe();

        session.start("cam-a", ScanMode::Both).await.unwrap();
        session.stop().await;

        // The stream is gone; feeding is a no-op
        backend.feed("LATE", BarcodeFormat::Code128);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }
}
