//! # scan-console
//!
//! Terminal front end for a keyboard-wedge barcode scanner.
//!
//! Every line on stdin is one scan. Each scan is looked up in the catalog and
//! the result is printed; unknown codes print a pre-filled create-item draft.
//! The session ends at end of input.
//!
//! ## Startup Sequence
//! 1. Initialize tracing (stderr, `RUST_LOG`)
//! 2. Load `scanner.toml` + `STOCKSCAN_*` overrides
//! 3. Build catalog client, session and coordinator
//! 4. Pick a camera, attach the coordinator, start scanning
//! 5. Optionally start alert polling

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stockscan_client::{
    BackendError, CoordinatorConfig, HttpCatalogClient, LogEmitter, PollingCoordinator,
    ScanCoordinator, ScanError, ScanOutcome, ScanResult, ScanSession, ScannerConfig,
    WedgeBackend,
};
use stockscan_core::CameraDevice;

#[tokio::main]
async fn main() -> ScanResult<()> {
    init_tracing();

    let config = ScannerConfig::load_or_default(None);
    info!(catalog = %config.catalog.base_url, mode = %config.camera.mode, "Starting scan console");

    let catalog = Arc::new(HttpCatalogClient::new(&config.catalog)?);
    let session = ScanSession::with_emitter(
        Arc::new(WedgeBackend::stdin()),
        config.session_config(),
        Arc::new(LogEmitter),
    );
    let coordinator = Arc::new(ScanCoordinator::new(
        catalog.clone(),
        CoordinatorConfig::from(&config),
    ));

    let cameras = session.list_cameras().await?;
    let camera = CameraDevice::pick_default(&cameras, config.camera.preferred_camera_id.as_deref())
        .cloned()
        .ok_or(ScanError::DeviceEnumeration(BackendError::NoCamera))?;

    let alerts = config.alerts.enabled.then(|| {
        PollingCoordinator::new(catalog.clone(), config.alert_poll_interval())
    });
    let _alert_sub = alerts.as_ref().map(|poller| {
        poller.subscribe(|alerts| {
            let unread = alerts.iter().filter(|a| !a.read).count();
            if unread > 0 {
                println!("! {} unread stock alert(s)", unread);
            }
        })
    });
    if let Some(poller) = &alerts {
        poller.start().await;
    }

    let (mut outcomes, pump) = coordinator.attach(session.subscribe());
    let mut state = session.watch_state();

    session.start(&camera.id, config.camera.mode).await?;
    if config.camera.torch {
        session.toggle_torch(true).await?;
    }
    println!(
        "Scanning with {} ({}). Scan or type codes, Ctrl-D to finish.",
        camera.label, config.camera.mode
    );

    loop {
        tokio::select! {
            Some(outcome) = outcomes.recv() => print_outcome(&outcome),
            // Idle means the input ran out; Error means the device went away.
            changed = state.changed() => {
                if changed.is_err() || !state.borrow().is_active() {
                    break;
                }
            }
            else => break,
        }
    }

    // End of input: release the device, then drain lookups still in flight.
    session.stop().await;
    drop(session);
    if let Err(e) = pump.await {
        warn!(?e, "Scan pump ended abnormally");
    }
    while let Some(outcome) = outcomes.recv().await {
        print_outcome(&outcome);
    }

    if let Some(poller) = &alerts {
        poller.stop().await;
    }

    let stats = coordinator.stats();
    println!("{} scan(s), {} today", stats.total, stats.today);
    for (format, count) in &stats.by_format {
        println!("  {:<12} {}", format.to_string(), count);
    }

    Ok(())
}

fn print_outcome(outcome: &ScanOutcome) {
    println!("{}", outcome.result.notice().message);

    if let Some(item) = outcome.result.item() {
        println!("  id={} quantity={}", item.id, item.quantity);
    }

    if let Some(draft) = outcome.create_suggestion() {
        println!(
            "  draft: barcode={} format={} quantity={}",
            draft.barcode, draft.barcode_format, draft.quantity
        );
    }
}

/// Logs go to stderr so stdout stays a clean scan transcript.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=stockscan_client=trace` - Include per-frame decoder noise
/// - Default: INFO level
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,stockscan_client=debug,reqwest=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
