//! # Alert Polling
//!
//! Periodically refreshes stock alerts and fans them out to listeners.
//!
//! ```text
//! PollingCoordinator::start()
//!        │
//!        ▼
//!   ┌─────────┐  tick (poll_interval)   ┌─────────────┐
//!   │  loop   │ ──────────────────────► │ AlertSource │
//!   └────┬────┘                         └──────┬──────┘
//!        │ stop()                              │ Vec<Alert>
//!        ▼                                     ▼
//!      exit                    latest ──► listeners (Subscription)
//! ```
//!
//! A failed poll keeps the previous alerts; listeners only hear about
//! successful refreshes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use stockscan_core::Alert;

use crate::catalog::AlertSource;
use crate::error::ScanResult;

type Listener = Arc<dyn Fn(&[Alert]) + Send + Sync>;

/// Shortest poll period; anything below is raised to this.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// State shared between the coordinator, its loop and subscriptions.
struct Shared {
    source: Arc<dyn AlertSource>,
    latest: RwLock<Vec<Alert>>,
    listeners: Mutex<HashMap<u64, Listener>>,
    next_listener: AtomicU64,
}

impl Shared {
    async fn poll(&self) -> ScanResult<Vec<Alert>> {
        let alerts = match self.source.fetch_alerts().await {
            Ok(alerts) => alerts,
            Err(e) => {
                warn!(error = %e, "Alert poll failed, keeping previous alerts");
                return Err(e);
            }
        };

        debug!(count = alerts.len(), "Alerts refreshed");
        *self.latest.write().unwrap_or_else(PoisonError::into_inner) = alerts.clone();

        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for listener in listeners {
            listener(&alerts);
        }

        Ok(alerts)
    }
}

/// Poll loop handle.
struct Worker {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

/// Owns the alert poll loop.
///
/// ## Usage
/// ```rust,ignore
/// let alerts = PollingCoordinator::new(client, Duration::from_secs(60));
/// let _sub = alerts.subscribe(|alerts| println!("{} alerts", alerts.len()));
/// alerts.start().await;
/// // ...
/// alerts.stop().await;
/// ```
pub struct PollingCoordinator {
    shared: Arc<Shared>,
    interval: Duration,
    worker: tokio::sync::Mutex<Option<Worker>>,
}

impl PollingCoordinator {
    pub fn new(source: Arc<dyn AlertSource>, interval: Duration) -> Self {
        let interval = if interval < MIN_POLL_INTERVAL {
            warn!(
                requested_ms = interval.as_millis() as u64,
                "Alert poll interval too short, using minimum"
            );
            MIN_POLL_INTERVAL
        } else {
            interval
        };

        PollingCoordinator {
            shared: Arc::new(Shared {
                source,
                latest: RwLock::new(Vec::new()),
                listeners: Mutex::new(HashMap::new()),
                next_listener: AtomicU64::new(0),
            }),
            interval,
            worker: tokio::sync::Mutex::new(None),
        }
    }

    /// Starts polling (first poll immediately). No-op if already running.
    pub async fn start(&self) {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            debug!("Alert polling already running");
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let shared = self.shared.clone();
        let period = self.interval;

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = ticker.tick() => {
                        let _ = shared.poll().await;
                    }
                }
            }

            debug!("Alert poll loop finished");
        });

        info!(interval_secs = period.as_secs(), "Alert polling started");
        *worker = Some(Worker { shutdown_tx, task });
    }

    /// Stops polling and waits for the loop to exit.
    pub async fn stop(&self) {
        let Some(worker) = self.worker.lock().await.take() else {
            return;
        };

        let _ = worker.shutdown_tx.send(()).await;
        if let Err(e) = worker.task.await {
            warn!(?e, "Alert poll loop ended abnormally");
        }
        info!("Alert polling stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.worker.lock().await.is_some()
    }

    /// Polls right away, outside the schedule.
    pub async fn poll_now(&self) -> ScanResult<Vec<Alert>> {
        self.shared.poll().await
    }

    /// Alerts from the last successful poll.
    pub fn latest(&self) -> Vec<Alert> {
        self.shared
            .latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn unread_count(&self) -> usize {
        self.shared
            .latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|a| !a.read)
            .count()
    }

    /// Registers `listener` for every successful refresh.
    ///
    /// The listener stays registered until the returned handle is dropped or
    /// `unsubscribe()` is called.
    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&[Alert]) + Send + Sync + 'static,
    {
        let id = self.shared.next_listener.fetch_add(1, Ordering::Relaxed);
        self.shared
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(listener));

        Subscription {
            shared: Arc::downgrade(&self.shared),
            id,
        }
    }
}

impl Drop for PollingCoordinator {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.task.abort();
        }
    }
}

/// Listener registration; unsubscribes on drop.
pub struct Subscription {
    shared: Weak<Shared>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.id);
        }
    }
}
