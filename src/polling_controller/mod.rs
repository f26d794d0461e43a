//! PollingController - Viewer State Machine
//!
//! ## Responsibilities
//!
//! - Owns "selected camera" and "viewing active" state (one per instance)
//! - Runs at most one background refresh loop system-wide
//! - Cancel-then-join loop replacement on power-on / source switch
//! - Publishes every `SnapshotResult` (frame or failure) to subscribers
//!
//! A fetch failure is published and the loop continues on schedule; only
//! `power_off`, `select_source` or shutdown stops a running loop. Transient
//! camera unavailability never cascades into the viewer going dark.

use crate::camera_registry::{CameraRegistry, CameraStatus};
use crate::error::{Error, Result};
use crate::snapshot_fetcher::{
    FetchErrorKind, SnapshotFailure, SnapshotFetcher, SnapshotResult,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Fixed refresh period (a deliberate simplicity/predictability tradeoff)
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Broadcast channel depth for published results
const RESULT_CHANNEL_CAPACITY: usize = 16;

/// Viewer power state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Power {
    Off,
    On,
}

/// Snapshot of the controller state for status queries
#[derive(Debug, Clone)]
pub struct ViewerState {
    pub power: Power,
    pub selected_camera_id: Option<String>,
}

/// Running refresh loop: cancellation token plus completion handle
struct ActiveLoop {
    camera_id: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ActiveLoop {
    /// Signal cancellation and wait for the loop to stop cleanly
    async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(
                camera_id = %self.camera_id,
                error = %e,
                "Refresh loop task join failed"
            );
        }
    }
}

struct ControllerState {
    power: Power,
    selected_camera_id: Option<String>,
    active: Option<ActiveLoop>,
}

/// PollingController instance
pub struct PollingController {
    registry: Arc<CameraRegistry>,
    fetcher: Arc<SnapshotFetcher>,
    /// Commands are serialized through this mutex; together with the
    /// cancel-then-join in `stop`, this guarantees at most one loop and
    /// no overlapping fetches even under rapid source switching.
    state: Mutex<ControllerState>,
    results_tx: broadcast::Sender<SnapshotResult>,
    last_results: Arc<RwLock<HashMap<String, SnapshotResult>>>,
}

impl PollingController {
    /// Create a new controller in the `{off, none, none}` resting state
    pub fn new(registry: Arc<CameraRegistry>, fetcher: Arc<SnapshotFetcher>) -> Self {
        let (results_tx, _) = broadcast::channel(RESULT_CHANNEL_CAPACITY);
        Self {
            registry,
            fetcher,
            state: Mutex::new(ControllerState {
                power: Power::Off,
                selected_camera_id: None,
                active: None,
            }),
            results_tx,
            last_results: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Subscribe to published snapshot results
    pub fn subscribe(&self) -> broadcast::Receiver<SnapshotResult> {
        self.results_tx.subscribe()
    }

    /// Current power/selection state
    pub async fn state(&self) -> ViewerState {
        let state = self.state.lock().await;
        ViewerState {
            power: state.power,
            selected_camera_id: state.selected_camera_id.clone(),
        }
    }

    /// Most recent result for a camera, if it has been polled
    pub async fn last_result(&self, camera_id: &str) -> Option<SnapshotResult> {
        self.last_results.read().await.get(camera_id).cloned()
    }

    /// Start viewing a camera
    ///
    /// Rejects with `NotFound` (state unchanged) when the id does not
    /// resolve. Any running loop is cancelled and joined before the
    /// replacement starts; the first fetch for the new camera is issued
    /// immediately, not on the next tick.
    pub async fn power_on(&self, camera_id: &str) -> Result<()> {
        let camera = self.registry.resolve(camera_id).await?;

        let mut state = self.state.lock().await;
        if let Some(active) = state.active.take() {
            tracing::info!(
                old_camera_id = %active.camera_id,
                new_camera_id = %camera.id,
                "Replacing active refresh loop"
            );
            active.stop().await;
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(refresh_loop(
            self.registry.clone(),
            self.fetcher.clone(),
            camera.id.clone(),
            cancel.clone(),
            self.results_tx.clone(),
            self.last_results.clone(),
        ));

        state.power = Power::On;
        state.selected_camera_id = Some(camera.id.clone());
        state.active = Some(ActiveLoop {
            camera_id: camera.id.clone(),
            cancel,
            task,
        });

        tracing::info!(camera_id = %camera.id, "Viewing started");

        Ok(())
    }

    /// Power on against the previously selected camera, falling back to
    /// the first configured one
    pub async fn power_on_selected(&self) -> Result<()> {
        let selected = { self.state.lock().await.selected_camera_id.clone() };
        let camera_id = match selected {
            Some(id) => id,
            None => self
                .registry
                .list()
                .await
                .first()
                .map(|c| c.id.clone())
                .ok_or_else(|| Error::Validation("no cameras configured".to_string()))?,
        };
        self.power_on(&camera_id).await
    }

    /// Switch the viewed camera
    ///
    /// Equivalent to `power_on`: while viewing, the old loop stops and the
    /// new one starts immediately; while powered off, this powers on.
    pub async fn select_source(&self, camera_id: &str) -> Result<()> {
        self.power_on(camera_id).await
    }

    /// Stop viewing; idempotent
    pub async fn power_off(&self) {
        let mut state = self.state.lock().await;
        match state.active.take() {
            Some(active) => {
                tracing::info!(camera_id = %active.camera_id, "Viewing stopped");
                active.stop().await;
            }
            None => {
                tracing::debug!("Power off while already idle");
            }
        }
        state.power = Power::Off;
    }
}

/// One poll iteration: resolve, fetch
///
/// A camera removed by a registry reload while being viewed maps to a
/// `NotFound` failure result, not a controller fault.
async fn poll_once(
    registry: &CameraRegistry,
    fetcher: &SnapshotFetcher,
    camera_id: &str,
) -> SnapshotResult {
    match registry.resolve(camera_id).await {
        Ok(camera) => fetcher.fetch(&camera).await,
        Err(_) => SnapshotResult::Failure(SnapshotFailure {
            camera_id: camera_id.to_string(),
            kind: FetchErrorKind::NotFound,
            message: "camera removed from registry".to_string(),
        }),
    }
}

/// The background refresh loop
///
/// First tick fires immediately, then every `REFRESH_INTERVAL`. The fetch
/// races the cancellation token so a `power_off` is honored within one
/// fetch timeout, not one full period.
async fn refresh_loop(
    registry: Arc<CameraRegistry>,
    fetcher: Arc<SnapshotFetcher>,
    camera_id: String,
    cancel: CancellationToken,
    results_tx: broadcast::Sender<SnapshotResult>,
    last_results: Arc<RwLock<HashMap<String, SnapshotResult>>>,
) {
    tracing::info!(camera_id = %camera_id, "Refresh loop started");

    let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            r = poll_once(&registry, &fetcher, &camera_id) => r,
        };

        let status = if result.is_frame() {
            CameraStatus::Ok
        } else {
            CameraStatus::Warning
        };
        registry.set_status(&camera_id, status).await;

        last_results
            .write()
            .await
            .insert(camera_id.clone(), result.clone());

        // Receiver count can legitimately be zero between subscriptions
        let _ = results_tx.send(result);
    }

    tracing::info!(camera_id = %camera_id, "Refresh loop stopped");
}
