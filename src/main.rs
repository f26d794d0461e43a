//! CCTV Viewer binary
//!
//! Wires the viewing engine together: loads the camera configuration into
//! the registry, probes all cameras once at startup, and keeps the viewer
//! entity available until shutdown. The host command surface is external;
//! a drain task stands in for it here and logs every attribute update.

use cctv_viewer::camera_registry::{CameraRegistry, CameraStatus};
use cctv_viewer::config::{self, AppConfig};
use cctv_viewer::entity_adapter::EntityAdapter;
use cctv_viewer::polling_controller::PollingController;
use cctv_viewer::snapshot_fetcher::SnapshotFetcher;
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cctv_viewer=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting CCTV Viewer v{}", env!("CARGO_PKG_VERSION"));

    let app_config = AppConfig::default();
    tracing::info!(
        config_path = %app_config.config_path.display(),
        "Configuration loaded"
    );

    let cameras = config::load_cameras(&app_config.config_path)?;

    let registry = Arc::new(CameraRegistry::new());
    registry.load(cameras).await?;

    let fetcher = Arc::new(SnapshotFetcher::new()?);
    let controller = Arc::new(PollingController::new(registry.clone(), fetcher.clone()));

    let (updates_tx, mut updates_rx) = mpsc::unbounded_channel();
    let adapter = EntityAdapter::new(registry.clone(), controller.clone(), updates_tx);

    // Stand-in for the host framework: log every attribute update
    let drain_task = tokio::spawn(async move {
        while let Some(update) = updates_rx.recv().await {
            tracing::debug!(
                state = ?update.state,
                source = ?update.source,
                has_image = update.media_image_url.is_some(),
                status = ?update.status_text,
                "Entity attributes updated"
            );
        }
    });

    probe_all_cameras(&registry, &fetcher).await;

    tracing::info!(
        sources = ?adapter.source_list().await,
        "Viewer entity ready, waiting for host commands"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    controller.power_off().await;
    adapter.shutdown().await;
    drain_task.abort();

    tracing::info!("CCTV Viewer stopped");

    Ok(())
}

/// Probe every configured camera once, concurrently, and log the tally
///
/// Outcomes seed each camera's last known status for the selector display.
async fn probe_all_cameras(registry: &Arc<CameraRegistry>, fetcher: &Arc<SnapshotFetcher>) {
    let cameras = registry.list().await;
    tracing::info!(cameras = cameras.len(), "Testing camera connections");

    let probes = cameras.iter().map(|camera| {
        let registry = registry.clone();
        let fetcher = fetcher.clone();
        let camera = camera.clone();
        async move {
            let result = fetcher.fetch(&camera).await;
            let online = result.is_frame();
            let status = if online {
                CameraStatus::Ok
            } else {
                CameraStatus::Warning
            };
            registry.set_status(&camera.id, status).await;

            if online {
                tracing::info!(camera_id = %camera.id, name = %camera.name, "Camera online");
            } else {
                tracing::warn!(camera_id = %camera.id, name = %camera.name, "Camera offline");
            }
            online
        }
    });

    let results = join_all(probes).await;
    let online = results.iter().filter(|ok| **ok).count();
    tracing::info!(
        online,
        total = results.len(),
        "Camera connection test complete"
    );
}
