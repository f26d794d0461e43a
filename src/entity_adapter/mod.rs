//! EntityAdapter - Host Framework Translation Layer
//!
//! ## Responsibilities
//!
//! - Map host commands (power on/off, source select) to controller calls
//! - Forward published snapshot results as entity attribute updates
//! - Expose the source-selector contents to the host
//!
//! Deliberately thin: no polling, retry, or caching logic lives here.
//! A fetch failure becomes a status-text update that keeps the entity on;
//! the viewer never silently freezes.

use crate::camera_registry::{CameraDefinition, CameraRegistry};
use crate::error::{Error, Result};
use crate::polling_controller::{Power, PollingController};
use crate::snapshot_fetcher::SnapshotResult;
use base64::Engine;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Command delivered by the host framework
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerCommand {
    TurnOn,
    TurnOff,
    /// `source` may be a camera id, a display name, or a zero-based index
    SelectSource { source: String },
    /// Step forward in registry order, wrapping past the last camera
    SelectNext,
    /// Step back in registry order, wrapping past the first camera
    SelectPrevious,
    SelectFirst,
    SelectLast,
}

/// Entity power attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    On,
    Off,
}

/// Attribute update pushed to the host framework
#[derive(Debug, Clone, Serialize)]
pub struct EntityUpdate {
    pub state: EntityState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_title: Option<String>,
    /// `data:image/...;base64,` URL; empty string clears the display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
}

/// EntityAdapter instance
pub struct EntityAdapter {
    registry: Arc<CameraRegistry>,
    controller: Arc<PollingController>,
    updates_tx: mpsc::UnboundedSender<EntityUpdate>,
    forward_task: Mutex<Option<JoinHandle<()>>>,
}

impl EntityAdapter {
    /// Create the adapter and start forwarding controller results to the
    /// host update channel
    pub fn new(
        registry: Arc<CameraRegistry>,
        controller: Arc<PollingController>,
        updates_tx: mpsc::UnboundedSender<EntityUpdate>,
    ) -> Self {
        let forward_task = tokio::spawn(forward_results(
            registry.clone(),
            controller.subscribe(),
            updates_tx.clone(),
        ));

        Self {
            registry,
            controller,
            updates_tx,
            forward_task: Mutex::new(Some(forward_task)),
        }
    }

    /// Source-selector contents, in registry order
    pub async fn source_list(&self) -> Vec<String> {
        self.registry
            .list()
            .await
            .into_iter()
            .map(|c| c.name)
            .collect()
    }

    /// Handle one host command
    ///
    /// A command against an unresolvable camera is rejected synchronously;
    /// everything else the host sees arrives through the update channel.
    pub async fn handle_command(&self, command: ViewerCommand) -> Result<()> {
        tracing::info!(command = ?command, "Host command received");

        match command {
            ViewerCommand::TurnOn => {
                self.controller.power_on_selected().await?;
                self.push_state_update().await;
            }
            ViewerCommand::TurnOff => {
                self.controller.power_off().await;
                // clear the image so the display does not hold a stale frame
                self.push(EntityUpdate {
                    state: EntityState::Off,
                    source: None,
                    media_title: None,
                    media_image_url: Some(String::new()),
                    status_text: None,
                });
            }
            ViewerCommand::SelectSource { source } => {
                let camera_id = self.resolve_source(&source).await?;
                self.select_and_publish(&camera_id).await?;
            }
            ViewerCommand::SelectNext => {
                let camera_id = self.step_source(1).await?;
                self.select_and_publish(&camera_id).await?;
            }
            ViewerCommand::SelectPrevious => {
                let camera_id = self.step_source(-1).await?;
                self.select_and_publish(&camera_id).await?;
            }
            ViewerCommand::SelectFirst => {
                let cameras = self.non_empty_cameras().await?;
                self.select_and_publish(&cameras[0].id).await?;
            }
            ViewerCommand::SelectLast => {
                let cameras = self.non_empty_cameras().await?;
                self.select_and_publish(&cameras[cameras.len() - 1].id).await?;
            }
        }

        Ok(())
    }

    /// Resolve a host-supplied source reference to a camera id
    pub async fn resolve_source(&self, source: &str) -> Result<String> {
        let cameras = self.registry.list().await;

        if let Some(camera) = cameras.iter().find(|c| c.id == source) {
            return Ok(camera.id.clone());
        }
        if let Some(camera) = cameras.iter().find(|c| c.name == source) {
            return Ok(camera.id.clone());
        }
        if let Ok(index) = source.parse::<usize>() {
            if let Some(camera) = cameras.get(index) {
                return Ok(camera.id.clone());
            }
        }

        Err(Error::NotFound(source.to_string()))
    }

    /// Switch to a camera and push the resulting state to the host
    async fn select_and_publish(&self, camera_id: &str) -> Result<()> {
        self.controller.select_source(camera_id).await?;
        self.push_state_update().await;
        Ok(())
    }

    /// Camera id at a registry-order offset from the current selection,
    /// wrapping at either end of the list
    async fn step_source(&self, step: isize) -> Result<String> {
        let cameras = self.non_empty_cameras().await?;
        let len = cameras.len() as isize;

        let index = match self
            .controller
            .state()
            .await
            .selected_camera_id
            .and_then(|id| cameras.iter().position(|c| c.id == id))
        {
            Some(current) => (current as isize + step).rem_euclid(len),
            // no usable selection (never selected, or removed by a
            // reload): stepping forward starts at the front, stepping
            // back at the end
            None => {
                if step >= 0 {
                    0
                } else {
                    len - 1
                }
            }
        };

        Ok(cameras[index as usize].id.clone())
    }

    async fn non_empty_cameras(&self) -> Result<Vec<CameraDefinition>> {
        let cameras = self.registry.list().await;
        if cameras.is_empty() {
            return Err(Error::Validation("no cameras configured".to_string()));
        }
        Ok(cameras)
    }

    /// Stop forwarding results to the host
    pub async fn shutdown(&self) {
        if let Some(task) = self.forward_task.lock().await.take() {
            task.abort();
            let _ = task.await;
        }
    }

    /// Push the current power/source state to the host
    async fn push_state_update(&self) {
        let state = self.controller.state().await;
        let source_name = match &state.selected_camera_id {
            Some(id) => self.registry.resolve(id).await.ok().map(|c| c.name),
            None => None,
        };

        self.push(EntityUpdate {
            state: match state.power {
                Power::On => EntityState::On,
                Power::Off => EntityState::Off,
            },
            source: source_name.clone(),
            media_title: source_name,
            media_image_url: None,
            status_text: None,
        });
    }

    fn push(&self, update: EntityUpdate) {
        if self.updates_tx.send(update).is_err() {
            tracing::warn!("Host update channel closed, dropping update");
        }
    }
}

/// Forward each published snapshot result as an attribute update
async fn forward_results(
    registry: Arc<CameraRegistry>,
    mut results: tokio::sync::broadcast::Receiver<SnapshotResult>,
    updates_tx: mpsc::UnboundedSender<EntityUpdate>,
) {
    loop {
        let result = match results.recv().await {
            Ok(result) => result,
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Host fell behind on snapshot updates");
                continue;
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        };

        let source_name = registry
            .resolve(result.camera_id())
            .await
            .ok()
            .map(|c| c.name);

        let update = match result {
            SnapshotResult::Frame(frame) => {
                let encoded =
                    base64::engine::general_purpose::STANDARD.encode(&frame.image);
                EntityUpdate {
                    state: EntityState::On,
                    source: source_name.clone(),
                    media_title: source_name,
                    media_image_url: Some(format!(
                        "data:{};base64,{}",
                        frame.format.mime_type(),
                        encoded
                    )),
                    status_text: None,
                }
            }
            SnapshotResult::Failure(failure) => EntityUpdate {
                state: EntityState::On,
                source: source_name.clone(),
                media_title: source_name,
                media_image_url: None,
                status_text: Some(format!("{}: {}", failure.kind.as_str(), failure.message)),
            },
        };

        if updates_tx.send(update).is_err() {
            tracing::debug!("Host update channel closed, stopping forwarder");
            break;
        }
    }
}
