//! CameraRegistry - Ordered Camera Inventory
//!
//! ## Responsibilities
//!
//! - In-memory, ordered collection of configured camera definitions
//! - Wholesale atomic replacement on reconfiguration (`load`)
//! - Stable-order listing for the host source selector
//! - Per-camera status bookkeeping from poll outcomes
//!
//! Readers observe either the old or the new complete set, never a partial
//! one. `load` is the only writer of definitions; in-flight fetches against
//! a replaced set complete but are not retried against the new one.

mod types;

pub use types::{CameraDefinition, CameraStatus, MAX_CAMERAS};

use crate::error::{Error, Result};
use std::collections::HashSet;
use tokio::sync::RwLock;

/// CameraRegistry instance
pub struct CameraRegistry {
    cameras: RwLock<Vec<CameraDefinition>>,
}

impl CameraRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            cameras: RwLock::new(Vec::new()),
        }
    }

    /// Replace the entire camera set atomically
    ///
    /// Rejects the whole batch (leaving the current set untouched) when:
    /// - the batch is empty or exceeds [`MAX_CAMERAS`]
    /// - a name is empty or a snapshot URL is not http/https
    /// - two definitions share an id
    pub async fn load(&self, definitions: Vec<CameraDefinition>) -> Result<()> {
        if definitions.is_empty() {
            return Err(Error::Validation(
                "at least one camera must be configured".to_string(),
            ));
        }
        if definitions.len() > MAX_CAMERAS {
            return Err(Error::Validation(format!(
                "too many cameras: {} (max {})",
                definitions.len(),
                MAX_CAMERAS
            )));
        }

        let mut seen = HashSet::new();
        for def in &definitions {
            if def.name.trim().is_empty() {
                return Err(Error::Validation(format!(
                    "camera {} has an empty name",
                    def.id
                )));
            }
            if !def.snapshot_url.starts_with("http://")
                && !def.snapshot_url.starts_with("https://")
            {
                return Err(Error::Validation(format!(
                    "camera {} has an invalid snapshot URL: {}",
                    def.id, def.snapshot_url
                )));
            }
            if !seen.insert(def.id.clone()) {
                return Err(Error::Validation(format!("duplicate camera id: {}", def.id)));
            }
        }

        let count = definitions.len();
        *self.cameras.write().await = definitions;

        tracing::info!(cameras = count, "Camera registry loaded");

        Ok(())
    }

    /// Resolve a camera by id
    pub async fn resolve(&self, id: &str) -> Result<CameraDefinition> {
        self.cameras
            .read()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// List all cameras in insertion order
    pub async fn list(&self) -> Vec<CameraDefinition> {
        self.cameras.read().await.clone()
    }

    /// Update a camera's last known status
    ///
    /// A no-op when the id has been removed by a reload in the meantime.
    pub async fn set_status(&self, id: &str, status: CameraStatus) {
        let mut cameras = self.cameras.write().await;
        if let Some(camera) = cameras.iter_mut().find(|c| c.id == id) {
            if camera.last_known_status != status {
                tracing::debug!(
                    camera_id = %id,
                    status = ?status,
                    "Camera status changed"
                );
            }
            camera.last_known_status = status;
        }
    }
}

impl Default for CameraRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defs(n: usize) -> Vec<CameraDefinition> {
        (0..n)
            .map(|i| {
                CameraDefinition::new(
                    format!("cam_{i}"),
                    format!("Camera {i}"),
                    format!("http://cam{i}.local/snap.jpg"),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_load_preserves_order_for_all_counts() {
        let registry = CameraRegistry::new();
        for n in 1..=MAX_CAMERAS {
            let input = defs(n);
            registry.load(input.clone()).await.unwrap();
            let listed = registry.list().await;
            assert_eq!(listed.len(), n);
            for (a, b) in input.iter().zip(listed.iter()) {
                assert_eq!(a.id, b.id);
            }
        }
    }

    #[tokio::test]
    async fn test_load_rejects_empty_batch() {
        let registry = CameraRegistry::new();
        assert!(registry.load(vec![]).await.is_err());
    }

    #[tokio::test]
    async fn test_load_rejects_over_capacity() {
        let registry = CameraRegistry::new();
        assert!(registry.load(defs(MAX_CAMERAS + 1)).await.is_err());
    }

    #[tokio::test]
    async fn test_load_rejects_bad_url_scheme() {
        let registry = CameraRegistry::new();
        let bad = vec![CameraDefinition::new("cam", "Cam", "rtsp://cam/stream")];
        assert!(registry.load(bad).await.is_err());
    }

    #[tokio::test]
    async fn test_load_rejects_duplicate_ids() {
        let registry = CameraRegistry::new();
        let dup = vec![
            CameraDefinition::new("cam", "Cam A", "http://a/snap.jpg"),
            CameraDefinition::new("cam", "Cam B", "http://b/snap.jpg"),
        ];
        assert!(registry.load(dup).await.is_err());
    }

    #[tokio::test]
    async fn test_failed_load_keeps_previous_set() {
        let registry = CameraRegistry::new();
        registry.load(defs(3)).await.unwrap();
        assert!(registry.load(vec![]).await.is_err());
        assert_eq!(registry.list().await.len(), 3);
    }

    #[tokio::test]
    async fn test_resolve_after_reload_removal() {
        let registry = CameraRegistry::new();
        registry.load(defs(2)).await.unwrap();
        assert!(registry.resolve("cam_1").await.is_ok());

        registry.load(defs(1)).await.unwrap();
        assert!(matches!(
            registry.resolve("cam_1").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_set_status_roundtrip() {
        let registry = CameraRegistry::new();
        registry.load(defs(1)).await.unwrap();
        assert_eq!(
            registry.resolve("cam_0").await.unwrap().last_known_status,
            CameraStatus::Unset
        );

        registry.set_status("cam_0", CameraStatus::Warning).await;
        assert_eq!(
            registry.resolve("cam_0").await.unwrap().last_known_status,
            CameraStatus::Warning
        );

        // unknown id is a no-op
        registry.set_status("ghost", CameraStatus::Ok).await;
    }
}
