//! CameraRegistry data types

use serde::{Deserialize, Serialize};

/// Maximum number of cameras a registry instance accepts
pub const MAX_CAMERAS: usize = 50;

/// Camera definition (identity is `id`)
///
/// `name` and `snapshot_url` are mutable only through a full
/// [`CameraRegistry::load`](super::CameraRegistry::load);
/// `last_known_status` is updated per poll outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraDefinition {
    pub id: String,
    pub name: String,
    pub snapshot_url: String,
    pub last_known_status: CameraStatus,
}

impl CameraDefinition {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        snapshot_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            snapshot_url: snapshot_url.into(),
            last_known_status: CameraStatus::Unset,
        }
    }
}

/// Last known poll status of a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CameraStatus {
    /// Last poll returned a frame
    Ok,
    /// Last poll failed
    Warning,
    /// Never polled
    #[default]
    Unset,
}
