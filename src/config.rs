//! Configuration ingestion
//!
//! The configuration source is external: it supplies ordered
//! `{name, snapshot_url}` pairs. This module reads that file format and
//! turns it into `CameraDefinition`s for `CameraRegistry::load`; it never
//! writes storage.

use crate::camera_registry::CameraDefinition;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Application configuration (environment driven)
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path to the camera configuration file
    pub config_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        let dir = std::env::var("UC_CONFIG_HOME").unwrap_or_else(|_| ".".to_string());
        Self {
            config_path: PathBuf::from(dir).join("config.json"),
        }
    }
}

/// On-disk camera file: `{"cameras": [{"name": ..., "snapshot_url": ...}]}`
#[derive(Debug, Deserialize, Serialize)]
struct CameraFile {
    #[serde(default)]
    cameras: Vec<CameraEntry>,
}

/// One configured camera as supplied by the setup flow
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CameraEntry {
    pub name: String,
    pub snapshot_url: String,
}

/// Read camera definitions from the configuration file
///
/// Ids are slugs derived from the display names; a collision gets a
/// numeric suffix so identity stays stable within one configuration.
pub fn load_cameras(path: &Path) -> Result<Vec<CameraDefinition>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
    let file: CameraFile = serde_json::from_str(&raw)?;

    let mut seen = HashSet::new();
    let definitions = file
        .cameras
        .into_iter()
        .map(|entry| {
            let mut id = create_entity_id(&entry.name);
            let mut n = 2;
            while !seen.insert(id.clone()) {
                id = format!("{}_{n}", create_entity_id(&entry.name));
                n += 1;
            }
            CameraDefinition::new(id, entry.name, entry.snapshot_url)
        })
        .collect();

    Ok(definitions)
}

/// Derive a stable entity id from a camera display name
///
/// Lowercase alphanumeric runs joined by underscores; ids starting with a
/// digit get a `camera_` prefix, and an empty result falls back to
/// `camera`.
pub fn create_entity_id(name: &str) -> String {
    let mut id = String::new();
    let mut last_was_sep = true;
    for c in name.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            id.push(c);
            last_was_sep = false;
        } else if !last_was_sep {
            id.push('_');
            last_was_sep = true;
        }
    }
    let id = id.trim_matches('_').to_string();

    if id.is_empty() {
        "camera".to_string()
    } else if id.starts_with(|c: char| c.is_ascii_digit()) {
        format!("camera_{id}")
    } else {
        id
    }
}
