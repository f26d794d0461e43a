//! CCTV Viewer Engine
//!
//! Camera viewing engine for a remote-control display: periodically
//! refreshed still images pulled from HTTP/HTTPS camera endpoints, switched
//! between up to 50 configured cameras through a single viewer entity.
//!
//! ## Architecture (4 Components)
//!
//! 1. CameraRegistry - ordered camera inventory, replaced wholesale on load
//! 2. SnapshotFetcher - one GET per call, image validation + normalization
//! 3. PollingController - viewer state machine, single 10s refresh loop
//! 4. EntityAdapter - host command/attribute translation layer
//!
//! ## Design Principles
//!
//! - At most one refresh loop system-wide, replaced cancel-then-join
//! - Fetch failures are reported results, never loop terminators
//! - CameraRegistry.load is the single ingestion point for configuration

pub mod camera_registry;
pub mod config;
pub mod entity_adapter;
pub mod error;
pub mod polling_controller;
pub mod snapshot_fetcher;

pub use error::{Error, Result};
