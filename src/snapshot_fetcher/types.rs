//! Snapshot result types
//!
//! One `SnapshotResult` is produced per loop iteration and broadcast to
//! subscribers; only the most recent result per camera is retained.

use chrono::{DateTime, Utc};

/// Published image encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    /// MIME type for attribute publishing
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
        }
    }
}

/// Typed fetch failure taxonomy
///
/// Every fetch-time error is converted to one of these at the
/// `SnapshotFetcher` boundary; none propagate as uncaught faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    /// Connection refused, timeout, DNS failure
    Unreachable,
    /// HTTP 401/403
    AuthRejected,
    /// Other non-2xx status
    HttpError { code: u16 },
    /// Non-image payload (HTML page, video stream, truncated body)
    InvalidContent,
    /// Malformed image bytes
    DecodeFailure,
    /// Camera id no longer resolvable in the registry
    NotFound,
}

impl FetchErrorKind {
    /// Short label for logging and status text
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchErrorKind::Unreachable => "unreachable",
            FetchErrorKind::AuthRejected => "auth_rejected",
            FetchErrorKind::HttpError { .. } => "http_error",
            FetchErrorKind::InvalidContent => "invalid_content",
            FetchErrorKind::DecodeFailure => "decode_failure",
            FetchErrorKind::NotFound => "not_found",
        }
    }
}

/// Successful snapshot: normalized image bytes ready for the display
#[derive(Debug, Clone)]
pub struct SnapshotFrame {
    pub camera_id: String,
    pub image: Vec<u8>,
    pub format: ImageKind,
    pub width: u32,
    pub height: u32,
    pub fetched_at: DateTime<Utc>,
}

/// Failed snapshot attempt
#[derive(Debug, Clone)]
pub struct SnapshotFailure {
    pub camera_id: String,
    pub kind: FetchErrorKind,
    pub message: String,
}

/// Outcome of one fetch attempt
#[derive(Debug, Clone)]
pub enum SnapshotResult {
    Frame(SnapshotFrame),
    Failure(SnapshotFailure),
}

impl SnapshotResult {
    pub fn camera_id(&self) -> &str {
        match self {
            SnapshotResult::Frame(f) => &f.camera_id,
            SnapshotResult::Failure(f) => &f.camera_id,
        }
    }

    pub fn is_frame(&self) -> bool {
        matches!(self, SnapshotResult::Frame(_))
    }
}
