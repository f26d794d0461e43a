//! SnapshotFetcher - Still Image Capture over HTTP(S)
//!
//! ## Responsibilities
//!
//! - One GET per call against a camera's snapshot URL, bounded timeout
//! - Self-signed certificate tolerance (transport stays encrypted)
//! - JPEG/PNG validation (content type preflight + magic byte sniffing)
//! - Normalization to a bounded target (320x240, up to 80 KB)
//!
//! No retries and no side effects beyond the network call; retry cadence
//! belongs to the polling loop. Every failure is converted into a typed
//! `SnapshotResult` failure at this boundary.

mod types;

pub use types::{
    FetchErrorKind, ImageKind, SnapshotFailure, SnapshotFrame, SnapshotResult,
};

use crate::camera_registry::CameraDefinition;
use crate::error::Result;
use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use std::time::Duration;

/// Total request timeout; short enough that a hung camera cannot starve
/// the 10 second refresh cadence
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(7);

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Normalization target resolution for the remote display
const TARGET_WIDTH: u32 = 320;
const TARGET_HEIGHT: u32 = 240;

/// Upper bound on published image bytes
const MAX_SNAPSHOT_BYTES: usize = 80 * 1024;

/// Payloads below this are rejected as truncated/bogus
const MIN_SNAPSHOT_BYTES: usize = 1000;

/// JPEG re-encode quality ladder
const JPEG_QUALITY_START: u8 = 85;
const JPEG_QUALITY_FLOOR: u8 = 20;
const JPEG_QUALITY_STEP: u8 = 10;

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

/// SnapshotFetcher instance
pub struct SnapshotFetcher {
    client: reqwest::Client,
}

impl SnapshotFetcher {
    /// Create a new fetcher with a shared HTTP client
    ///
    /// Certificate validation is relaxed because consumer cameras almost
    /// universally ship self-signed certificates; the HTTPS transport
    /// itself is never downgraded.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self { client })
    }

    /// Fetch one snapshot from a camera
    ///
    /// Never returns `Err`: all failures are mapped to a typed
    /// `SnapshotResult::Failure`.
    pub async fn fetch(&self, camera: &CameraDefinition) -> SnapshotResult {
        match self.try_fetch(camera).await {
            Ok(frame) => {
                tracing::debug!(
                    camera_id = %camera.id,
                    size = frame.image.len(),
                    width = frame.width,
                    height = frame.height,
                    "Snapshot fetched"
                );
                SnapshotResult::Frame(frame)
            }
            Err((kind, message)) => {
                tracing::warn!(
                    camera_id = %camera.id,
                    kind = kind.as_str(),
                    error = %message,
                    "Snapshot fetch failed"
                );
                SnapshotResult::Failure(SnapshotFailure {
                    camera_id: camera.id.clone(),
                    kind,
                    message,
                })
            }
        }
    }

    async fn try_fetch(
        &self,
        camera: &CameraDefinition,
    ) -> std::result::Result<SnapshotFrame, (FetchErrorKind, String)> {
        let resp = self
            .client
            .get(&camera.snapshot_url)
            .send()
            .await
            .map_err(transport_failure)?;

        let status = resp.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err((
                FetchErrorKind::AuthRejected,
                format!("camera rejected credentials (HTTP {})", status.as_u16()),
            ));
        }
        if !status.is_success() {
            return Err((
                FetchErrorKind::HttpError {
                    code: status.as_u16(),
                },
                format!("HTTP {}", status.as_u16()),
            ));
        }

        // Reject stream/HTML responses before reading the body: an MJPEG
        // stream would otherwise block until the request timeout.
        if let Some(content_type) = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            let content_type = content_type.to_ascii_lowercase();
            if content_type.starts_with("text/")
                || content_type.starts_with("video/")
                || content_type.starts_with("multipart/")
            {
                return Err((
                    FetchErrorKind::InvalidContent,
                    format!("not a still image: content-type {content_type}"),
                ));
            }
        }

        let bytes = resp.bytes().await.map_err(transport_failure)?;

        if bytes.len() < MIN_SNAPSHOT_BYTES {
            return Err((
                FetchErrorKind::InvalidContent,
                format!("payload too small to be a snapshot ({} bytes)", bytes.len()),
            ));
        }

        let format = sniff_format(&bytes).ok_or_else(|| {
            (
                FetchErrorKind::InvalidContent,
                "payload is neither JPEG nor PNG".to_string(),
            )
        })?;

        let (image, format, width, height) = normalize(&bytes, format)?;

        Ok(SnapshotFrame {
            camera_id: camera.id.clone(),
            image,
            format,
            width,
            height,
            fetched_at: Utc::now(),
        })
    }
}

/// Map a transport-level reqwest error to the failure taxonomy
fn transport_failure(e: reqwest::Error) -> (FetchErrorKind, String) {
    let message = if e.is_timeout() {
        format!("request timed out after {}s", FETCH_TIMEOUT.as_secs())
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        format!("network error: {e}")
    };
    (FetchErrorKind::Unreachable, message)
}

/// Detect JPEG/PNG from magic bytes
fn sniff_format(data: &[u8]) -> Option<ImageKind> {
    if data.starts_with(JPEG_MAGIC) {
        Some(ImageKind::Jpeg)
    } else if data.starts_with(PNG_MAGIC) {
        Some(ImageKind::Png)
    } else {
        None
    }
}

/// Normalize a decoded snapshot to the display target
///
/// Images already within 320x240 and the byte ceiling pass through
/// unmodified in their original format. Oversized ones are resized to fit
/// (aspect preserved, never upscaled) and re-encoded as JPEG, stepping
/// quality down until the result fits the byte ceiling.
fn normalize(
    data: &[u8],
    format: ImageKind,
) -> std::result::Result<(Vec<u8>, ImageKind, u32, u32), (FetchErrorKind, String)> {
    let decoded = image::load_from_memory(data).map_err(|e| {
        (
            FetchErrorKind::DecodeFailure,
            format!("image decode failed: {e}"),
        )
    })?;

    let (width, height) = (decoded.width(), decoded.height());
    if width <= TARGET_WIDTH && height <= TARGET_HEIGHT && data.len() <= MAX_SNAPSHOT_BYTES {
        return Ok((data.to_vec(), format, width, height));
    }

    // only downscale; an in-bounds image that is merely too heavy gets
    // re-encoded at its original dimensions
    let resized = if width > TARGET_WIDTH || height > TARGET_HEIGHT {
        decoded.resize(TARGET_WIDTH, TARGET_HEIGHT, FilterType::Lanczos3)
    } else {
        decoded
    };
    let rgb = resized.to_rgb8();

    let mut quality = JPEG_QUALITY_START;
    loop {
        let mut buf = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
        encoder.encode_image(&rgb).map_err(|e| {
            (
                FetchErrorKind::DecodeFailure,
                format!("JPEG re-encode failed: {e}"),
            )
        })?;

        if buf.len() <= MAX_SNAPSHOT_BYTES || quality <= JPEG_QUALITY_FLOOR {
            return Ok((buf, ImageKind::Jpeg, rgb.width(), rgb.height()));
        }
        quality -= JPEG_QUALITY_STEP;
    }
}
