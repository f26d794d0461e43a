//! Error handling for the CCTV viewer engine

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Command-surface error types
///
/// Fetch-time failures are deliberately not here: they are converted into
/// typed `SnapshotResult` failures at the `SnapshotFetcher` boundary and
/// published to subscribers instead of propagating as `Err`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unknown camera id at command time
    #[error("Camera not found: {0}")]
    NotFound(String),

    /// Invalid configuration or command input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Config file error
    #[error("Config error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client construction error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
