//! Typed errors for the library modules.
//!
//! Commands and `main` wrap these in `anyhow` with context; everything below
//! the command layer returns one of these.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Page loading failures from the listings source.
#[derive(Debug, Error)]
pub enum BrowseError {
    #[error("navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("navigation to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("browser setup failed: {0}")]
    Setup(String),
}

/// Why a single generation call produced no text.
///
/// Callers only see success or absence; the variant exists for the log line.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{backend} timed out after {timeout:?}")]
    Timeout {
        backend: &'static str,
        timeout: Duration,
    },

    #[error("{backend} exited with status {code:?}: {stderr}")]
    NonZeroExit {
        backend: &'static str,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{backend} returned empty output")]
    Empty { backend: &'static str },

    #[error("{backend} client error: {message}")]
    Client {
        backend: &'static str,
        message: String,
    },

    #[error("{backend} usage quota exhausted; switch backends with `jobscout model <name>`")]
    QuotaExhausted { backend: &'static str },

    #[error("could not launch {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("missing credential {0}")]
    MissingCredential(&'static str),
}

/// Rendering failures.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("could not launch renderer: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("renderer failed: {0}")]
    Failed(String),

    #[error("renderer timed out after {0:?}")]
    Timeout(Duration),

    #[error("renderer reported success but {} is missing", .0.display())]
    MissingOutput(PathBuf),
}

/// Persisted state (seen set, manifest) failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed json in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("manifest not found: {}", .0.display())]
    ManifestNotFound(PathBuf),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
