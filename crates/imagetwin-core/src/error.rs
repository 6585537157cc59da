use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Custom error types for the imagetwin library
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image could not be decoded
    #[error("Image decode error: {0}")]
    Decode(#[from] image::ImageError),

    /// File not found error
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Extension outside the supported image format set
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// Stored or supplied fingerprint has the wrong shape for this index
    #[error("Malformed fingerprint: expected {expected} bits, got {actual}")]
    MalformedFingerprint { expected: usize, actual: usize },

    /// Keypoint matching backend not compiled in or switched off
    #[error("Feature matching backend is unavailable")]
    FeatureBackendUnavailable,

    /// Index storage error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Invalid configuration error
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl Error {
    /// Short stable label used in batch reports
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Decode(_) => "decode",
            Error::FileNotFound(_) => "not-found",
            Error::UnsupportedFormat(_) => "unsupported-format",
            Error::MalformedFingerprint { .. } => "malformed-fingerprint",
            Error::FeatureBackendUnavailable => "feature-backend-unavailable",
            Error::Database(_) => "database",
            Error::Configuration(_) => "configuration",
        }
    }
}
