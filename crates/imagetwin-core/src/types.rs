use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;

/// Supported image formats
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Bmp,
    Gif,
    Tiff,
    WebP,
    Other(String),
}

impl ImageFormat {
    /// Determine format from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Self::Jpeg,
            "png" => Self::Png,
            "bmp" => Self::Bmp,
            "gif" => Self::Gif,
            "tif" | "tiff" => Self::Tiff,
            "webp" => Self::WebP,
            other => Self::Other(other.to_string()),
        }
    }

    /// Check if format is supported
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

/// Representation of an image file found on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageFile {
    /// Full path to the image file
    pub path: PathBuf,

    /// File size in bytes
    pub size: u64,

    /// Last modified timestamp
    pub last_modified: SystemTime,

    /// Image format
    pub format: ImageFormat,
}

/// A single ranked hit from a hash similarity search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Path of the indexed image
    pub path: String,

    /// Stored fingerprint, canonical hex form
    pub fingerprint: String,

    /// Similarity to the query fingerprint, in [0, 1]
    pub similarity: f64,
}

/// Outcome of matching one image pair by local features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    /// Match confidence in [0, 1]
    pub score: f64,

    /// Number of keypoint correspondences surviving the ratio test
    pub matched: usize,
}

/// A single ranked hit from a feature-match search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureQueryResult {
    /// Path of the candidate image
    pub path: String,

    /// Match confidence in [0, 1]
    pub score: f64,

    /// Number of keypoint correspondences surviving the ratio test
    pub matched: usize,
}

/// One per-file failure recorded during a batch operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFailure {
    /// Path that failed
    pub path: PathBuf,

    /// Stable error label, see [`crate::Error::kind`]
    pub kind: String,

    /// Human-readable detail
    pub detail: String,
}

/// Result of a batch indexing run.
///
/// Per-item failures never abort the batch; they are collected here so the
/// caller can observe them without digging through logs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    /// Number of images successfully fingerprinted and upserted
    pub indexed: usize,

    /// Files (or directories) that could not be processed
    pub failures: Vec<BatchFailure>,

    /// True if the batch stopped early on a cancellation signal.
    /// Records upserted before the stop are kept.
    pub cancelled: bool,
}

impl BatchReport {
    pub fn record_failure(&mut self, path: PathBuf, error: &crate::Error) {
        self.failures.push(BatchFailure {
            path,
            kind: error.kind().to_string(),
            detail: error.to_string(),
        });
    }
}

/// Snapshot of the index returned by the status operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStatus {
    /// Total number of indexed images
    pub total_images: usize,

    /// Directory most recently passed to an index run, if any
    pub last_directory: Option<String>,

    /// Whether the keypoint matching backend is usable
    pub feature_match_available: bool,
}
