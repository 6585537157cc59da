use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Directory scoping rule applied when a search is restricted to a prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeMode {
    /// Plain string-prefix test. `/a/b` also matches `/a/bc/img.jpg`.
    /// This is the legacy contract; trailing separators matter.
    Prefix,

    /// Prefix test that additionally requires a path-separator boundary,
    /// so `/a/b` no longer matches `/a/bc/img.jpg`.
    Segment,
}

/// Configuration for the imagetwin engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the index database file
    pub database_path: PathBuf,

    /// Side length of the perceptual hash grid. Fingerprint width is
    /// `hash_size * hash_size` bits and is fixed for the whole index.
    pub hash_size: usize,

    /// Maximum directory depth for scanning (None = unlimited)
    pub max_depth: Option<usize>,

    /// Number of worker threads for batch hashing (0 = auto)
    pub threads: usize,

    /// Directory scoping rule for searches
    pub scope_mode: ScopeMode,

    /// Default similarity threshold for searches
    pub default_threshold: f64,

    /// Default for the resolution normalization flag
    pub normalize_resolution: bool,

    /// Default for the appearance normalization flag
    pub normalize_appearance: bool,

    /// Whether the keypoint matching backend may be used at all
    pub enable_feature_match: bool,

    /// Maximum keypoints retained per image during feature matching
    pub max_keypoints: usize,

    /// FAST corner detector intensity threshold
    pub fast_threshold: u8,

    /// Lowe ratio-test threshold for descriptor matching
    pub ratio_threshold: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            hash_size: 16,
            max_depth: None,
            threads: 0, // Auto
            scope_mode: ScopeMode::Prefix,
            default_threshold: 0.8,
            normalize_resolution: false,
            normalize_appearance: false,
            enable_feature_match: true,
            max_keypoints: 1000,
            fast_threshold: 20,
            ratio_threshold: 0.75,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)
            .map_err(|e| Error::Configuration(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Configuration(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // The bit width must pack into whole bytes for the hex encoding.
        if self.hash_size < 4 || self.hash_size > 32 || self.hash_size % 4 != 0 {
            return Err(Error::Configuration(format!(
                "hash_size must be a multiple of 4 in 4..=32, got {}",
                self.hash_size
            )));
        }
        if !(0.0..=1.0).contains(&self.default_threshold) {
            return Err(Error::Configuration(format!(
                "default_threshold must be in [0, 1], got {}",
                self.default_threshold
            )));
        }
        if !(0.0..1.0).contains(&self.ratio_threshold) {
            return Err(Error::Configuration(format!(
                "ratio_threshold must be in [0, 1), got {}",
                self.ratio_threshold
            )));
        }
        if self.max_keypoints < 2 {
            return Err(Error::Configuration(
                "max_keypoints must be at least 2".to_string(),
            ));
        }
        Ok(())
    }

    /// Effective worker count for batch hashing
    pub fn worker_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }

    /// Fingerprint width in bits implied by `hash_size`
    pub fn fingerprint_width(&self) -> usize {
        self.hash_size * self.hash_size
    }
}

fn default_database_path() -> PathBuf {
    match ProjectDirs::from("", "", "imagetwin") {
        Some(dirs) => dirs.data_dir().join("image_index.db"),
        None => PathBuf::from("image_index.db"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fingerprint_width(), 256);
    }

    #[test]
    fn rejects_unpackable_hash_size() {
        let mut config = Config::default();
        config.hash_size = 10;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        config.hash_size = 64;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let mut config = Config::default();
        config.default_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.hash_size = 8;
        config.scope_mode = ScopeMode::Segment;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.hash_size, 8);
        assert_eq!(loaded.scope_mode, ScopeMode::Segment);
    }
}
