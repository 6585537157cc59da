//! Core functionality for indexing images by perceptual fingerprint and
//! retrieving near-duplicates.
//!
//! This library provides the foundational components for similarity search:
//! - File discovery and metadata extraction
//! - Perceptual fingerprint computation with normalization options
//! - A durable path-to-fingerprint index with prefix-scoped queries
//! - Hamming-distance similarity ranking
//! - Keypoint-based local matching for crops and occlusions
//!
//! The [`ImageTwin`] facade owns one open index and is single-writer: share
//! it behind external mutual exclusion if multiple tasks mutate it.
//! Searches only need `&self` and observe consistent snapshots.

// -- External Dependencies --

use log::{info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

// -- Internal Modules --
mod error;

// -- Public Re-exports --
pub use config::{Config, ScopeMode};
pub use error::{Error, Result};
pub use hashing::{Fingerprint, HashComputer};
pub use index::{HashIndex, ImageRecord};
pub use types::*;

// -- Public Modules --
pub mod config;
pub mod discovery;
pub mod features;
pub mod hashing;
pub mod index;
pub mod maintenance;
pub mod search;
pub mod types;

use features::FeatureMatcher;

/// Parameters of one hash similarity search
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Minimum similarity retained, in [0, 1]
    pub threshold: f64,

    /// Bound the query's longer edge before hashing
    pub normalize_resolution: bool,

    /// Flatten alpha and force RGB before hashing
    pub normalize_appearance: bool,
}

impl SearchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            threshold: config.default_threshold,
            normalize_resolution: config.normalize_resolution,
            normalize_appearance: config.normalize_appearance,
        }
    }
}

/// Ranked results plus the query fingerprint for caller-side caching
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub results: Vec<QueryResult>,
    pub query_fingerprint: String,
}

/// Main entry point: perceptual-hash indexing and similarity search over
/// one durable index.
pub struct ImageTwin {
    config: Config,
    index: HashIndex,
    hasher: HashComputer,
    matcher: FeatureMatcher,
    feature_match_available: bool,
}

impl ImageTwin {
    /// Open (creating if missing) the engine over the configured database
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let index = HashIndex::open(&config.database_path)?;
        Self::with_index(config, index)
    }

    /// Build the engine over an already-open index (in-memory in tests)
    pub fn with_index(config: Config, index: HashIndex) -> Result<Self> {
        config.validate()?;
        let hasher = HashComputer::new(config.hash_size);
        let matcher = FeatureMatcher::new(&config);

        // Capability resolved once; calls fail fast afterwards
        let feature_match_available =
            FeatureMatcher::backend_compiled() && config.enable_feature_match;
        if !feature_match_available {
            info!("feature matching disabled; searches degrade to hash-only");
        }

        Ok(Self {
            config,
            index,
            hasher,
            matcher,
            feature_match_available,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether keypoint matching can be used in this process
    pub fn feature_match_available(&self) -> bool {
        self.feature_match_available
    }

    /// Index every supported image under the given directories.
    ///
    /// Returns the batch report; `report.indexed` is the total successfully
    /// indexed count. The cancel flag is checked between write chunks.
    pub fn index(&mut self, directories: &[PathBuf], cancel: &AtomicBool) -> Result<BatchReport> {
        maintenance::index_directories(
            &mut self.index,
            &self.hasher,
            directories,
            &self.config,
            cancel,
        )
    }

    /// Rank indexed images under `directory` by similarity to the query
    /// image bytes.
    ///
    /// Results whose backing file has vanished are dropped from the output;
    /// their index rows survive until the next prune.
    pub fn search(
        &self,
        image_bytes: &[u8],
        directory: &str,
        options: &SearchOptions,
    ) -> Result<SearchOutcome> {
        let query = self.hasher.fingerprint_bytes(
            image_bytes,
            options.normalize_resolution,
            options.normalize_appearance,
        )?;

        let candidates = self.index.scan_scoped(directory, self.config.scope_mode)?;
        let mut results = search::rank_by_similarity(&query, &candidates, options.threshold);
        results.retain(|r| Path::new(&r.path).exists());

        Ok(SearchOutcome {
            results,
            query_fingerprint: query.to_hex(),
        })
    }

    /// Rank images under `directory` by keypoint correspondence with the
    /// query image.
    ///
    /// Candidates come from directory enumeration, not the index. A single
    /// candidate's failure is logged and skipped, never fatal to the batch.
    pub fn search_with_feature_match(
        &self,
        query_path: &Path,
        directory: &Path,
        threshold: f64,
        min_match_count: usize,
    ) -> Result<Vec<FeatureQueryResult>> {
        if !self.feature_match_available {
            return Err(Error::FeatureBackendUnavailable);
        }

        let query = image::open(query_path)?;
        let candidates = discovery::discover_images_in_directory(directory, &self.config)?;

        let matcher = &self.matcher;
        let mut results: Vec<FeatureQueryResult> = candidates
            .par_iter()
            .filter_map(|file| {
                let outcome = image::open(&file.path)
                    .map_err(Error::from)
                    .and_then(|img| matcher.match_images(&query, &img, min_match_count));
                match outcome {
                    Ok(outcome) if outcome.score >= threshold => Some(FeatureQueryResult {
                        path: file.path.to_string_lossy().into_owned(),
                        score: outcome.score,
                        matched: outcome.matched,
                    }),
                    Ok(_) => None,
                    Err(e) => {
                        warn!("feature match failed for {}: {}", file.path.display(), e);
                        None
                    }
                }
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(results)
    }

    /// Compare two image files directly, returning similarity in [0, 1]
    pub fn compare(
        &self,
        a: &Path,
        b: &Path,
        normalize_resolution: bool,
        normalize_appearance: bool,
    ) -> Result<f64> {
        self.hasher
            .compare_files(a, b, normalize_resolution, normalize_appearance)
    }

    /// Current index totals
    pub fn status(&self) -> Result<IndexStatus> {
        Ok(IndexStatus {
            total_images: self.index.count()?,
            last_directory: self.index.last_directory()?,
            feature_match_available: self.feature_match_available,
        })
    }

    /// Delete index entries whose files no longer exist
    pub fn prune(&mut self) -> Result<usize> {
        maintenance::prune(&mut self.index)
    }

    /// Wipe the whole index
    pub fn clear(&mut self) -> Result<()> {
        maintenance::reset(&mut self.index)
    }
}
