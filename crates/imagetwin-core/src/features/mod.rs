//! # Local Feature Matching
//!
//! Keypoint-based verification for the cases global hashing cannot handle:
//! screenshots embedded in larger images, crops, partial occlusion. Detects
//! oriented corners on both images, describes them with steered binary
//! descriptors, and counts correspondences that survive a nearest/second-
//! nearest ratio test under Hamming distance.
//!
//! The whole pipeline is compiled behind the `feature-match` cargo feature.
//! Without it (or with the config switch off) calls fail fast with
//! `FeatureBackendUnavailable` so a hash-only deployment degrades instead of
//! crashing.

#[cfg(feature = "feature-match")]
mod descriptor;
#[cfg(feature = "feature-match")]
mod detect;
#[cfg(feature = "feature-match")]
mod matcher;

#[cfg(feature = "feature-match")]
use image::imageops::FilterType;
use image::DynamicImage;
#[cfg(feature = "feature-match")]
use image::GenericImageView;

use crate::config::Config;
use crate::error::Result;
use crate::types::MatchOutcome;

/// Detection images are bounded to this longer edge; keeps the keypoint
/// budget meaningful on large photos.
#[cfg(feature = "feature-match")]
const DETECT_EDGE: u32 = 640;

/// Keypoint matcher with a fixed per-image budget.
///
/// Stateless between calls and safe to share across threads.
pub struct FeatureMatcher {
    max_keypoints: usize,
    fast_threshold: u8,
    ratio_threshold: f32,
}

impl FeatureMatcher {
    pub fn new(config: &Config) -> Self {
        Self {
            max_keypoints: config.max_keypoints,
            fast_threshold: config.fast_threshold,
            ratio_threshold: config.ratio_threshold,
        }
    }

    /// Whether the matching backend was compiled into this build
    pub const fn backend_compiled() -> bool {
        cfg!(feature = "feature-match")
    }

    /// Match two images by local features.
    ///
    /// Returns score 0 with zero matches when either image yields fewer than
    /// two descriptors. Above `min_match_count` correspondences the score
    /// scales with coverage of the smaller keypoint set; below it, a damped
    /// partial-credit score keeps weak matches distinguishable from none.
    #[cfg(feature = "feature-match")]
    pub fn match_images(
        &self,
        query: &DynamicImage,
        target: &DynamicImage,
        min_match_count: usize,
    ) -> Result<MatchOutcome> {
        let query_gray = prepare(query);
        let target_gray = prepare(target);

        let query_kp = detect::detect_keypoints(&query_gray, self.fast_threshold, self.max_keypoints);
        let target_kp =
            detect::detect_keypoints(&target_gray, self.fast_threshold, self.max_keypoints);

        let query_desc = descriptor::compute_descriptors(&query_gray, &query_kp);
        let target_desc = descriptor::compute_descriptors(&target_gray, &target_kp);

        if query_desc.len() < 2 || target_desc.len() < 2 {
            return Ok(MatchOutcome {
                score: 0.0,
                matched: 0,
            });
        }

        let matches = matcher::match_descriptors(&query_desc, &target_desc, self.ratio_threshold);
        let matched = matches.len();

        let smaller_side = query_desc.len().min(target_desc.len());
        let score = if min_match_count == 0 || matched >= min_match_count {
            (matched as f64 / (0.3 * smaller_side as f64)).min(1.0)
        } else {
            (matched as f64 / min_match_count as f64) * 0.5
        };

        Ok(MatchOutcome { score, matched })
    }

    #[cfg(not(feature = "feature-match"))]
    pub fn match_images(
        &self,
        _query: &DynamicImage,
        _target: &DynamicImage,
        _min_match_count: usize,
    ) -> Result<MatchOutcome> {
        Err(crate::error::Error::FeatureBackendUnavailable)
    }
}

#[cfg(feature = "feature-match")]
fn prepare(img: &DynamicImage) -> image::GrayImage {
    if img.width().max(img.height()) > DETECT_EDGE {
        img.resize(DETECT_EDGE, DETECT_EDGE, FilterType::Triangle)
            .to_luma8()
    } else {
        img.to_luma8()
    }
}

// -- Tests --
