//! Hamming-distance similarity ranking over indexed fingerprints.
//!
//! A linear scan over the scoped candidate set: O(n·width), fine for tens of
//! thousands of images per directory. A bit-indexed structure (BK-tree, LSH
//! over Hamming space) could replace this without changing the contract.

use log::debug;

use crate::hashing::Fingerprint;
use crate::index::ImageRecord;
use crate::types::QueryResult;

/// Rank candidates by similarity to the query fingerprint.
///
/// Stored fingerprints that fail to parse or whose width differs from the
/// query are skipped, never fatal. Results with `similarity >= threshold`
/// are returned sorted by similarity descending; ties keep candidate order,
/// so output is deterministic for a deterministic candidate iteration.
pub fn rank_by_similarity(
    query: &Fingerprint,
    candidates: &[ImageRecord],
    threshold: f64,
) -> Vec<QueryResult> {
    let mut results: Vec<QueryResult> = Vec::new();

    for record in candidates {
        let stored = match Fingerprint::from_hex(&record.fingerprint) {
            Ok(fingerprint) => fingerprint,
            Err(_) => {
                debug!(
                    "skipping {}: stored fingerprint is not valid hex",
                    record.path
                );
                continue;
            }
        };

        let similarity = match query.similarity(&stored) {
            Some(similarity) => similarity,
            None => {
                debug!(
                    "skipping {}: fingerprint width {} != query width {}",
                    record.path,
                    stored.width(),
                    query.width()
                );
                continue;
            }
        };

        if similarity >= threshold {
            results.push(QueryResult {
                path: record.path.clone(),
                fingerprint: record.fingerprint.clone(),
                similarity,
            });
        }
    }

    // Stable sort keeps candidate order for equal similarities
    results.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, fingerprint: &str) -> ImageRecord {
        ImageRecord {
            path: path.to_string(),
            fingerprint: fingerprint.to_string(),
            file_size: 0,
            modified_time: 0,
            width: 0,
            height: 0,
            created_at: 0,
        }
    }

    #[test]
    fn exact_match_ranks_first_with_similarity_one() {
        let candidates = vec![
            record("/test/image1.jpg", "abcd1234"),
            record("/test/image2.jpg", "abcd1235"),
            record("/test/image3.jpg", "ffff0000"),
        ];
        let query = Fingerprint::from_hex("abcd1234").unwrap();

        let results = rank_by_similarity(&query, &candidates, 0.8);

        assert_eq!(results[0].path, "/test/image1.jpg");
        assert_eq!(results[0].similarity, 1.0);
        // ffff0000 is far from abcd1234 and must not appear at 0.8
        assert!(results.iter().all(|r| r.path != "/test/image3.jpg"));
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn results_are_sorted_by_descending_similarity() {
        let candidates = vec![
            record("/a.jpg", "abcd123f"), // 3 bits away
            record("/b.jpg", "abcd1234"), // exact
            record("/c.jpg", "abcd1235"), // 1 bit away
        ];
        let query = Fingerprint::from_hex("abcd1234").unwrap();

        let results = rank_by_similarity(&query, &candidates, 0.0);

        let paths: Vec<&str> = results.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/b.jpg", "/c.jpg", "/a.jpg"]);
    }

    #[test]
    fn ties_keep_candidate_order() {
        let candidates = vec![
            record("/first.jpg", "abcd1235"),
            record("/second.jpg", "abcd1236"), // also 1 bit away
        ];
        let query = Fingerprint::from_hex("abcd1234").unwrap();

        let results = rank_by_similarity(&query, &candidates, 0.0);
        assert_eq!(results[0].path, "/first.jpg");
        assert_eq!(results[1].path, "/second.jpg");
        assert_eq!(results[0].similarity, results[1].similarity);
    }

    #[test]
    fn malformed_and_mismatched_fingerprints_are_skipped() {
        let candidates = vec![
            record("/bad-hex.jpg", "not-hex!"),
            record("/short.jpg", "abcd"),
            record("/ok.jpg", "abcd1234"),
        ];
        let query = Fingerprint::from_hex("abcd1234").unwrap();

        let results = rank_by_similarity(&query, &candidates, 0.0);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, "/ok.jpg");
    }

    #[test]
    fn threshold_filters_low_similarity() {
        let candidates = vec![
            record("/near.jpg", "abcd1235"),
            record("/far.jpg", "5432edcb"),
        ];
        let query = Fingerprint::from_hex("abcd1234").unwrap();

        let results = rank_by_similarity(&query, &candidates, 0.9);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].path, "/near.jpg");
    }

    #[test]
    fn similarity_values_stay_in_unit_interval() {
        // All bits differ
        let candidates = vec![record("/inverse.jpg", "ffffffff")];
        let query = Fingerprint::from_hex("00000000").unwrap();

        let results = rank_by_similarity(&query, &candidates, 0.0);
        assert_eq!(results[0].similarity, 0.0);
    }
}
