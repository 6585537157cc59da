//! Brute-force 2-NN descriptor matching with the Lowe ratio test.

use super::descriptor::Descriptor;

/// One accepted correspondence: (query index, train index, distance)
pub type DescriptorMatch = (usize, usize, u32);

/// Match every query descriptor against its two nearest train descriptors
/// under Hamming distance, keeping a correspondence only when the best
/// distance is below `ratio * second_best`. Ambiguous matches are dropped.
///
/// Callers guarantee at least two descriptors per side.
pub fn match_descriptors(
    query: &[Descriptor],
    train: &[Descriptor],
    ratio: f32,
) -> Vec<DescriptorMatch> {
    let mut matches = Vec::new();

    for (q_idx, q) in query.iter().enumerate() {
        let mut best: Option<(u32, usize)> = None;
        let mut second: Option<u32> = None;

        for (t_idx, t) in train.iter().enumerate() {
            let dist = q.distance(t);
            match best {
                Some((best_dist, _)) if dist < best_dist => {
                    second = Some(best_dist);
                    best = Some((dist, t_idx));
                }
                Some(_) => {
                    if second.map(|s| dist < s).unwrap_or(true) {
                        second = Some(dist);
                    }
                }
                None => best = Some((dist, t_idx)),
            }
        }

        if let (Some((best_dist, t_idx)), Some(second_dist)) = (best, second) {
            if (best_dist as f32) < ratio * (second_dist as f32) {
                matches.push((q_idx, t_idx, best_dist));
            }
        }
    }

    matches
}

// -- Tests --

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::descriptor::DESCRIPTOR_SIZE;

    fn descriptor(fill: u8, last: u8) -> Descriptor {
        let mut bytes = [fill; DESCRIPTOR_SIZE];
        bytes[DESCRIPTOR_SIZE - 1] = last;
        Descriptor(bytes)
    }

    #[test]
    fn unambiguous_match_is_kept() {
        let query = vec![descriptor(0, 0), descriptor(0xFF, 0xFF)];
        // First train descriptor is 1 bit from query[0]; second is far away
        let train = vec![descriptor(0, 1), descriptor(0xFF, 0xF0)];

        let matches = match_descriptors(&query, &train, 0.75);
        assert!(matches.iter().any(|&(q, t, d)| q == 0 && t == 0 && d == 1));
    }

    #[test]
    fn ambiguous_match_is_rejected() {
        let query = vec![descriptor(0, 0b11)];
        // Both train descriptors are nearly equidistant from the query
        let train = vec![descriptor(0, 0b01), descriptor(0, 0b10)];

        let matches = match_descriptors(&query, &train, 0.75);
        assert!(matches.is_empty());
    }

    #[test]
    fn identical_descriptors_fail_the_ratio_test() {
        // best == second == 0, and 0 < 0.75 * 0 is false
        let query = vec![descriptor(7, 7)];
        let train = vec![descriptor(7, 7), descriptor(7, 7)];

        let matches = match_descriptors(&query, &train, 0.75);
        assert!(matches.is_empty());
    }

    #[test]
    fn exact_match_against_distinct_background_passes() {
        let query = vec![descriptor(0xAB, 0xCD)];
        let train = vec![descriptor(0xAB, 0xCD), descriptor(0x00, 0x00)];

        let matches = match_descriptors(&query, &train, 0.75);
        assert_eq!(matches, vec![(0, 0, 0)]);
    }
}
