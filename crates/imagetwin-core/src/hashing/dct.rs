//! 2-D DCT-II over a square grayscale tile, built on `rustdct` plans.

use std::sync::Arc;

use ndarray::Array2;
use rustdct::TransformType2And3;

/// Apply an unnormalized DCT-II along both axes of a square tile, in place.
///
/// Rows first, then columns, matching the separable transform the hex
/// fingerprints were originally derived with. The plan length must equal the
/// tile side.
pub fn dct2_in_place(plan: &Arc<dyn TransformType2And3<f32>>, tile: &mut Array2<f32>) {
    let n = tile.nrows();
    debug_assert_eq!(n, tile.ncols());

    let mut line = vec![0.0f32; n];

    for i in 0..n {
        for j in 0..n {
            line[j] = tile[[i, j]];
        }
        plan.process_dct2(&mut line);
        for j in 0..n {
            tile[[i, j]] = line[j];
        }
    }

    for j in 0..n {
        for i in 0..n {
            line[i] = tile[[i, j]];
        }
        plan.process_dct2(&mut line);
        for i in 0..n {
            tile[[i, j]] = line[i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustdct::DctPlanner;

    #[test]
    fn constant_tile_concentrates_in_dc() {
        let n = 8;
        let plan = DctPlanner::new().plan_dct2(n);
        let mut tile = Array2::from_elem((n, n), 1.0f32);

        dct2_in_place(&plan, &mut tile);

        // All energy in the DC coefficient, everything else ~0
        assert!(tile[[0, 0]] > 1.0);
        for i in 0..n {
            for j in 0..n {
                if i == 0 && j == 0 {
                    continue;
                }
                assert!(tile[[i, j]].abs() < 1e-3, "AC coefficient {},{} not ~0", i, j);
            }
        }
    }

    #[test]
    fn dct_is_deterministic() {
        let n = 16;
        let plan = DctPlanner::new().plan_dct2(n);
        let source = Array2::from_shape_fn((n, n), |(i, j)| (i * 31 + j * 7) as f32 % 97.0);

        let mut a = source.clone();
        let mut b = source;
        dct2_in_place(&plan, &mut a);
        dct2_in_place(&plan, &mut b);

        assert_eq!(a, b);
    }
}
