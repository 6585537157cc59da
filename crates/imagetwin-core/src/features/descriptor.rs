//! Steered 256-bit binary descriptors.
//!
//! Each descriptor bit is an intensity comparison between two offsets of a
//! fixed sampling pattern, rotated to the keypoint orientation. Intensities
//! are 5×5 box-smoothed through an integral image. The pattern is generated
//! once from a fixed seed, so descriptors are deterministic across runs and
//! machines.

use image::GrayImage;
use once_cell::sync::Lazy;

use super::detect::Keypoint;

/// Descriptor length in bytes (256 bits)
pub const DESCRIPTOR_SIZE: usize = 32;

/// Sampling offsets stay inside this radius so the rotated pattern plus the
/// smoothing window fits within the detector's edge margin.
const PATTERN_RADIUS: i32 = 13;

/// Half-width of the box smoothing window
const BOX_RADIUS: i32 = 2;

/// A 256-bit binary descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor(pub [u8; DESCRIPTOR_SIZE]);

impl Descriptor {
    /// Hamming distance to another descriptor
    pub fn distance(&self, other: &Descriptor) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }
}

/// 256 point pairs inside the pattern disc, fixed for the process lifetime
static PATTERN: Lazy<Vec<((i32, i32), (i32, i32))>> = Lazy::new(generate_pattern);

fn generate_pattern() -> Vec<((i32, i32), (i32, i32))> {
    let mut state = 0x9E37_79B9u32;
    let mut next_offset = move || loop {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let dx = (state % (2 * PATTERN_RADIUS as u32 + 1)) as i32 - PATTERN_RADIUS;
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let dy = (state % (2 * PATTERN_RADIUS as u32 + 1)) as i32 - PATTERN_RADIUS;
        if dx * dx + dy * dy <= PATTERN_RADIUS * PATTERN_RADIUS {
            return (dx, dy);
        }
    };

    (0..DESCRIPTOR_SIZE * 8)
        .map(|_| (next_offset(), next_offset()))
        .collect()
}

/// Summed-area table for O(1) box sums
pub struct IntegralImage {
    sums: Vec<u64>,
    width: usize,
}

impl IntegralImage {
    pub fn new(img: &GrayImage) -> Self {
        let (w, h) = (img.width() as usize, img.height() as usize);
        let mut sums = vec![0u64; (w + 1) * (h + 1)];
        let pixels = img.as_raw();
        for y in 0..h {
            let mut row_sum = 0u64;
            for x in 0..w {
                row_sum += u64::from(pixels[y * w + x]);
                sums[(y + 1) * (w + 1) + (x + 1)] = sums[y * (w + 1) + (x + 1)] + row_sum;
            }
        }
        Self { sums, width: w }
    }

    /// Sum over the inclusive pixel rectangle [x0..=x1] × [y0..=y1]
    fn rect_sum(&self, x0: i32, y0: i32, x1: i32, y1: i32) -> u64 {
        let w = self.width + 1;
        let (x0, y0) = (x0 as usize, y0 as usize);
        let (x1, y1) = (x1 as usize + 1, y1 as usize + 1);
        self.sums[y1 * w + x1] + self.sums[y0 * w + x0]
            - self.sums[y0 * w + x1]
            - self.sums[y1 * w + x0]
    }

    /// Box-smoothed intensity at (x, y); both sides of a comparison use the
    /// same window area, so the sum stands in for the mean.
    fn smoothed(&self, x: i32, y: i32) -> u64 {
        self.rect_sum(x - BOX_RADIUS, y - BOX_RADIUS, x + BOX_RADIUS, y + BOX_RADIUS)
    }
}

/// Compute one descriptor per keypoint.
///
/// Keypoints are assumed to respect the detector's edge margin; offsets are
/// clamped defensively all the same.
pub fn compute_descriptors(img: &GrayImage, keypoints: &[Keypoint]) -> Vec<Descriptor> {
    let integral = IntegralImage::new(img);
    let (w, h) = (img.width() as i32, img.height() as i32);

    keypoints
        .iter()
        .map(|kp| describe(&integral, kp, w, h))
        .collect()
}

fn describe(integral: &IntegralImage, kp: &Keypoint, w: i32, h: i32) -> Descriptor {
    let (sin, cos) = kp.angle.sin_cos();
    let mut bytes = [0u8; DESCRIPTOR_SIZE];

    for (bit, &(p, q)) in PATTERN.iter().enumerate() {
        let a = integral.smoothed(
            clamp_coord(kp.x + rotate_x(p, sin, cos), w),
            clamp_coord(kp.y + rotate_y(p, sin, cos), h),
        );
        let b = integral.smoothed(
            clamp_coord(kp.x + rotate_x(q, sin, cos), w),
            clamp_coord(kp.y + rotate_y(q, sin, cos), h),
        );
        if a < b {
            bytes[bit / 8] |= 1 << (7 - (bit % 8));
        }
    }

    Descriptor(bytes)
}

fn rotate_x(p: (i32, i32), sin: f32, cos: f32) -> i32 {
    (p.0 as f32 * cos - p.1 as f32 * sin).round() as i32
}

fn rotate_y(p: (i32, i32), sin: f32, cos: f32) -> i32 {
    (p.0 as f32 * sin + p.1 as f32 * cos).round() as i32
}

fn clamp_coord(v: i32, bound: i32) -> i32 {
    v.clamp(BOX_RADIUS, bound - 1 - BOX_RADIUS)
}

// -- Tests --
