//! FAST-9 corner detection with orientation assignment.
//!
//! Corners are scored, non-max suppressed in a 3×3 neighborhood, capped to
//! the configured keypoint budget, and given an intensity-centroid
//! orientation so descriptors can be steered.

use image::GrayImage;

/// Bresenham circle of radius 3 around the candidate pixel, clockwise from
/// 12 o'clock
const CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

/// Contiguous arc length required for a FAST-9 corner
const ARC_LENGTH: usize = 9;

/// Radius of the orientation patch
const PATCH_RADIUS: i32 = 15;

/// Keypoints closer than this to any border are discarded; the steered
/// sampling pattern plus box smoothing must stay inside the image.
pub const EDGE_MARGIN: i32 = 16;

/// An oriented corner
#[derive(Debug, Clone, Copy)]
pub struct Keypoint {
    pub x: i32,
    pub y: i32,
    pub score: u32,
    pub angle: f32,
}

/// Detect up to `max_keypoints` oriented FAST-9 corners.
///
/// Deterministic: scan order, suppression, and the score-ordered cap give
/// the same keypoint set for the same pixels every time.
pub fn detect_keypoints(img: &GrayImage, threshold: u8, max_keypoints: usize) -> Vec<Keypoint> {
    let (w, h) = (img.width() as i32, img.height() as i32);
    if w <= 2 * EDGE_MARGIN || h <= 2 * EDGE_MARGIN {
        return Vec::new();
    }

    let stride = w as usize;
    let pixels = img.as_raw();
    let mut scores = vec![0u32; stride * h as usize];

    let t = i32::from(threshold);

    for y in EDGE_MARGIN..h - EDGE_MARGIN {
        for x in EDGE_MARGIN..w - EDGE_MARGIN {
            let center = i32::from(pixels[(y as usize) * stride + x as usize]);

            // Quick reject on the four compass points
            let mut brighter = 0;
            let mut darker = 0;
            for &(dx, dy) in &[CIRCLE[0], CIRCLE[4], CIRCLE[8], CIRCLE[12]] {
                let v = i32::from(pixels[((y + dy) as usize) * stride + (x + dx) as usize]);
                if v >= center + t {
                    brighter += 1;
                } else if v <= center - t {
                    darker += 1;
                }
            }
            if brighter < 3 && darker < 3 {
                continue;
            }

            let mut ring = [0i32; 16];
            for (i, &(dx, dy)) in CIRCLE.iter().enumerate() {
                ring[i] = i32::from(pixels[((y + dy) as usize) * stride + (x + dx) as usize]);
            }

            if !has_contiguous_arc(&ring, center, t) {
                continue;
            }

            scores[(y as usize) * stride + x as usize] = corner_score(&ring, center, t);
        }
    }

    // 3×3 non-max suppression over the score grid
    let mut keypoints = Vec::new();
    for y in EDGE_MARGIN..h - EDGE_MARGIN {
        for x in EDGE_MARGIN..w - EDGE_MARGIN {
            let score = scores[(y as usize) * stride + x as usize];
            if score == 0 {
                continue;
            }
            let mut is_max = true;
            'nms: for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let neighbor = scores[((y + dy) as usize) * stride + (x + dx) as usize];
                    if neighbor > score || (neighbor == score && (dy < 0 || (dy == 0 && dx < 0))) {
                        is_max = false;
                        break 'nms;
                    }
                }
            }
            if is_max {
                keypoints.push(Keypoint {
                    x,
                    y,
                    score,
                    angle: 0.0,
                });
            }
        }
    }

    keypoints.sort_by(|a, b| b.score.cmp(&a.score));
    keypoints.truncate(max_keypoints);

    for kp in &mut keypoints {
        kp.angle = orientation(pixels, stride, kp.x, kp.y);
    }

    keypoints
}

/// True if 9 contiguous ring pixels are all brighter than `center + t` or
/// all darker than `center - t` (circular)
fn has_contiguous_arc(ring: &[i32; 16], center: i32, t: i32) -> bool {
    let mut bright_run = 0usize;
    let mut dark_run = 0usize;
    for i in 0..32 {
        let v = ring[i % 16];
        if v >= center + t {
            bright_run += 1;
            if bright_run >= ARC_LENGTH {
                return true;
            }
        } else {
            bright_run = 0;
        }
        if v <= center - t {
            dark_run += 1;
            if dark_run >= ARC_LENGTH {
                return true;
            }
        } else {
            dark_run = 0;
        }
    }
    false
}

/// Corner strength: total intensity margin beyond the threshold
fn corner_score(ring: &[i32; 16], center: i32, t: i32) -> u32 {
    let mut score = 0i32;
    for &v in ring {
        let diff = (v - center).abs();
        if diff > t {
            score += diff - t;
        }
    }
    score.max(1) as u32
}

/// Intensity-centroid orientation over a circular patch
fn orientation(pixels: &[u8], stride: usize, x: i32, y: i32) -> f32 {
    let mut m01 = 0i64;
    let mut m10 = 0i64;
    for dy in -PATCH_RADIUS..=PATCH_RADIUS {
        let span = (((PATCH_RADIUS * PATCH_RADIUS - dy * dy) as f64).sqrt()) as i32;
        for dx in -span..=span {
            let px = x + dx;
            let py = y + dy;
            if px < 0 || py < 0 {
                continue;
            }
            let row = py as usize;
            let col = px as usize;
            if col >= stride {
                continue;
            }
            let idx = row * stride + col;
            if idx >= pixels.len() {
                continue;
            }
            let v = i64::from(pixels[idx]);
            m10 += i64::from(dx) * v;
            m01 += i64::from(dy) * v;
        }
    }
    (m01 as f32).atan2(m10 as f32)
}

// -- Tests --
