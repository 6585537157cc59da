//! # Perceptual Fingerprinting
//!
//! Frequency-domain perceptual hashing for image similarity detection.
//!
//! A fingerprint summarizes an image's coarse visual structure as a fixed
//! width bit vector: the image is reduced to a square grayscale tile, a 2-D
//! DCT extracts its frequency content, and each retained low-frequency
//! coefficient is thresholded against the block median to yield one bit.
//! Visually similar images produce fingerprints with a small Hamming
//! distance; unrelated images land near width/2.
//!
//! ## Width
//!
//! The grid side (`hash_size`) is an index-wide constant, never a per-image
//! choice. The default 16×16 grid gives 256-bit fingerprints, stored as
//! 64-character hex strings.
//!
//! ## Normalization
//!
//! Two flags remove hash variance that is not caused by content:
//!
//! - resolution: bound the longer edge to 256 px before hashing, so a photo
//!   and its downscaled copy fingerprint alike
//! - appearance: flatten transparency onto a white background and force a
//!   3-channel color space, so an RGBA export and its RGB twin agree
//!
//! Identical input bytes with identical flags always produce the identical
//! bit vector.

mod dct;

use std::cell::RefCell;
use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use ndarray::Array2;
use rustdct::DctPlanner;

use crate::discovery::is_image_path;
use crate::error::{Error, Result};

thread_local! {
    // Planner caches plans per length; one per worker thread
    static DCT_PLANNER: RefCell<DctPlanner<f32>> = RefCell::new(DctPlanner::new());
}

/// Longer-edge bound applied by resolution normalization
const NORMALIZED_EDGE: u32 = 256;

/// Tile side is this multiple of the hash grid side; the extra factor keeps
/// genuine low frequencies in the retained coefficient block.
const TILE_FACTOR: usize = 4;

/// A fixed-width perceptual fingerprint.
///
/// Bits are packed row-major, most significant bit first, so the hex form is
/// canonical: exactly `width/4` characters for a given index configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    bytes: Vec<u8>,
}

impl Fingerprint {
    /// Width of the fingerprint in bits
    pub fn width(&self) -> usize {
        self.bytes.len() * 8
    }

    /// Canonical lowercase hex encoding
    pub fn to_hex(&self) -> String {
        let mut hex = String::with_capacity(self.bytes.len() * 2);
        for byte in &self.bytes {
            hex.push_str(&format!("{:02x}", byte));
        }
        hex
    }

    /// Parse a fingerprint from its hex encoding.
    ///
    /// Fails with `MalformedFingerprint` when the string is not valid hex of
    /// whole bytes; width checks against the index configuration happen at
    /// comparison time.
    pub fn from_hex(hex: &str) -> Result<Self> {
        if hex.is_empty() || hex.len() % 2 != 0 {
            return Err(Error::MalformedFingerprint {
                expected: 0,
                actual: hex.len() * 4,
            });
        }
        let mut bytes = Vec::with_capacity(hex.len() / 2);
        for i in (0..hex.len()).step_by(2) {
            let byte = u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| {
                Error::MalformedFingerprint {
                    expected: 0,
                    actual: hex.len() * 4,
                }
            })?;
            bytes.push(byte);
        }
        Ok(Self { bytes })
    }

    /// Hamming distance to another fingerprint of the same width.
    ///
    /// Returns `None` on a width mismatch; comparing fingerprints from
    /// different index configurations is not meaningful.
    pub fn distance(&self, other: &Fingerprint) -> Option<u32> {
        if self.width() != other.width() {
            return None;
        }
        Some(
            self.bytes
                .iter()
                .zip(other.bytes.iter())
                .map(|(a, b)| (a ^ b).count_ones())
                .sum(),
        )
    }

    /// Similarity in [0, 1]: `1 - distance/width`
    pub fn similarity(&self, other: &Fingerprint) -> Option<f64> {
        let distance = self.distance(other)?;
        Some(1.0 - f64::from(distance) / self.width() as f64)
    }

    fn from_bits(bits: &[bool]) -> Self {
        let mut bytes = vec![0u8; bits.len() / 8];
        for (i, &bit) in bits.iter().enumerate() {
            if bit {
                bytes[i / 8] |= 1 << (7 - (i % 8));
            }
        }
        Self { bytes }
    }
}

/// Computes perceptual fingerprints at a fixed grid size.
///
/// Plain data, freely shared across worker threads; each thread keeps its
/// own cached DCT plan.
pub struct HashComputer {
    hash_size: usize,
    tile_size: usize,
}

impl HashComputer {
    /// Create a computer for a `hash_size` × `hash_size` bit grid
    pub fn new(hash_size: usize) -> Self {
        Self {
            hash_size,
            tile_size: hash_size * TILE_FACTOR,
        }
    }

    /// Fingerprint width in bits
    pub fn width(&self) -> usize {
        self.hash_size * self.hash_size
    }

    /// Compute the fingerprint of a decoded image
    pub fn fingerprint(
        &self,
        img: &DynamicImage,
        normalize_resolution: bool,
        normalize_appearance: bool,
    ) -> Fingerprint {
        let resized;
        let img = if normalize_resolution && img.width().max(img.height()) > NORMALIZED_EDGE {
            resized = img.resize(NORMALIZED_EDGE, NORMALIZED_EDGE, FilterType::Lanczos3);
            &resized
        } else {
            img
        };

        let flattened;
        let img = if normalize_appearance {
            flattened = flatten_onto_white(img);
            &flattened
        } else {
            img
        };

        self.phash(img)
    }

    /// Compute the fingerprint of raw encoded image bytes (e.g. an upload)
    pub fn fingerprint_bytes(
        &self,
        bytes: &[u8],
        normalize_resolution: bool,
        normalize_appearance: bool,
    ) -> Result<Fingerprint> {
        let img = image::load_from_memory(bytes)?;
        Ok(self.fingerprint(&img, normalize_resolution, normalize_appearance))
    }

    /// Compute the fingerprint of an image file.
    ///
    /// The extension is checked against the supported set before any decode
    /// is attempted; unknown extensions fail with `UnsupportedFormat`.
    pub fn fingerprint_file<P: AsRef<Path>>(
        &self,
        path: P,
        normalize_resolution: bool,
        normalize_appearance: bool,
    ) -> Result<Fingerprint> {
        let path = path.as_ref();
        if !is_image_path(path) {
            return Err(Error::UnsupportedFormat(path.display().to_string()));
        }
        let img = image::open(path)?;
        Ok(self.fingerprint(&img, normalize_resolution, normalize_appearance))
    }

    /// Compare two image files directly, returning similarity in [0, 1]
    pub fn compare_files<P: AsRef<Path>>(
        &self,
        a: P,
        b: P,
        normalize_resolution: bool,
        normalize_appearance: bool,
    ) -> Result<f64> {
        let fp_a = self.fingerprint_file(a, normalize_resolution, normalize_appearance)?;
        let fp_b = self.fingerprint_file(b, normalize_resolution, normalize_appearance)?;
        // Same computer, same width; mismatch cannot happen here
        fp_a.similarity(&fp_b)
            .ok_or(Error::MalformedFingerprint {
                expected: fp_a.width(),
                actual: fp_b.width(),
            })
    }

    /// DCT perceptual hash: grayscale tile, 2-D transform, low-frequency
    /// block thresholded against its median.
    fn phash(&self, img: &DynamicImage) -> Fingerprint {
        let gray = img.to_luma8();
        let tile = image::imageops::resize(
            &gray,
            self.tile_size as u32,
            self.tile_size as u32,
            FilterType::Lanczos3,
        );

        let mut matrix = Array2::from_shape_fn((self.tile_size, self.tile_size), |(y, x)| {
            f32::from(tile.get_pixel(x as u32, y as u32)[0])
        });

        let plan = DCT_PLANNER.with(|planner| planner.borrow_mut().plan_dct2(self.tile_size));
        dct::dct2_in_place(&plan, &mut matrix);

        // Retain the top-left low-frequency block, DC included
        let mut coefficients = Vec::with_capacity(self.width());
        for y in 0..self.hash_size {
            for x in 0..self.hash_size {
                coefficients.push(matrix[[y, x]]);
            }
        }

        let median = median_of(&coefficients);
        let bits: Vec<bool> = coefficients.iter().map(|&c| c > median).collect();

        Fingerprint::from_bits(&bits)
    }
}

/// Median of the coefficient block; even-length blocks average the two
/// middle values, matching the hex fingerprints produced historically.
fn median_of(values: &[f32]) -> f32 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// Flatten any alpha channel onto an opaque white background and force RGB8
fn flatten_onto_white(img: &DynamicImage) -> DynamicImage {
    if !img.color().has_alpha() {
        return DynamicImage::ImageRgb8(img.to_rgb8());
    }

    let rgba = img.to_rgba8();
    let mut out = image::RgbImage::new(rgba.width(), rgba.height());
    for (dst, src) in out.pixels_mut().zip(rgba.pixels()) {
        let alpha = u32::from(src[3]);
        for c in 0..3 {
            let value = (u32::from(src[c]) * alpha + 255 * (255 - alpha)) / 255;
            dst[c] = value as u8;
        }
    }
    DynamicImage::ImageRgb8(out)
}

// -- Tests --
