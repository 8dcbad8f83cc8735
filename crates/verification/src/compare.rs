//! Image comparison utilities for verification
//!
//! This module compares GPU output images against reference images within a per-channel
//! tolerance, since GPU floating-point reduction order is implementation-defined.

/// Result of comparing two images
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompareResult {
    /// Every channel of every pixel is within tolerance
    Match {
        /// Largest per-channel difference found
        max_difference: f32,
    },
    /// Images have different dimensions
    DimensionMismatch {
        /// Dimensions of the reference image
        reference_dimensions: (u32, u32),
        /// Dimensions of the image under test
        actual_dimensions: (u32, u32),
    },
    /// Images have matching dimensions but some channels differ beyond tolerance
    PixelMismatch {
        /// Largest per-channel difference found
        max_difference: f32,
        /// Number of pixels with at least one channel out of tolerance
        mismatched_pixels: usize,
        /// Total number of pixels compared
        total_pixels: usize,
        /// Whether each of the R, G, B, A channels stayed within tolerance everywhere
        channels_matched: [bool; 4],
    },
}

impl CompareResult {
    pub fn is_match(&self) -> bool {
        matches!(self, CompareResult::Match { .. })
    }

    /// Fraction of pixels out of tolerance, 1.0 for a dimension mismatch
    pub fn mismatch_ratio(&self) -> f64 {
        match self {
            CompareResult::Match { .. } => 0.0,
            CompareResult::DimensionMismatch { .. } => 1.0,
            CompareResult::PixelMismatch {
                mismatched_pixels, total_pixels, ..
            } => *mismatched_pixels as f64 / (*total_pixels).max(1) as f64,
        }
    }
}

/// Compares two RGBA32F images pixel by pixel
///
/// # Arguments
/// * `reference` - Expected image
/// * `actual` - Image under test
/// * `tolerance` - Largest accepted absolute difference per channel
///
/// # Returns
/// A `CompareResult` describing whether the images match and how they differ
pub fn compare_images(reference: &image::Rgba32FImage, actual: &image::Rgba32FImage, tolerance: f32) -> CompareResult {
    if reference.dimensions() != actual.dimensions() {
        return CompareResult::DimensionMismatch {
            reference_dimensions: reference.dimensions(),
            actual_dimensions: actual.dimensions(),
        };
    }

    let mut channels_matched = [true; 4];
    let mut max_difference = 0.0f32;
    let mut mismatched_pixels = 0;

    for (expected, pixel) in reference.pixels().zip(actual.pixels()) {
        let mut pixel_matched = true;
        for i in 0..4 {
            let difference = (expected[i] - pixel[i]).abs();
            // NaN never compares within tolerance
            if !(difference <= tolerance) {
                channels_matched[i] = false;
                pixel_matched = false;
            }
            max_difference = max_difference.max(difference);
        }
        if !pixel_matched {
            mismatched_pixels += 1;
        }
    }

    if mismatched_pixels == 0 {
        CompareResult::Match { max_difference }
    } else {
        CompareResult::PixelMismatch {
            max_difference,
            mismatched_pixels,
            total_pixels: (reference.width() * reference.height()) as usize,
            channels_matched,
        }
    }
}
