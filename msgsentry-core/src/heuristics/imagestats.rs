//! Pixel-statistics image analysis
//!
//! Stateless detector for hidden payloads in shared images. Three methods,
//! cheapest first:
//!
//! 1. Metadata scan: look for the embedding signature in the raw bytes
//!    (covers EXIF UserComment tags written by common embedding tools).
//! 2. Chi-square test over the grayscale histogram: an unnaturally flat
//!    distribution suggests LSB embedding.
//! 3. LSB run-length analysis: a very long unbroken run of the same least
//!    significant bit in the blue channel is suspicious.
//!
//! Methods 2 and 3 decode the full image, so they only run when deep scan
//! is enabled in the detection config. This analyzer is independent of the
//! observation pipeline and never touches its locks.

use image::GenericImageView;

use crate::types::ImageFinding;

/// Signature written into EXIF UserComment by common embedding tools.
const EMBED_SIGNATURE: &[u8] = b"Stego";

/// Chi-square below this indicates an unnaturally flat histogram
/// (~p=0.05 for 255 degrees of freedom).
const CHI_SQUARE_THRESHOLD: f64 = 293.0;

/// Suspicious length for an unbroken run of identical LSBs.
const LSB_RUN_THRESHOLD: u32 = 500;

/// Analyzer for hidden data in images.
pub struct ImageAnalyzer {
    deep_scan: bool,
}

impl ImageAnalyzer {
    pub fn new(deep_scan: bool) -> Self {
        Self { deep_scan }
    }

    /// Analyze encoded image bytes.
    ///
    /// Never fails: undecodable input yields a negative finding.
    pub fn analyze(&self, bytes: &[u8]) -> ImageFinding {
        if has_signature(bytes) {
            return ImageFinding::positive(
                "Metadata",
                "Embedding signature found in image metadata.",
            );
        }

        if !self.deep_scan {
            return ImageFinding::negative();
        }

        let img = match image::load_from_memory(bytes) {
            Ok(img) => img,
            Err(err) => {
                tracing::debug!(error = %err, "failed to decode image, skipping deep scan");
                return ImageFinding::negative();
            }
        };

        let gray = img.to_luma8();
        if let Some(chi_square) = chi_square(&gray) {
            tracing::debug!(chi_square, "chi-square statistic");
            if chi_square < CHI_SQUARE_THRESHOLD {
                return ImageFinding::positive(
                    "Chi-Square",
                    "Statistical anomalies detected in pixel distribution.",
                );
            }
        }

        let max_run = lsb_max_run(&img);
        tracing::debug!(max_run, "longest LSB run");
        if max_run > LSB_RUN_THRESHOLD {
            return ImageFinding::positive(
                "LSB Analysis",
                "Non-random patterns detected in least significant bits.",
            );
        }

        ImageFinding::negative()
    }
}

fn has_signature(bytes: &[u8]) -> bool {
    bytes
        .windows(EMBED_SIGNATURE.len())
        .any(|window| window == EMBED_SIGNATURE)
}

/// Chi-square statistic of the grayscale histogram against a uniform
/// distribution. None for images too small for the test to be meaningful.
fn chi_square(gray: &image::GrayImage) -> Option<f64> {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total = gray.width() as f64 * gray.height() as f64;
    let expected = total / 256.0;
    if expected < 1.0 {
        return None;
    }

    Some(
        histogram
            .iter()
            .map(|&observed| {
                let delta = observed as f64 - expected;
                delta * delta / expected
            })
            .sum(),
    )
}

/// Longest unbroken run of identical least significant bits in the blue
/// channel, scanning row-major.
fn lsb_max_run(img: &image::DynamicImage) -> u32 {
    let mut max_run = 0u32;
    let mut current_run = 0u32;
    let mut last_lsb = None;

    for (_, _, pixel) in img.pixels() {
        let lsb = pixel.0[2] & 1;
        if Some(lsb) == last_lsb {
            current_run += 1;
        } else {
            max_run = max_run.max(current_run);
            current_run = 1;
            last_lsb = Some(lsb);
        }
    }

    max_run.max(current_run)
}
