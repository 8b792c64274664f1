//! RustPDF417 - fast PDF417 stacked barcode scanning library
//!
//! A pure Rust PDF417 detection and decoding library. The decoder recovers
//! the codeword grid from a skewed, noisy or partially occluded symbol,
//! corrects errors over GF(929) and interprets the text/byte/numeric
//! compaction stream.

#![warn(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

/// PDF417 decoding modules (scanning, row resolution, error correction, bitstream)
pub mod decoder;
/// Symbol localization through start/stop guard patterns
pub mod detector;
/// Decode failure taxonomy
pub mod error;
/// Core data structures (BitMatrix, Point, decoded barcode)
pub mod models;
/// Utility functions (grayscale, binarization)
pub mod utils;

pub use error::DecodeError;
pub use models::{BitMatrix, MacroMetadata, Pdf417Barcode, Point};

use decoder::ScanningDecoder;
use detector::Pdf417Finder;
use utils::binarization::otsu_binarize;
use utils::grayscale::rgb_to_grayscale;

/// Decode all PDF417 barcodes in an RGB image
///
/// # Arguments
/// * `image` - Raw RGB bytes (3 bytes per pixel)
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
///
/// # Example
/// ```
/// let image = vec![255u8; 120 * 80 * 3]; // blank image
/// assert!(rust_pdf417::decode(&image, 120, 80).is_empty());
/// ```
pub fn decode(image: &[u8], width: usize, height: usize) -> Vec<Pdf417Barcode> {
    let gray = rgb_to_grayscale(image, width, height);
    decode_from_grayscale(&gray, width, height)
}

/// Decode all PDF417 barcodes from a pre-computed grayscale image
pub fn decode_from_grayscale(gray: &[u8], width: usize, height: usize) -> Vec<Pdf417Barcode> {
    let binary = otsu_binarize(gray, width, height);
    decode_bit_matrix(&binary)
}

/// Decode all PDF417 barcodes in a binarized image
pub fn decode_bit_matrix(matrix: &BitMatrix) -> Vec<Pdf417Barcode> {
    let mut results = Vec::new();
    for location in Pdf417Finder::find(matrix, true) {
        match ScanningDecoder::decode(
            matrix,
            location.top_left(),
            location.bottom_left(),
            location.top_right(),
            location.bottom_right(),
            location.min_codeword_width(),
            location.max_codeword_width(),
        ) {
            Ok(barcode) => results.push(barcode),
            Err(_error) => {
                #[cfg(debug_assertions)]
                eprintln!("PDF417: candidate region failed to decode: {_error}");
            }
        }
    }
    results
}

/// Decode one symbol from a binarized image region located by an external
/// detector: up to four corner points of the codeword area (one complete
/// left or right pair is required) plus the codeword width envelope in
/// pixels.
pub fn decode_region(
    matrix: &BitMatrix,
    top_left: Option<Point>,
    bottom_left: Option<Point>,
    top_right: Option<Point>,
    bottom_right: Option<Point>,
    min_codeword_width: i32,
    max_codeword_width: i32,
) -> Result<Pdf417Barcode, DecodeError> {
    ScanningDecoder::decode(
        matrix,
        top_left,
        bottom_left,
        top_right,
        bottom_right,
        min_codeword_width,
        max_codeword_width,
    )
}

/// Reader with configuration options
pub struct Reader {
    multiple: bool,
}

impl Reader {
    /// Create a reader that returns every symbol found
    pub fn new() -> Self {
        Self { multiple: true }
    }

    /// Create a reader that stops after the first symbol
    pub fn single() -> Self {
        Self { multiple: false }
    }

    /// Decode PDF417 barcodes in an RGB image
    pub fn decode(&self, image: &[u8], width: usize, height: usize) -> Vec<Pdf417Barcode> {
        let gray = rgb_to_grayscale(image, width, height);
        let binary = otsu_binarize(&gray, width, height);
        let mut results = Vec::new();
        for location in Pdf417Finder::find(&binary, self.multiple) {
            if let Ok(barcode) = ScanningDecoder::decode(
                &binary,
                location.top_left(),
                location.bottom_left(),
                location.top_right(),
                location.bottom_right(),
                location.min_codeword_width(),
                location.max_codeword_width(),
            ) {
                results.push(barcode);
                if !self.multiple {
                    break;
                }
            }
        }
        results
    }

    /// Decode a single barcode (faster if you know there's only one)
    pub fn decode_single(&self, image: &[u8], width: usize, height: usize) -> Option<Pdf417Barcode> {
        self.decode(image, width, height).into_iter().next()
    }
}

impl Default for Reader {
    fn default() -> Self {
        Self::new()
    }
}
