//! PDF417 scanning decoder
//!
//! The pipeline, in order: the row indicator columns are scanned and voted
//! into barcode metadata, the interior columns are scanned codeword by
//! codeword, row numbers are resolved by fixpoint propagation, the voted
//! grid is flattened and error-corrected over GF(929), and the codeword
//! stream is interpreted through the compaction-mode grammar.

/// Compaction-mode state machine over the corrected codeword stream
pub mod bitstream;
/// Corner bookkeeping for the (possibly skewed) symbol quad
pub mod bounding_box;
/// One decoded 17-module symbol
pub mod codeword;
/// Module-width reconciliation and symbol pattern decoding
pub mod codeword_decoder;
/// Per-column codeword storage, including row indicator behavior
pub mod column;
/// Iteration caps, overridable through PDF417_* environment variables
pub mod config;
/// Row-number resolution across columns
pub mod detection_result;
/// Vote containers and barcode-wide metadata
pub mod metadata;
/// GF(929) Reed-Solomon error correction
pub mod reed_solomon;
/// Orchestrates scanning, grid assembly and the final decode
pub mod scanning_decoder;
/// Symbol pattern tables and domain constants
pub mod tables;

#[cfg(test)]
mod tests;

pub use scanning_decoder::ScanningDecoder;
