//! Symbol localization
//!
//! Finds PDF417 symbols in a binarized image through their start and stop
//! guard patterns and estimates the codeword width envelope the scanning
//! decoder needs.

/// Guard-pattern based symbol finder
pub mod finder;

pub use finder::{Pdf417Finder, SymbolLocation};
