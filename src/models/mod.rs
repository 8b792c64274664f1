/// Decoded barcode result types
pub mod barcode;
/// Bit-packed binary image
pub mod matrix;
/// Image-space points
pub mod point;

pub use barcode::{MacroMetadata, Pdf417Barcode};
pub use matrix::BitMatrix;
pub use point::Point;
