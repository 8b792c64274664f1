/// Grayscale to black/white thresholding
pub mod binarization;
/// RGB to grayscale conversion
pub mod grayscale;
