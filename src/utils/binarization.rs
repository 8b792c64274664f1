use crate::models::BitMatrix;

/// Convert grayscale to binary using Otsu's thresholding method.
/// Returns a BitMatrix where true = black.
pub fn otsu_binarize(gray: &[u8], width: usize, height: usize) -> BitMatrix {
    let threshold = calculate_otsu_threshold(gray);
    let mut binary = BitMatrix::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            if idx < gray.len() && gray[idx] < threshold {
                binary.set(x, y, true);
            }
        }
    }
    binary
}

/// Otsu's optimal threshold: maximize between-class variance over the
/// histogram.
fn calculate_otsu_threshold(gray: &[u8]) -> u8 {
    let mut histogram = [0u32; 256];
    for &pixel in gray {
        histogram[pixel as usize] += 1;
    }
    let total = gray.len() as f64;
    if total == 0.0 {
        return 128;
    }
    let total_sum: f64 = histogram
        .iter()
        .enumerate()
        .map(|(value, &count)| value as f64 * count as f64)
        .sum();

    let mut best_threshold = 128u8;
    let mut max_variance = 0.0f64;
    let mut background_count = 0.0f64;
    let mut background_sum = 0.0f64;
    for threshold in 0..256usize {
        background_count += histogram[threshold] as f64;
        if background_count == 0.0 {
            continue;
        }
        let foreground_count = total - background_count;
        if foreground_count == 0.0 {
            break;
        }
        background_sum += threshold as f64 * histogram[threshold] as f64;
        let background_mean = background_sum / background_count;
        let foreground_mean = (total_sum - background_sum) / foreground_count;
        let diff = background_mean - foreground_mean;
        let variance = background_count * foreground_count * diff * diff;
        if variance > max_variance {
            max_variance = variance;
            best_threshold = threshold as u8;
        }
    }
    best_threshold.max(1)
}
