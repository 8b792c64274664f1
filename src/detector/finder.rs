use crate::decoder::tables::{
    MODULES_IN_CODEWORD, MODULES_IN_STOP_PATTERN, START_PATTERN, STOP_PATTERN,
};
use crate::models::{BitMatrix, Point};

const MAX_AVG_VARIANCE: f32 = 0.42;
const MAX_INDIVIDUAL_VARIANCE: f32 = 0.8;

const MAX_PIXEL_DRIFT: i32 = 3;
const MAX_PATTERN_DRIFT: i32 = 5;
// low values miss the symbol height when start patterns are damaged, high
// values pick up the start pattern of a neighboring symbol
const SKIPPED_ROW_COUNT_MAX: i32 = 25;
// a symbol has at least 3 rows of at least 3 module heights each; stepping
// half of that never skips one entirely
const ROW_STEP: i32 = 5;
const BARCODE_MIN_HEIGHT: i32 = 10;

// where findRowsWithPattern results land in the vertex array
const INDEXES_START_PATTERN: [usize; 4] = [0, 4, 1, 5];
const INDEXES_STOP_PATTERN: [usize; 4] = [6, 2, 7, 3];

/// Corner points of one located symbol.
///
/// Layout follows the guard patterns: indexes 0..=3 are the outer barcode
/// corners (top-left, bottom-left, top-right, bottom-right), 4..=7 the
/// corresponding corners of the codeword area (start pattern right edge,
/// stop pattern left edge). Either side may be missing when its guard
/// pattern was not found.
#[derive(Debug, Clone)]
pub struct SymbolLocation {
    vertices: [Option<Point>; 8],
}

impl SymbolLocation {
    /// Top-left corner of the codeword area
    pub fn top_left(&self) -> Option<Point> {
        self.vertices[4]
    }

    /// Bottom-left corner of the codeword area
    pub fn bottom_left(&self) -> Option<Point> {
        self.vertices[5]
    }

    /// Top-right corner of the codeword area
    pub fn top_right(&self) -> Option<Point> {
        self.vertices[6]
    }

    /// Bottom-right corner of the codeword area
    pub fn bottom_right(&self) -> Option<Point> {
        self.vertices[7]
    }

    /// Smallest plausible codeword width in pixels, estimated from the
    /// guard pattern widths (the stop pattern is 18 modules wide, one more
    /// than a codeword).
    pub fn min_codeword_width(&self) -> i32 {
        let start = Self::span_min(self.vertices[0], self.vertices[4])
            .min(Self::span_min(self.vertices[1], self.vertices[5]));
        let stop = Self::scale_stop(Self::span_min(self.vertices[6], self.vertices[2]))
            .min(Self::scale_stop(Self::span_min(self.vertices[7], self.vertices[3])));
        start.min(stop)
    }

    /// Largest plausible codeword width in pixels
    pub fn max_codeword_width(&self) -> i32 {
        let start = Self::span_max(self.vertices[0], self.vertices[4])
            .max(Self::span_max(self.vertices[1], self.vertices[5]));
        let stop = Self::scale_stop(Self::span_max(self.vertices[6], self.vertices[2]))
            .max(Self::scale_stop(Self::span_max(self.vertices[7], self.vertices[3])));
        start.max(stop)
    }

    fn span_min(a: Option<Point>, b: Option<Point>) -> i32 {
        match (a, b) {
            (Some(a), Some(b)) => (a.x - b.x).abs() as i32,
            _ => i32::MAX,
        }
    }

    fn span_max(a: Option<Point>, b: Option<Point>) -> i32 {
        match (a, b) {
            (Some(a), Some(b)) => (a.x - b.x).abs() as i32,
            _ => 0,
        }
    }

    fn scale_stop(width: i32) -> i32 {
        if width == i32::MAX || width == 0 {
            return width;
        }
        (width as i64 * MODULES_IN_CODEWORD as i64 / MODULES_IN_STOP_PATTERN as i64) as i32
    }
}

/// Locates PDF417 symbols through their start and stop guard patterns,
/// tolerating rotation up to mild skew and partial occlusion of either
/// pattern.
pub struct Pdf417Finder;

impl Pdf417Finder {
    /// Find symbols in the matrix. With `multiple`, the search continues
    /// below and to the right of each found symbol.
    pub fn find(matrix: &BitMatrix, multiple: bool) -> Vec<SymbolLocation> {
        let mut locations: Vec<SymbolLocation> = Vec::new();
        let mut row = 0i32;
        let mut column = 0i32;
        let mut found_in_row = false;
        while (row as usize) < matrix.height() {
            let vertices = Self::find_vertices(matrix, row, column);

            if vertices[0].is_none() && vertices[3].is_none() {
                if !found_in_row {
                    // nothing anywhere in this band; done
                    break;
                }
                // retry from the left margin, below the lowest found symbol
                found_in_row = false;
                column = 0;
                for location in &locations {
                    if let Some(bottom_left) = location.vertices[1] {
                        row = row.max(bottom_left.y as i32);
                    }
                    if let Some(bottom_right) = location.vertices[3] {
                        row = row.max(bottom_right.y as i32);
                    }
                }
                row += ROW_STEP;
                continue;
            }
            found_in_row = true;
            let location = SymbolLocation { vertices };
            if !multiple {
                locations.push(location);
                break;
            }
            // continue the search after the symbol just found
            let continue_at = location.vertices[2].or(location.vertices[4]);
            locations.push(location);
            match continue_at {
                Some(point) => {
                    column = point.x as i32;
                    row = point.y as i32;
                }
                None => break,
            }
        }
        locations
    }

    fn find_vertices(matrix: &BitMatrix, start_row: i32, start_column: i32) -> [Option<Point>; 8] {
        let mut result: [Option<Point>; 8] = [None; 8];

        let start = Self::find_rows_with_pattern(matrix, start_row, start_column, &START_PATTERN);
        for (i, &target) in INDEXES_START_PATTERN.iter().enumerate() {
            result[target] = start[i];
        }

        let (start_row, start_column) = match result[4] {
            Some(point) => (point.y as i32, point.x as i32),
            None => (start_row, start_column),
        };
        let stop = Self::find_rows_with_pattern(matrix, start_row, start_column, &STOP_PATTERN);
        for (i, &target) in INDEXES_STOP_PATTERN.iter().enumerate() {
            result[target] = stop[i];
        }
        result
    }

    /// Find the first and last row where `pattern` occurs near the given
    /// start position. Returns [top-start, top-end, bottom-start,
    /// bottom-end] points.
    fn find_rows_with_pattern(
        matrix: &BitMatrix,
        mut start_row: i32,
        start_column: i32,
        pattern: &[i32],
    ) -> [Option<Point>; 4] {
        let height = matrix.height() as i32;
        let width = matrix.width() as i32;
        let mut result: [Option<Point>; 4] = [None; 4];

        let mut found = false;
        let mut location = (0i32, 0i32);
        while start_row < height {
            if let Some(loc) = Self::find_guard_pattern(matrix, start_column, start_row, width, pattern) {
                location = loc;
                // walk back up to the first row still showing the pattern
                while start_row > 0 {
                    match Self::find_guard_pattern(matrix, start_column, start_row - 1, width, pattern)
                    {
                        Some(previous) => {
                            location = previous;
                            start_row -= 1;
                        }
                        None => break,
                    }
                }
                result[0] = Some(Point::new(location.0 as f32, start_row as f32));
                result[1] = Some(Point::new(location.1 as f32, start_row as f32));
                found = true;
                break;
            }
            start_row += ROW_STEP;
        }

        let mut stop_row = start_row + 1;
        if found {
            let mut skipped_rows = 0i32;
            let mut previous_location = location;
            while stop_row < height {
                match Self::find_guard_pattern(matrix, previous_location.0, stop_row, width, pattern)
                {
                    // the pattern must not drift too far between rows,
                    // or we start tracking a neighboring symbol
                    Some(loc)
                        if (previous_location.0 - loc.0).abs() < MAX_PATTERN_DRIFT
                            && (previous_location.1 - loc.1).abs() < MAX_PATTERN_DRIFT =>
                    {
                        previous_location = loc;
                        skipped_rows = 0;
                    }
                    _ => {
                        if skipped_rows > SKIPPED_ROW_COUNT_MAX {
                            break;
                        }
                        skipped_rows += 1;
                    }
                }
                stop_row += 1;
            }
            stop_row -= skipped_rows + 1;
            result[2] = Some(Point::new(previous_location.0 as f32, stop_row as f32));
            result[3] = Some(Point::new(previous_location.1 as f32, stop_row as f32));
        }
        if stop_row - start_row < BARCODE_MIN_HEIGHT {
            result = [None; 4];
        }
        result
    }

    /// Match the run-length pattern on one row starting at `column`.
    /// Returns the horizontal start/end of the match.
    fn find_guard_pattern(
        matrix: &BitMatrix,
        column: i32,
        row: i32,
        width: i32,
        pattern: &[i32],
    ) -> Option<(i32, i32)> {
        let mut counters = vec![0i32; pattern.len()];
        let mut pattern_start = column;
        let mut pixel_drift = 0;

        // black pixels left of the start mean the pattern begins earlier
        while matrix.get_i32(pattern_start, row) && pattern_start > 0 && pixel_drift < MAX_PIXEL_DRIFT
        {
            pattern_start -= 1;
            pixel_drift += 1;
        }

        let mut x = pattern_start;
        let mut counter_position = 0usize;
        let mut is_white = false;
        while x < width {
            let pixel = matrix.get_i32(x, row);
            if pixel != is_white {
                counters[counter_position] += 1;
            } else {
                if counter_position == pattern.len() - 1 {
                    if Self::pattern_match_variance(&counters, pattern) < MAX_AVG_VARIANCE {
                        return Some((pattern_start, x));
                    }
                    pattern_start += counters[0] + counters[1];
                    counters.copy_within(2.., 0);
                    let len = counters.len();
                    counters[len - 2] = 0;
                    counters[len - 1] = 0;
                    counter_position -= 1;
                } else {
                    counter_position += 1;
                }
                counters[counter_position] = 1;
                is_white = !is_white;
            }
            x += 1;
        }
        if counter_position == pattern.len() - 1
            && Self::pattern_match_variance(&counters, pattern) < MAX_AVG_VARIANCE
        {
            return Some((pattern_start, x - 1));
        }
        None
    }

    /// Total variance between observed run lengths and the expected
    /// pattern, as a fraction of the observed total. Any single run off by
    /// more than `MAX_INDIVIDUAL_VARIANCE` module widths rejects the match.
    fn pattern_match_variance(counters: &[i32], pattern: &[i32]) -> f32 {
        let total: i32 = counters.iter().sum();
        let pattern_length: i32 = pattern.iter().sum();
        if total < pattern_length {
            // less than one pixel per module can never match reliably
            return f32::INFINITY;
        }
        let unit_bar_width = total as f32 / pattern_length as f32;
        let max_individual_variance = MAX_INDIVIDUAL_VARIANCE * unit_bar_width;

        let mut total_variance = 0.0f32;
        for (&counter, &expected) in counters.iter().zip(pattern) {
            let scaled_pattern = expected as f32 * unit_bar_width;
            let variance = (counter as f32 - scaled_pattern).abs();
            if variance > max_individual_variance {
                return f32::INFINITY;
            }
            total_variance += variance;
        }
        total_variance / total as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Paint a run-length pattern at (x, y), `scale` pixels per module
    fn paint_pattern(matrix: &mut BitMatrix, x: usize, y: usize, pattern: &[i32], scale: usize) {
        let mut column = x;
        for (i, &run) in pattern.iter().enumerate() {
            let is_bar = i % 2 == 0;
            for _ in 0..(run as usize * scale) {
                matrix.set(column, y, is_bar);
                column += 1;
            }
        }
    }

    #[test]
    fn test_guard_pattern_match() {
        let mut matrix = BitMatrix::new(60, 3);
        paint_pattern(&mut matrix, 5, 1, &START_PATTERN, 2);
        // a codeword bar follows the start pattern and bounds its last run
        matrix.fill_rect(39, 1, 4, 1, true);
        let location = Pdf417Finder::find_guard_pattern(&matrix, 0, 1, 60, &START_PATTERN);
        let (start, end) = location.expect("start pattern found");
        assert_eq!(start, 5);
        assert_eq!(end, 39);
    }

    #[test]
    fn test_guard_pattern_rejects_noise() {
        let mut matrix = BitMatrix::new(60, 3);
        // a plain wide bar is not a start pattern
        matrix.fill_rect(5, 1, 40, 1, true);
        assert!(Pdf417Finder::find_guard_pattern(&matrix, 0, 1, 60, &START_PATTERN).is_none());
    }

    #[test]
    fn test_find_start_and_stop_columns() {
        let mut matrix = BitMatrix::new(200, 40);
        for y in 0..40 {
            paint_pattern(&mut matrix, 10, y, &START_PATTERN, 2);
            // codeword content bounding the start pattern's trailing run
            matrix.fill_rect(44, y, 2, 1, true);
            paint_pattern(&mut matrix, 150, y, &STOP_PATTERN, 2);
        }
        let locations = Pdf417Finder::find(&matrix, false);
        assert_eq!(locations.len(), 1);
        let location = &locations[0];
        let top_left = location.top_left().unwrap();
        // codeword area starts right after the 34-pixel start pattern
        assert!((top_left.x - 44.0).abs() <= 1.0);
        let top_right = location.top_right().unwrap();
        assert!((top_right.x - 150.0).abs() <= 1.0);
        assert!(location.min_codeword_width() > 0);
        assert!(location.max_codeword_width() >= location.min_codeword_width());
    }

    #[test]
    fn test_no_symbol_found() {
        let matrix = BitMatrix::new(100, 100);
        assert!(Pdf417Finder::find(&matrix, true).is_empty());
    }
}
