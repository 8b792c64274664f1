//! End-to-end decoder tests over synthetic rendered symbols.
//!
//! The helpers build a pixel-accurate symbol (guard patterns, row
//! indicators, data columns) for a known codeword grid, so every stage of
//! the pipeline runs exactly as it would on a scanned image.

use crate::decoder::reed_solomon::rs_encode;
use crate::decoder::scanning_decoder::ScanningDecoder;
use crate::decoder::tables::{self, START_PATTERN, STOP_PATTERN};
use crate::error::DecodeError;
use crate::models::{BitMatrix, Pdf417Barcode, Point};

const QUIET_ZONE: usize = 6;

struct SyntheticSymbol {
    matrix: BitMatrix,
    top_left: Point,
    bottom_left: Point,
    top_right: Point,
    bottom_right: Point,
    codeword_width: i32,
    scale: usize,
    row_height: usize,
    columns: usize,
}

impl SyntheticSymbol {
    fn decode(&self) -> Result<Pdf417Barcode, DecodeError> {
        ScanningDecoder::decode(
            &self.matrix,
            Some(self.top_left),
            Some(self.bottom_left),
            Some(self.top_right),
            Some(self.bottom_right),
            self.codeword_width,
            self.codeword_width,
        )
    }

    fn decode_left_side_only(&self) -> Result<Pdf417Barcode, DecodeError> {
        ScanningDecoder::decode(
            &self.matrix,
            Some(self.top_left),
            Some(self.bottom_left),
            None,
            None,
            self.codeword_width,
            self.codeword_width,
        )
    }

    /// Whiten one data cell, turning it into an erasure
    fn erase_cell(&mut self, row: usize, column: usize) {
        let (x, y, w, h) = self.cell_rect(row, column);
        self.matrix.fill_rect(x, y, w, h, false);
    }

    /// Repaint one data cell with a different codeword of the same cluster
    fn corrupt_cell(&mut self, row: usize, column: usize, value: u16) {
        let (x, y, w, h) = self.cell_rect(row, column);
        self.matrix.fill_rect(x, y, w, h, false);
        let cluster = ((row % 3) * 3) as u8;
        paint_codeword(
            &mut self.matrix,
            x,
            y,
            h,
            tables::pattern_for(cluster, value),
            self.scale,
        );
    }

    fn cell_rect(&self, row: usize, column: usize) -> (usize, usize, usize, usize) {
        debug_assert!(column < self.columns);
        let x = QUIET_ZONE + (17 + 17 + column * 17) * self.scale;
        let y = QUIET_ZONE + row * self.row_height;
        (x, y, 17 * self.scale, self.row_height)
    }
}

fn paint_codeword(
    matrix: &mut BitMatrix,
    x: usize,
    y: usize,
    height: usize,
    pattern: u32,
    scale: usize,
) -> usize {
    let mut column = x;
    for bit in (0..17).rev() {
        let is_bar = (pattern >> bit) & 1 == 1;
        for _ in 0..scale {
            if is_bar {
                matrix.fill_rect(column, y, 1, height, true);
            }
            column += 1;
        }
    }
    column
}

fn paint_runs(
    matrix: &mut BitMatrix,
    x: usize,
    y: usize,
    height: usize,
    runs: &[i32],
    scale: usize,
) -> usize {
    let mut column = x;
    for (i, &run) in runs.iter().enumerate() {
        let width = run as usize * scale;
        if i % 2 == 0 {
            matrix.fill_rect(column, y, width, height, true);
        }
        column += width;
    }
    column
}

fn indicator_value(row: usize, rows: usize, columns: usize, ec_level: u32, right: bool) -> u16 {
    let field_row = if right { row + 2 } else { row };
    let field = match field_row % 3 {
        0 => (rows as u32 - 1) / 3,
        1 => ec_level * 3 + (rows as u32 - 1) % 3,
        _ => columns as u32 - 1,
    };
    ((row as u32 / 3) * 30 + field) as u16
}

/// Render a complete symbol for the given flattened codeword grid
/// (`rows * columns` values, error correction included).
fn render_symbol(
    grid: &[u16],
    rows: usize,
    columns: usize,
    ec_level: u32,
    scale: usize,
    row_height: usize,
) -> SyntheticSymbol {
    render_symbol_with_indicators(grid, rows, columns, columns, ec_level, scale, row_height)
}

/// Like [`render_symbol`] but the right indicator may claim a different
/// column count, to construct metadata disagreement.
fn render_symbol_with_indicators(
    grid: &[u16],
    rows: usize,
    columns: usize,
    right_claimed_columns: usize,
    ec_level: u32,
    scale: usize,
    row_height: usize,
) -> SyntheticSymbol {
    assert_eq!(grid.len(), rows * columns);
    let modules = 17 + 17 + columns * 17 + 17 + 18;
    let width = 2 * QUIET_ZONE + modules * scale;
    let height = 2 * QUIET_ZONE + rows * row_height;
    let mut matrix = BitMatrix::new(width, height);

    for row in 0..rows {
        let y = QUIET_ZONE + row * row_height;
        let cluster = ((row % 3) * 3) as u8;
        let mut x = QUIET_ZONE;
        x = paint_runs(&mut matrix, x, y, row_height, &START_PATTERN, scale);
        let left = indicator_value(row, rows, columns, ec_level, false);
        x = paint_codeword(
            &mut matrix,
            x,
            y,
            row_height,
            tables::pattern_for(cluster, left),
            scale,
        );
        for column in 0..columns {
            x = paint_codeword(
                &mut matrix,
                x,
                y,
                row_height,
                tables::pattern_for(cluster, grid[row * columns + column]),
                scale,
            );
        }
        let right = indicator_value(row, rows, right_claimed_columns, ec_level, true);
        x = paint_codeword(
            &mut matrix,
            x,
            y,
            row_height,
            tables::pattern_for(cluster, right),
            scale,
        );
        paint_runs(&mut matrix, x, y, row_height, &STOP_PATTERN, scale);
    }

    let codeword_area_left = (QUIET_ZONE + 17 * scale) as f32;
    let stop_pattern_left = (QUIET_ZONE + (17 + 17 + columns * 17 + 17) * scale) as f32;
    let y_top = QUIET_ZONE as f32;
    let y_bottom = (QUIET_ZONE + rows * row_height - 1) as f32;
    SyntheticSymbol {
        matrix,
        top_left: Point::new(codeword_area_left, y_top),
        bottom_left: Point::new(codeword_area_left, y_bottom),
        top_right: Point::new(stop_pattern_left, y_top),
        bottom_right: Point::new(stop_pattern_left, y_bottom),
        codeword_width: (17 * scale) as i32,
        scale,
        row_height,
        columns,
    }
}

/// Assemble the flattened grid for a payload: symbol length descriptor,
/// payload codewords, pad codewords, then error correction.
fn build_grid(payload: &[u16], rows: usize, columns: usize, ec_level: u32) -> Vec<u16> {
    let total = rows * columns;
    let num_ec = 1usize << (ec_level + 1);
    let data_length = total - num_ec;
    assert!(payload.len() < data_length, "payload does not fit the grid");
    let mut stream = Vec::with_capacity(data_length);
    stream.push(data_length as u16);
    stream.extend_from_slice(payload);
    stream.resize(data_length, 900); // pad codewords
    let grid = rs_encode(&stream, num_ec);
    assert_eq!(grid.len(), total);
    grid
}

#[test]
fn test_round_trip_text() {
    // "HELLO" in text compaction: (7,4) (11,11) (14,pad)
    let payload = [214u16, 341, 449];
    let grid = build_grid(&payload, 6, 3, 2);
    let symbol = render_symbol(&grid, 6, 3, 2, 2, 4);

    let barcode = symbol.decode().expect("clean symbol decodes");
    assert_eq!(barcode.text, "HELLO");
    assert_eq!(barcode.ec_level, 2);
    assert_eq!(barcode.errors_corrected, 0);
    assert_eq!(barcode.erasures, 0);
}

#[test]
fn test_round_trip_numeric() {
    let payload = [902u16, 1, 624, 434, 632, 282, 200];
    let grid = build_grid(&payload, 6, 3, 2);
    let symbol = render_symbol(&grid, 6, 3, 2, 2, 4);

    let barcode = symbol.decode().expect("numeric symbol decodes");
    assert_eq!(barcode.text, "000213298174000");
}

#[test]
fn test_round_trip_with_single_indicator_side() {
    let payload = [214u16, 341, 449];
    let grid = build_grid(&payload, 6, 3, 2);
    let symbol = render_symbol(&grid, 6, 3, 2, 2, 4);

    let barcode = symbol.decode_left_side_only().expect("left side suffices");
    assert_eq!(barcode.text, "HELLO");
}

#[test]
fn test_erasure_tolerance() {
    let payload = [214u16, 341, 449];
    let grid = build_grid(&payload, 6, 3, 2);
    let mut symbol = render_symbol(&grid, 6, 3, 2, 2, 4);

    // blank out 3 cells; level 2 gives 8 EC codewords, erasure bound 4
    symbol.erase_cell(1, 1);
    symbol.erase_cell(3, 0);
    symbol.erase_cell(4, 2);

    let barcode = symbol.decode().expect("erasures within EC capacity");
    assert_eq!(barcode.text, "HELLO");
    assert!(barcode.erasures >= 3);
}

#[test]
fn test_error_correction_fixes_misread() {
    let payload = [214u16, 341, 449];
    let grid = build_grid(&payload, 6, 3, 2);
    let mut symbol = render_symbol(&grid, 6, 3, 2, 2, 4);

    // repaint one cell as a different valid codeword of the same cluster
    let wrong = if grid[4] == 500 { 501 } else { 500 };
    symbol.corrupt_cell(1, 1, wrong);

    let barcode = symbol.decode().expect("single error is correctable");
    assert_eq!(barcode.text, "HELLO");
    assert!(barcode.errors_corrected >= 1);
}

#[test]
fn test_metadata_disagreement_is_not_found() {
    let payload = [214u16, 341, 449];
    let grid = build_grid(&payload, 6, 3, 2);
    // right indicator claims 4 columns while the symbol has 3
    let symbol = render_symbol_with_indicators(&grid, 6, 3, 4, 2, 2, 4);

    assert_eq!(symbol.decode(), Err(DecodeError::NotFound));
}

#[test]
fn test_larger_symbol_round_trip() {
    // 12 rows x 4 columns, level 3 (16 EC codewords, 32 data codewords)
    let payload: Vec<u16> = vec![900, 45, 63, 341, 26];
    let grid = build_grid(&payload, 12, 4, 3);
    let symbol = render_symbol(&grid, 12, 4, 3, 2, 4);

    let barcode = symbol.decode().expect("larger symbol decodes");
    assert!(!barcode.text.is_empty());
    assert_eq!(barcode.ec_level, 3);
    assert_eq!(barcode.errors_corrected, 0);
}

#[test]
fn test_all_white_region_is_not_found() {
    let matrix = BitMatrix::new(120, 60);
    let result = ScanningDecoder::decode(
        &matrix,
        Some(Point::new(10.0, 5.0)),
        Some(Point::new(10.0, 50.0)),
        Some(Point::new(110.0, 5.0)),
        Some(Point::new(110.0, 50.0)),
        34,
        34,
    );
    assert_eq!(result, Err(DecodeError::NotFound));
}
