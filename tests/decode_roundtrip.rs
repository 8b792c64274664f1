//! Integration tests for the full PDF417 pipeline
//!
//! Synthetic symbols are rendered pixel by pixel (guard patterns, row
//! indicators, data columns, error correction) and pushed through the
//! public image entry points, so detection, scanning, row resolution,
//! GF(929) correction and bitstream decoding are all exercised together.

use rust_pdf417::decoder::tables::{self, START_PATTERN, STOP_PATTERN};
use rust_pdf417::{BitMatrix, decode, decode_bit_matrix, decode_region, Point, Reader};

const QUIET_ZONE: usize = 8;

/// GF(929) arithmetic and systematic RS encoding, enough to build valid
/// symbols for the decoder to chew on.
mod gf929 {
    const MODULUS: i32 = 929;

    fn exp_table() -> [i32; 929] {
        let mut table = [0i32; 929];
        let mut x = 1i32;
        for value in table.iter_mut() {
            *value = x;
            x = x * 3 % MODULUS;
        }
        table
    }

    fn add(a: i32, b: i32) -> i32 {
        (a + b) % MODULUS
    }

    fn sub(a: i32, b: i32) -> i32 {
        (MODULUS + a - b) % MODULUS
    }

    fn mul(a: i32, b: i32) -> i32 {
        a * b % MODULUS
    }

    /// Append `num_ec` error correction codewords so the codeword
    /// polynomial vanishes at 3^1 .. 3^num_ec.
    pub fn rs_encode(data: &[u16], num_ec: usize) -> Vec<u16> {
        let exp = exp_table();
        let mut generator = vec![1i32];
        for i in 1..=num_ec {
            let root = exp[i];
            let mut next = vec![0i32; generator.len() + 1];
            for (j, &c) in generator.iter().enumerate() {
                next[j] = add(next[j], c);
                next[j + 1] = add(next[j + 1], mul(c, sub(0, root)));
            }
            generator = next;
        }

        let mut remainder = vec![0i32; num_ec];
        for &d in data {
            let factor = add(d as i32, remainder[0]);
            remainder.rotate_left(1);
            remainder[num_ec - 1] = 0;
            for (j, r) in remainder.iter_mut().enumerate() {
                *r = sub(*r, mul(factor, generator[j + 1]));
            }
        }

        let mut codewords = data.to_vec();
        codewords.extend(remainder.iter().map(|&r| sub(0, r) as u16));
        codewords
    }
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

fn paint_codeword(matrix: &mut BitMatrix, x: usize, y: usize, h: usize, pattern: u32, scale: usize) -> usize {
    let mut column = x;
    for bit in (0..17).rev() {
        if (pattern >> bit) & 1 == 1 {
            matrix.fill_rect(column, y, scale, h, true);
        }
        column += scale;
    }
    column
}

fn paint_runs(matrix: &mut BitMatrix, x: usize, y: usize, h: usize, runs: &[i32], scale: usize) -> usize {
    let mut column = x;
    for (i, &run) in runs.iter().enumerate() {
        let width = run as usize * scale;
        if i % 2 == 0 {
            matrix.fill_rect(column, y, width, h, true);
        }
        column += width;
    }
    column
}

/// Render a complete symbol for a payload: start/stop patterns, indicator
/// columns, data grid with padding and error correction.
fn render_symbol(
    payload: &[u16],
    rows: usize,
    columns: usize,
    ec_level: u32,
    scale: usize,
    row_height: usize,
) -> BitMatrix {
    let total = rows * columns;
    let num_ec = 1usize << (ec_level + 1);
    let data_length = total - num_ec;
    assert!(payload.len() < data_length);
    let mut stream = Vec::with_capacity(data_length);
    stream.push(data_length as u16);
    stream.extend_from_slice(payload);
    stream.resize(data_length, 900);
    let grid = gf929::rs_encode(&stream, num_ec);

    let modules = 17 + 17 + columns * 17 + 17 + 18;
    let width = 2 * QUIET_ZONE + modules * scale;
    let height = 2 * QUIET_ZONE + rows * row_height;
    let mut matrix = BitMatrix::new(width, height);
    for row in 0..rows {
        let y = QUIET_ZONE + row * row_height;
        let cluster = ((row % 3) * 3) as u8;
        let mut x = QUIET_ZONE;
        x = paint_runs(&mut matrix, x, y, row_height, &START_PATTERN, scale);
        x = paint_codeword(
            &mut matrix,
            x,
            y,
            row_height,
            tables::pattern_for(cluster, indicator_value(row, rows, columns, ec_level, false)),
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
        x = paint_codeword(
            &mut matrix,
            x,
            y,
            row_height,
            tables::pattern_for(cluster, indicator_value(row, rows, columns, ec_level, true)),
            scale,
        );
        paint_runs(&mut matrix, x, y, row_height, &STOP_PATTERN, scale);
    }
    matrix
}

fn matrix_to_rgb(matrix: &BitMatrix) -> Vec<u8> {
    let rendered = image::RgbImage::from_fn(matrix.width() as u32, matrix.height() as u32, |x, y| {
        if matrix.get(x as usize, y as usize) {
            image::Rgb([20, 20, 20])
        } else {
            image::Rgb([235, 235, 235])
        }
    });
    rendered.into_raw()
}

#[test]
fn test_full_pipeline_text_symbol() {
    // "HELLO" in text compaction pairs
    let matrix = render_symbol(&[214, 341, 449], 6, 3, 2, 2, 4);
    let barcodes = decode_bit_matrix(&matrix);
    assert_eq!(barcodes.len(), 1, "expected exactly one symbol");
    assert_eq!(barcodes[0].text, "HELLO");
    assert_eq!(barcodes[0].ec_level, 2);
    assert_eq!(barcodes[0].errors_corrected, 0);
    assert_eq!(barcodes[0].erasures, 0);
}

#[test]
fn test_full_pipeline_from_rgb() {
    let matrix = render_symbol(&[214, 341, 449], 6, 3, 2, 2, 4);
    let rgb = matrix_to_rgb(&matrix);
    let barcodes = decode(&rgb, matrix.width(), matrix.height());
    assert_eq!(barcodes.len(), 1);
    assert_eq!(barcodes[0].text, "HELLO");
}

#[test]
fn test_full_pipeline_numeric_symbol() {
    let matrix = render_symbol(&[902, 1, 624, 434, 632, 282, 200], 6, 3, 2, 2, 4);
    let barcodes = decode_bit_matrix(&matrix);
    assert_eq!(barcodes.len(), 1);
    assert_eq!(barcodes[0].text, "000213298174000");
}

#[test]
fn test_full_pipeline_macro_symbol() {
    // segment 0 of file "017053"; the control block sits at the end of the
    // data region, after the pad codewords
    let mut payload = vec![214u16, 341, 449];
    payload.resize(13, 900);
    payload.extend_from_slice(&[928, 111, 100, 17, 53]);
    let matrix = render_symbol(&payload, 9, 3, 2, 2, 4);
    let barcodes = decode_bit_matrix(&matrix);
    assert_eq!(barcodes.len(), 1);
    assert_eq!(barcodes[0].text, "HELLO");
    let metadata = barcodes[0].macro_metadata.as_ref().expect("macro metadata");
    assert_eq!(metadata.segment_index, 0);
    assert_eq!(metadata.file_id, "017053");
}

#[test]
fn test_decode_region_with_explicit_corners() {
    let matrix = render_symbol(&[214, 341, 449], 6, 3, 2, 2, 4);
    let scale = 2usize;
    let codeword_width = (17 * scale) as i32;
    let left = (QUIET_ZONE + 17 * scale) as f32;
    let right = (QUIET_ZONE + (17 + 17 + 3 * 17 + 17) * scale) as f32;
    let top = QUIET_ZONE as f32;
    let bottom = (QUIET_ZONE + 6 * 4 - 1) as f32;

    let barcode = decode_region(
        &matrix,
        Some(Point::new(left, top)),
        Some(Point::new(left, bottom)),
        Some(Point::new(right, top)),
        Some(Point::new(right, bottom)),
        codeword_width,
        codeword_width,
    )
    .expect("explicit corners decode");
    assert_eq!(barcode.text, "HELLO");
}

#[test]
fn test_reader_single_symbol() {
    let matrix = render_symbol(&[214, 341, 449], 6, 3, 2, 2, 4);
    let rgb = matrix_to_rgb(&matrix);
    let reader = Reader::single();
    let barcode = reader
        .decode_single(&rgb, matrix.width(), matrix.height())
        .expect("single symbol found");
    assert_eq!(barcode.text, "HELLO");
    assert_eq!(barcode.bytes(), b"HELLO");
}

#[test]
fn test_blank_image_finds_nothing() {
    let image = vec![250u8; 200 * 100 * 3];
    assert!(decode(&image, 200, 100).is_empty());
}
