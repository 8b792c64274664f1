use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rust_pdf417::decoder::tables::{self, START_PATTERN, STOP_PATTERN};
use rust_pdf417::{BitMatrix, decode, decode_bit_matrix};

const QUIET_ZONE: usize = 8;

fn rs_encode(data: &[u16], num_ec: usize) -> Vec<u16> {
    const MODULUS: i32 = 929;
    let mut exp = [0i32; 929];
    let mut x = 1i32;
    for value in exp.iter_mut() {
        *value = x;
        x = x * 3 % MODULUS;
    }
    let mut generator = vec![1i32];
    for i in 1..=num_ec {
        let root = exp[i];
        let mut next = vec![0i32; generator.len() + 1];
        for (j, &c) in generator.iter().enumerate() {
            next[j] = (next[j] + c) % MODULUS;
            next[j + 1] = (next[j + 1] + c * ((MODULUS - root) % MODULUS)) % MODULUS;
        }
        generator = next;
    }
    let mut remainder = vec![0i32; num_ec];
    for &d in data {
        let factor = (d as i32 + remainder[0]) % MODULUS;
        remainder.rotate_left(1);
        remainder[num_ec - 1] = 0;
        for (j, r) in remainder.iter_mut().enumerate() {
            *r = (MODULUS + *r - factor * generator[j + 1] % MODULUS) % MODULUS;
        }
    }
    let mut codewords = data.to_vec();
    codewords.extend(remainder.iter().map(|&r| ((MODULUS - r) % MODULUS) as u16));
    codewords
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

fn render_symbol(payload: &[u16], rows: usize, columns: usize, ec_level: u32, scale: usize, row_height: usize) -> BitMatrix {
    let total = rows * columns;
    let num_ec = 1usize << (ec_level + 1);
    let data_length = total - num_ec;
    let mut stream = Vec::with_capacity(data_length);
    stream.push(data_length as u16);
    stream.extend_from_slice(payload);
    stream.resize(data_length, 900);
    let grid = rs_encode(&stream, num_ec);

    let modules = 17 + 17 + columns * 17 + 17 + 18;
    let mut matrix = BitMatrix::new(
        2 * QUIET_ZONE + modules * scale,
        2 * QUIET_ZONE + rows * row_height,
    );
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
    let mut rgb = Vec::with_capacity(matrix.width() * matrix.height() * 3);
    for y in 0..matrix.height() {
        for x in 0..matrix.width() {
            let value = if matrix.get(x, y) { 20 } else { 235 };
            rgb.extend_from_slice(&[value, value, value]);
        }
    }
    rgb
}

fn bench_decode_bit_matrix(c: &mut Criterion) {
    let matrix = render_symbol(&[214, 341, 449], 6, 3, 2, 2, 4);
    c.bench_function("decode_small_symbol", |b| {
        b.iter(|| decode_bit_matrix(black_box(&matrix)))
    });
}

fn bench_decode_large_symbol(c: &mut Criterion) {
    let payload: Vec<u16> = (0..40).map(|i| 30 * (i % 26) + 26).collect();
    let matrix = render_symbol(&payload, 18, 5, 4, 2, 4);
    c.bench_function("decode_18x5_symbol", |b| {
        b.iter(|| decode_bit_matrix(black_box(&matrix)))
    });
}

fn bench_decode_rgb_pipeline(c: &mut Criterion) {
    let matrix = render_symbol(&[214, 341, 449], 6, 3, 2, 2, 4);
    let rgb = matrix_to_rgb(&matrix);
    let (width, height) = (matrix.width(), matrix.height());
    c.bench_function("decode_rgb_pipeline", |b| {
        b.iter(|| decode(black_box(&rgb), black_box(width), black_box(height)))
    });
}

criterion_group!(
    benches,
    bench_decode_bit_matrix,
    bench_decode_large_symbol,
    bench_decode_rgb_pipeline
);
criterion_main!(benches);
