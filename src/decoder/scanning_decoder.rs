use crate::decoder::bitstream::BitstreamDecoder;
use crate::decoder::bounding_box::BoundingBox;
use crate::decoder::codeword::Codeword;
use crate::decoder::codeword_decoder::CodewordDecoder;
use crate::decoder::column::{DetectionColumn, IndicatorSide};
use crate::decoder::config;
use crate::decoder::detection_result::DetectionResult;
use crate::decoder::metadata::BarcodeValue;
use crate::decoder::reed_solomon::ErrorCorrection;
use crate::decoder::tables::{BARS_IN_MODULE, MAX_CODEWORDS_IN_BARCODE};
use crate::error::DecodeError;
use crate::models::{BitMatrix, Pdf417Barcode, Point};

/// Pixels of slack allowed when validating codeword widths and when
/// snapping a start column to a bar edge; covers mild skew.
const CODEWORD_SKEW_SIZE: i32 = 2;

/// Extra correctable errors allowed beyond the erasure-only bound
const MAX_ERRORS: usize = 3;
/// Upper bound on the error correction codeword count
const MAX_EC_CODEWORDS: usize = 512;

/// Top-level scanning decoder: builds the bounding box, scans the row
/// indicator columns for metadata, scans the interior columns, resolves row
/// numbers, assembles the codeword grid and hands it to error correction
/// and the bitstream decoder.
pub struct ScanningDecoder;

impl ScanningDecoder {
    /// Decode the symbol inside the region described by up to four corner
    /// points (image coordinates of the codeword area; at least one
    /// complete vertical edge pair is required) and an initial codeword
    /// width envelope in pixels.
    pub fn decode(
        image: &BitMatrix,
        image_top_left: Option<Point>,
        image_bottom_left: Option<Point>,
        image_top_right: Option<Point>,
        image_bottom_right: Option<Point>,
        mut min_codeword_width: i32,
        mut max_codeword_width: i32,
    ) -> Result<Pdf417Barcode, DecodeError> {
        let mut bounding_box = BoundingBox::new(
            image.width(),
            image.height(),
            image_top_left,
            image_bottom_left,
            image_top_right,
            image_bottom_right,
        )?;

        let mut left_column: Option<DetectionColumn> = None;
        let mut right_column: Option<DetectionColumn> = None;
        let mut detection_result: Option<DetectionResult> = None;
        for attempt in 0..2 {
            if let Some(top_left) = image_top_left {
                left_column = Some(Self::row_indicator_column(
                    image,
                    &bounding_box,
                    top_left,
                    IndicatorSide::Left,
                    min_codeword_width,
                    max_codeword_width,
                )?);
            }
            if let Some(top_right) = image_top_right {
                right_column = Some(Self::row_indicator_column(
                    image,
                    &bounding_box,
                    top_right,
                    IndicatorSide::Right,
                    min_codeword_width,
                    max_codeword_width,
                )?);
            }
            let Some(mut result) = Self::merge(left_column.as_mut(), right_column.as_mut())?
            else {
                return Err(DecodeError::NotFound);
            };

            // the indicator columns can reveal rows outside the initial
            // box; regrow it once and rescan (the one sanctioned retry)
            let result_box = result.bounding_box().clone();
            if attempt == 0
                && (result_box.min_y() < bounding_box.min_y()
                    || result_box.max_y() > bounding_box.max_y())
            {
                bounding_box = result_box;
            } else {
                result.set_bounding_box(bounding_box.clone());
                detection_result = Some(result);
                break;
            }
        }
        let mut detection_result = detection_result.ok_or(DecodeError::NotFound)?;

        #[cfg(debug_assertions)]
        eprintln!(
            "PDF417: metadata {} columns x {} rows, ec level {}",
            detection_result.barcode_column_count(),
            detection_result.barcode_row_count(),
            detection_result.barcode_ec_level()
        );

        let max_barcode_column = detection_result.barcode_column_count() + 1;
        detection_result.set_column(0, left_column.take());
        detection_result.set_column(max_barcode_column, right_column.take());

        let left_to_right = image_top_left.is_some();
        for barcode_column_count in 1..=max_barcode_column {
            let barcode_column = if left_to_right {
                barcode_column_count
            } else {
                max_barcode_column - barcode_column_count
            };
            if detection_result.column(barcode_column).is_some() {
                // the opposite indicator column was already decoded
                continue;
            }
            let mut column = if barcode_column == 0 {
                DetectionColumn::new_indicator(&bounding_box, IndicatorSide::Left)
            } else if barcode_column == max_barcode_column {
                DetectionColumn::new_indicator(&bounding_box, IndicatorSide::Right)
            } else {
                DetectionColumn::new(&bounding_box)
            };

            let mut previous_start_column = -1i32;
            for image_row in bounding_box.min_y()..=bounding_box.max_y() {
                let mut start_column = Self::start_column(
                    &detection_result,
                    barcode_column,
                    image_row,
                    left_to_right,
                );
                if start_column < 0 || start_column > bounding_box.max_x() {
                    if previous_start_column == -1 {
                        continue;
                    }
                    start_column = previous_start_column;
                }
                if let Some(codeword) = Self::detect_codeword(
                    image,
                    bounding_box.min_x(),
                    bounding_box.max_x(),
                    left_to_right,
                    start_column,
                    image_row,
                    min_codeword_width,
                    max_codeword_width,
                )? {
                    min_codeword_width = min_codeword_width.min(codeword.width());
                    max_codeword_width = max_codeword_width.max(codeword.width());
                    column.set_codeword(image_row, codeword);
                    previous_start_column = start_column;
                }
            }
            detection_result.set_column(barcode_column, Some(column));
        }

        Self::create_decoder_result(&mut detection_result)
    }

    /// Merge the metadata votes of both indicator columns into a detection
    /// result shell. `Ok(None)` when neither column yields metadata.
    fn merge(
        left_column: Option<&mut DetectionColumn>,
        right_column: Option<&mut DetectionColumn>,
    ) -> Result<Option<DetectionResult>, DecodeError> {
        let mut left = left_column;
        let mut right = right_column;
        let left_metadata = left.as_deref_mut().and_then(|c| c.barcode_metadata());
        let right_metadata = right.as_deref_mut().and_then(|c| c.barcode_metadata());

        let metadata = match (left_metadata, right_metadata) {
            (Some(left_meta), Some(right_meta)) => {
                // the sides must agree; silently picking one would decode
                // against the wrong grid shape
                if left_meta != right_meta {
                    return Ok(None);
                }
                left_meta
            }
            (Some(metadata), None) | (None, Some(metadata)) => metadata,
            (None, None) => return Ok(None),
        };

        let left_box = Self::adjust_bounding_box(left)?;
        let right_box = Self::adjust_bounding_box(right)?;
        let bounding_box = BoundingBox::merge(left_box.as_ref(), right_box.as_ref())?;
        Ok(Some(DetectionResult::new(metadata, bounding_box)))
    }

    /// Grow an indicator column's box by the rows its row tally says are
    /// missing above and below.
    fn adjust_bounding_box(
        column: Option<&mut DetectionColumn>,
    ) -> Result<Option<BoundingBox>, DecodeError> {
        let Some(column) = column else {
            return Ok(None);
        };
        let Some(row_heights) = column.row_heights() else {
            return Ok(None);
        };
        let max_row_height = row_heights.iter().copied().max().unwrap_or(1);

        let mut missing_start_rows = 0i32;
        for &height in &row_heights {
            missing_start_rows += max_row_height - height;
            if height > 0 {
                break;
            }
        }
        let codewords = column.codewords();
        let mut row = 0usize;
        while missing_start_rows > 0 && row < codewords.len() && codewords[row].is_none() {
            missing_start_rows -= 1;
            row += 1;
        }

        let mut missing_end_rows = 0i32;
        for &height in row_heights.iter().rev() {
            missing_end_rows += max_row_height - height;
            if height > 0 {
                break;
            }
        }
        let mut row = codewords.len();
        while missing_end_rows > 0 && row > 0 && codewords[row - 1].is_none() {
            missing_end_rows -= 1;
            row -= 1;
        }

        let is_left = column.indicator() == Some(IndicatorSide::Left);
        Ok(Some(column.bounding_box().add_missing_rows(
            missing_start_rows,
            missing_end_rows,
            is_left,
        )?))
    }

    /// Scan one row indicator column: walk down then up from the corner
    /// point, following each found codeword's edge to the next row.
    fn row_indicator_column(
        image: &BitMatrix,
        bounding_box: &BoundingBox,
        start_point: Point,
        side: IndicatorSide,
        min_codeword_width: i32,
        max_codeword_width: i32,
    ) -> Result<DetectionColumn, DecodeError> {
        let mut column = DetectionColumn::new_indicator(bounding_box, side);
        let left_to_right = side == IndicatorSide::Left;
        for pass in 0..2 {
            let increment: i32 = if pass == 0 { 1 } else { -1 };
            let mut start_column = start_point.x as i32;
            let mut image_row = start_point.y as i32;
            while image_row <= bounding_box.max_y() && image_row >= bounding_box.min_y() {
                if let Some(codeword) = Self::detect_codeword(
                    image,
                    0,
                    image.width() as i32,
                    left_to_right,
                    start_column,
                    image_row,
                    min_codeword_width,
                    max_codeword_width,
                )? {
                    start_column = if left_to_right {
                        codeword.start_x()
                    } else {
                        codeword.end_x()
                    };
                    column.set_codeword(image_row, codeword);
                }
                image_row += increment;
            }
        }
        Ok(column)
    }

    /// Infer where a codeword should start on this row, preferring direct
    /// neighbors, then nearby rows, then extrapolation over empty columns.
    fn start_column(
        detection_result: &DetectionResult,
        barcode_column: usize,
        image_row: i32,
        left_to_right: bool,
    ) -> i32 {
        let offset: i32 = if left_to_right { 1 } else { -1 };
        let max_column = detection_result.barcode_column_count() as i32 + 1;
        let valid = |column: i32| column >= 0 && column <= max_column;

        let preceding = barcode_column as i32 - offset;
        if valid(preceding) {
            if let Some(codeword) = detection_result
                .column(preceding as usize)
                .and_then(|column| column.codeword(image_row))
            {
                return if left_to_right {
                    codeword.end_x()
                } else {
                    codeword.start_x()
                };
            }
        }
        if let Some(codeword) = detection_result
            .column(barcode_column)
            .and_then(|column| column.codeword_nearby(image_row))
        {
            return if left_to_right {
                codeword.start_x()
            } else {
                codeword.end_x()
            };
        }
        if valid(preceding) {
            if let Some(codeword) = detection_result
                .column(preceding as usize)
                .and_then(|column| column.codeword_nearby(image_row))
            {
                return if left_to_right {
                    codeword.end_x()
                } else {
                    codeword.start_x()
                };
            }
        }

        let mut skipped_columns = 0i32;
        let mut column_index = barcode_column as i32 - offset;
        while valid(column_index) {
            if let Some(column) = detection_result.column(column_index as usize) {
                if let Some(codeword) = column.codewords().iter().flatten().next() {
                    let edge = if left_to_right {
                        codeword.end_x()
                    } else {
                        codeword.start_x()
                    };
                    return edge + offset * skipped_columns * codeword.width();
                }
            }
            column_index -= offset;
            skipped_columns += 1;
        }
        if left_to_right {
            detection_result.bounding_box().min_x()
        } else {
            detection_result.bounding_box().max_x()
        }
    }

    /// Measure and decode one codeword on `image_row` starting near
    /// `start_column`.
    fn detect_codeword(
        image: &BitMatrix,
        min_column: i32,
        max_column: i32,
        left_to_right: bool,
        start_column: i32,
        image_row: i32,
        min_codeword_width: i32,
        max_codeword_width: i32,
    ) -> Result<Option<Codeword>, DecodeError> {
        let start_column = Self::adjust_codeword_start_column(
            image,
            min_column,
            max_column,
            left_to_right,
            start_column,
            image_row,
        );
        let Some(mut module_bit_count) = Self::module_bit_count(
            image,
            min_column,
            max_column,
            left_to_right,
            start_column,
            image_row,
        ) else {
            return Ok(None);
        };

        let codeword_bit_count: i32 = module_bit_count.iter().sum();
        let (start_column, end_column) = if left_to_right {
            (start_column, start_column + codeword_bit_count)
        } else {
            module_bit_count.reverse();
            (start_column - codeword_bit_count, start_column)
        };

        // the envelope is derived from the whole symbol, so it is loose for
        // any single position; the skew slack absorbs that
        if !Self::check_codeword_skew(codeword_bit_count, min_codeword_width, max_codeword_width) {
            return Ok(None);
        }

        match CodewordDecoder::decode(&module_bit_count)? {
            Some((value, bucket)) => Ok(Some(Codeword::new(
                start_column,
                end_column,
                bucket,
                value,
            ))),
            None => Ok(None),
        }
    }

    /// Measure 8 alternating run lengths from `start_column`; `None` when
    /// the image edge cuts the codeword short.
    fn module_bit_count(
        image: &BitMatrix,
        min_column: i32,
        max_column: i32,
        left_to_right: bool,
        start_column: i32,
        image_row: i32,
    ) -> Option<[i32; BARS_IN_MODULE]> {
        let mut image_column = start_column;
        let mut module_bit_count = [0i32; BARS_IN_MODULE];
        let mut module_number = 0usize;
        let increment: i32 = if left_to_right { 1 } else { -1 };
        let mut previous_pixel_value = left_to_right;
        while (if left_to_right {
            image_column < max_column
        } else {
            image_column >= min_column
        }) && module_number < BARS_IN_MODULE
        {
            if image.get_i32(image_column, image_row) == previous_pixel_value {
                module_bit_count[module_number] += 1;
                image_column += increment;
            } else {
                module_number += 1;
                previous_pixel_value = !previous_pixel_value;
            }
        }
        if module_number == BARS_IN_MODULE
            || (image_column == (if left_to_right { max_column } else { min_column })
                && module_number == BARS_IN_MODULE - 1)
        {
            return Some(module_bit_count);
        }
        None
    }

    /// Snap the start column to the bar/space edge, tolerating up to
    /// `CODEWORD_SKEW_SIZE` pixels of drift in either direction.
    fn adjust_codeword_start_column(
        image: &BitMatrix,
        min_column: i32,
        max_column: i32,
        left_to_right: bool,
        codeword_start_column: i32,
        image_row: i32,
    ) -> i32 {
        let mut corrected_start_column = codeword_start_column;
        let mut increment: i32 = if left_to_right { -1 } else { 1 };
        let mut leading = left_to_right;
        // there should be no black pixels before the start column; if there
        // are, the codeword begins earlier
        for _ in 0..2 {
            while (if leading {
                corrected_start_column >= min_column
            } else {
                corrected_start_column < max_column
            }) && leading == image.get_i32(corrected_start_column, image_row)
            {
                if (codeword_start_column - corrected_start_column).abs() > CODEWORD_SKEW_SIZE {
                    return codeword_start_column;
                }
                corrected_start_column += increment;
            }
            increment = -increment;
            leading = !leading;
        }
        corrected_start_column
    }

    fn check_codeword_skew(
        codeword_size: i32,
        min_codeword_width: i32,
        max_codeword_width: i32,
    ) -> bool {
        min_codeword_width - CODEWORD_SKEW_SIZE <= codeword_size
            && codeword_size <= max_codeword_width + CODEWORD_SKEW_SIZE
    }

    /// Resolve rows, assemble the voted grid and decode it.
    fn create_decoder_result(
        detection_result: &mut DetectionResult,
    ) -> Result<Pdf417Barcode, DecodeError> {
        let mut barcode_matrix = Self::create_barcode_matrix(detection_result)?;
        Self::adjust_codeword_count(detection_result, &mut barcode_matrix)?;

        let row_count = detection_result.barcode_row_count();
        let column_count = detection_result.barcode_column_count();
        let stride = column_count + 2;

        let mut erasures: Vec<usize> = Vec::new();
        let mut codewords = vec![0u16; row_count * column_count];
        let mut ambiguous_indexes: Vec<usize> = Vec::new();
        let mut ambiguous_values: Vec<Vec<u32>> = Vec::new();
        for row in 0..row_count {
            for column in 0..column_count {
                let values = barcode_matrix[row * stride + column + 1].get_value();
                let codeword_index = row * column_count + column;
                if values.is_empty() {
                    erasures.push(codeword_index);
                } else if values.len() == 1 {
                    codewords[codeword_index] = values[0] as u16;
                } else {
                    ambiguous_indexes.push(codeword_index);
                    ambiguous_values.push(values);
                }
            }
        }

        Self::decode_with_ambiguous_values(
            detection_result.barcode_ec_level(),
            codewords,
            erasures,
            ambiguous_indexes,
            ambiguous_values,
        )
    }

    /// Detection does not always yield a single most likely value per cell.
    /// Erasing ambiguous cells would waste correction capacity, so the
    /// combinations are tried against the corrector instead, bounded by the
    /// configured retry cap. Only very hard to read symbols ever take more
    /// than the first try.
    fn decode_with_ambiguous_values(
        ec_level: u32,
        mut codewords: Vec<u16>,
        erasures: Vec<usize>,
        ambiguous_indexes: Vec<usize>,
        ambiguous_values: Vec<Vec<u32>>,
    ) -> Result<Pdf417Barcode, DecodeError> {
        let mut ambiguous_counts = vec![0usize; ambiguous_indexes.len()];
        let mut tries = config::max_ambiguous_tries();
        while tries > 0 {
            tries -= 1;
            for (i, &index) in ambiguous_indexes.iter().enumerate() {
                codewords[index] = ambiguous_values[i][ambiguous_counts[i]] as u16;
            }
            let mut attempt = codewords.clone();
            match Self::decode_codewords(&mut attempt, ec_level, &erasures) {
                Ok(barcode) => return Ok(barcode),
                Err(DecodeError::ChecksumFailure) => {}
                Err(other) => return Err(other),
            }
            if ambiguous_counts.is_empty() {
                return Err(DecodeError::ChecksumFailure);
            }
            let mut i = 0;
            loop {
                if ambiguous_counts[i] < ambiguous_values[i].len() - 1 {
                    ambiguous_counts[i] += 1;
                    break;
                }
                ambiguous_counts[i] = 0;
                i += 1;
                if i == ambiguous_counts.len() {
                    return Err(DecodeError::ChecksumFailure);
                }
            }
        }
        Err(DecodeError::ChecksumFailure)
    }

    /// Vote every resolved codeword into its grid cell
    fn create_barcode_matrix(
        detection_result: &mut DetectionResult,
    ) -> Result<Vec<BarcodeValue>, DecodeError> {
        detection_result.resolve_row_numbers()?;

        let row_count = detection_result.barcode_row_count();
        let stride = detection_result.barcode_column_count() + 2;
        let mut barcode_matrix = vec![BarcodeValue::new(); row_count * stride];
        for (column_index, column) in detection_result.columns().iter().enumerate() {
            let Some(column) = column else {
                continue;
            };
            for codeword in column.codewords().iter().flatten() {
                let Some(row_number) = codeword.row_number() else {
                    continue;
                };
                if row_number < 0 || row_number as usize >= row_count {
                    // more rows than the metadata allows for; ignore them
                    continue;
                }
                barcode_matrix[row_number as usize * stride + column_index]
                    .set_value(codeword.value() as u32);
            }
        }
        Ok(barcode_matrix)
    }

    /// The declared codeword count (cell [0,1]) is cross-checked against
    /// the count derived from the grid shape; the derived count rests on
    /// more redundant evidence and wins a disagreement.
    fn adjust_codeword_count(
        detection_result: &DetectionResult,
        barcode_matrix: &mut [BarcodeValue],
    ) -> Result<(), DecodeError> {
        let declared = barcode_matrix[1].get_value();
        let calculated = (detection_result.barcode_column_count()
            * detection_result.barcode_row_count()) as i64
            - Self::ec_codeword_count(detection_result.barcode_ec_level()) as i64;
        if declared.is_empty() {
            if calculated < 1 || calculated > MAX_CODEWORDS_IN_BARCODE as i64 {
                return Err(DecodeError::NotFound);
            }
            barcode_matrix[1] = BarcodeValue::new();
            barcode_matrix[1].set_value(calculated as u32);
        } else if declared[0] as i64 != calculated
            && calculated >= 1
            && calculated <= MAX_CODEWORDS_IN_BARCODE as i64
        {
            barcode_matrix[1] = BarcodeValue::new();
            barcode_matrix[1].set_value(calculated as u32);
        }
        Ok(())
    }

    fn ec_codeword_count(ec_level: u32) -> usize {
        1 << (ec_level + 1)
    }

    /// Correct the flattened codeword stream and decode its payload
    fn decode_codewords(
        codewords: &mut [u16],
        ec_level: u32,
        erasures: &[usize],
    ) -> Result<Pdf417Barcode, DecodeError> {
        if codewords.is_empty() {
            return Err(DecodeError::InvalidFormat);
        }
        let num_ec_codewords = Self::ec_codeword_count(ec_level);
        let errors_corrected = Self::correct_errors(codewords, erasures, num_ec_codewords)?;
        Self::verify_codeword_count(codewords, num_ec_codewords)?;

        let (text, macro_metadata) = BitstreamDecoder::decode(codewords)?;
        Ok(Pdf417Barcode {
            text,
            ec_level: ec_level as u8,
            errors_corrected,
            erasures: erasures.len(),
            macro_metadata,
        })
    }

    fn correct_errors(
        codewords: &mut [u16],
        erasures: &[usize],
        num_ec_codewords: usize,
    ) -> Result<usize, DecodeError> {
        if erasures.len() > num_ec_codewords / 2 + MAX_ERRORS
            || num_ec_codewords > MAX_EC_CODEWORDS
        {
            // too many erasures, or the EC field itself is corrupted
            return Err(DecodeError::ChecksumFailure);
        }
        ErrorCorrection::decode(codewords, num_ec_codewords, erasures)
    }

    /// The symbol length descriptor must make sense for the array; a zero
    /// descriptor is reconstructed from the array size when possible.
    fn verify_codeword_count(
        codewords: &mut [u16],
        num_ec_codewords: usize,
    ) -> Result<(), DecodeError> {
        if codewords.len() < 4 {
            // count, at least one data codeword, two error correction
            return Err(DecodeError::InvalidFormat);
        }
        let number_of_codewords = codewords[0] as usize;
        if number_of_codewords > codewords.len() {
            return Err(DecodeError::InvalidFormat);
        }
        if number_of_codewords == 0 {
            if num_ec_codewords < codewords.len() {
                codewords[0] = (codewords.len() - num_ec_codewords) as u16;
            } else {
                return Err(DecodeError::InvalidFormat);
            }
        }
        Ok(())
    }
}
