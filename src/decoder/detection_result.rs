use crate::decoder::bounding_box::BoundingBox;
use crate::decoder::codeword::Codeword;
use crate::decoder::column::DetectionColumn;
use crate::decoder::config;
use crate::decoder::metadata::BarcodeMetadata;
use crate::error::DecodeError;

/// How many consecutive codewords with unusable row numbers stop an
/// indicator-driven propagation sweep into the interior columns.
const ADJUST_ROW_NUMBER_SKIP: i32 = 2;

/// All detected columns of one symbol plus the voted metadata; resolves the
/// row number of every interior codeword by fixpoint propagation.
///
/// Row evidence is sparse and asymmetric: the indicator columns are
/// authoritative but sit at the edges, while interior codewords must borrow
/// from whichever neighbor resolved first. A single pass cannot guarantee
/// convergence when noise removes codewords non-uniformly, so passes repeat
/// while they still make progress.
#[derive(Debug)]
pub struct DetectionResult {
    metadata: BarcodeMetadata,
    bounding_box: BoundingBox,
    columns: Vec<Option<DetectionColumn>>,
}

impl DetectionResult {
    /// Create a result shell for `metadata.column_count()` data columns
    /// plus the two indicator columns.
    pub fn new(metadata: BarcodeMetadata, bounding_box: BoundingBox) -> Self {
        let columns = vec![None; metadata.column_count() as usize + 2];
        Self {
            metadata,
            bounding_box,
            columns,
        }
    }

    /// Number of data columns
    pub fn barcode_column_count(&self) -> usize {
        self.metadata.column_count() as usize
    }

    /// Number of barcode rows
    pub fn barcode_row_count(&self) -> usize {
        self.metadata.row_count() as usize
    }

    /// Error correction level of the symbol
    pub fn barcode_ec_level(&self) -> u32 {
        self.metadata.error_correction_level()
    }

    /// The box the columns were scanned in
    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bounding_box
    }

    /// Replace the bounding box (after regrowth)
    pub fn set_bounding_box(&mut self, bounding_box: BoundingBox) {
        self.bounding_box = bounding_box;
    }

    /// Install a scanned column; index 0 and `column_count + 1` are the
    /// indicator columns.
    pub fn set_column(&mut self, barcode_column: usize, column: Option<DetectionColumn>) {
        self.columns[barcode_column] = column;
    }

    /// Access a column by barcode column index
    pub fn column(&self, barcode_column: usize) -> Option<&DetectionColumn> {
        self.columns.get(barcode_column).and_then(|c| c.as_ref())
    }

    /// All columns, indicator columns included
    pub fn columns(&self) -> &[Option<DetectionColumn>] {
        &self.columns
    }

    /// Resolve row numbers across all columns.
    ///
    /// Passes repeat while the number of unresolved codewords strictly
    /// decreases; whatever is left unresolved afterwards becomes erasures
    /// during grid assembly. The explicit round cap turns a pathological
    /// non-converging input into a loud failure instead of a hang.
    pub fn resolve_row_numbers(&mut self) -> Result<(), DecodeError> {
        let metadata = self.metadata;
        let last = self.barcode_column_count() + 1;
        for index in [0, last] {
            if let Some(column) = self.columns[index].as_mut() {
                column.adjust_complete_row_numbers(&metadata);
            }
        }

        let cap = config::max_resolution_rounds();
        let mut previous_unadjusted = usize::MAX;
        for round in 0.. {
            if round >= cap {
                return Err(DecodeError::InvariantViolation(
                    "row number resolution did not converge",
                ));
            }
            let unadjusted = self.adjust_row_numbers();
            if unadjusted == 0 || unadjusted >= previous_unadjusted {
                break;
            }
            previous_unadjusted = unadjusted;
        }
        Ok(())
    }

    /// One resolution round. Returns an indicator of how many codewords
    /// still lack a valid row number (codewords may be counted more than
    /// once; only the trend matters).
    fn adjust_row_numbers(&mut self) -> usize {
        let unadjusted = self.adjust_row_numbers_by_row();
        if unadjusted == 0 {
            return 0;
        }
        for barcode_column in 1..=self.barcode_column_count() {
            let rows = match &self.columns[barcode_column] {
                Some(column) => column.codewords().len(),
                None => continue,
            };
            for row_index in 0..rows {
                let needs_adjustment = matches!(
                    self.columns[barcode_column].as_ref().unwrap().codewords()[row_index],
                    Some(codeword) if !codeword.has_valid_row_number()
                );
                if needs_adjustment {
                    self.adjust_from_neighbors(barcode_column, row_index);
                }
            }
        }
        unadjusted
    }

    fn adjust_row_numbers_by_row(&mut self) -> usize {
        self.adjust_row_numbers_from_both_indicators();
        self.adjust_row_numbers_from_indicator(true) + self.adjust_row_numbers_from_indicator(false)
    }

    /// Rows confirmed by both indicator columns are propagated across all
    /// interior columns; codewords whose bucket contradicts the confirmed
    /// row are discarded outright.
    fn adjust_row_numbers_from_both_indicators(&mut self) {
        let last = self.barcode_column_count() + 1;
        let (Some(left), Some(right)) = (&self.columns[0], &self.columns[last]) else {
            return;
        };
        let confirmed: Vec<Option<i32>> = left
            .codewords()
            .iter()
            .zip(right.codewords())
            .map(|(l, r)| match (l, r) {
                (Some(l), Some(r)) if l.row_number().is_some() && l.row_number() == r.row_number() => {
                    l.row_number()
                }
                _ => None,
            })
            .collect();

        for barcode_column in 1..=self.barcode_column_count() {
            let Some(column) = self.columns[barcode_column].as_mut() else {
                continue;
            };
            for (row_index, confirmed_row) in confirmed.iter().enumerate() {
                let Some(row_number) = confirmed_row else {
                    continue;
                };
                let cells = column.codewords_mut();
                if row_index >= cells.len() {
                    break;
                }
                if let Some(codeword) = &mut cells[row_index] {
                    codeword.set_row_number(*row_number);
                    if !codeword.has_valid_row_number() {
                        cells[row_index] = None;
                    }
                }
            }
        }
    }

    /// Sweep one indicator column's row numbers into the interior, stopping
    /// a sweep after `ADJUST_ROW_NUMBER_SKIP` codewords reject the row.
    fn adjust_row_numbers_from_indicator(&mut self, left: bool) -> usize {
        let indicator_index = if left {
            0
        } else {
            self.barcode_column_count() + 1
        };
        let Some(indicator) = &self.columns[indicator_index] else {
            return 0;
        };
        let indicator_rows: Vec<Option<i32>> = indicator
            .codewords()
            .iter()
            .map(|cell| cell.and_then(|c| c.row_number()))
            .collect();

        let column_count = self.barcode_column_count();
        let mut unadjusted = 0usize;
        for (row_index, indicator_row) in indicator_rows.iter().enumerate() {
            let Some(indicator_row) = *indicator_row else {
                continue;
            };
            let mut invalid_row_counts = 0i32;
            let columns: Vec<usize> = if left {
                (1..=column_count).collect()
            } else {
                (1..=column_count).rev().collect()
            };
            for barcode_column in columns {
                if invalid_row_counts >= ADJUST_ROW_NUMBER_SKIP {
                    break;
                }
                let Some(column) = self.columns[barcode_column].as_mut() else {
                    continue;
                };
                let cells = column.codewords_mut();
                if row_index >= cells.len() {
                    continue;
                }
                if let Some(codeword) = &mut cells[row_index] {
                    if !codeword.has_valid_row_number() {
                        if codeword.is_valid_row_number(indicator_row) {
                            codeword.set_row_number(indicator_row);
                            invalid_row_counts = 0;
                        } else {
                            invalid_row_counts += 1;
                        }
                        if !codeword.has_valid_row_number() {
                            unadjusted += 1;
                        }
                    }
                }
            }
        }
        unadjusted
    }

    /// Adopt the row number of the first nearby codeword that already has a
    /// valid row *and* shares the bucket (buckets encode `row mod 3`, so a
    /// mismatch proves the neighbor is not a true vertical neighbor).
    fn adjust_from_neighbors(&mut self, barcode_column: usize, row_index: usize) {
        let codeword = match self.columns[barcode_column]
            .as_ref()
            .and_then(|c| c.codewords().get(row_index).copied().flatten())
        {
            Some(codeword) => codeword,
            None => return,
        };

        let previous = self.columns[barcode_column - 1].as_ref();
        let next = self
            .columns
            .get(barcode_column + 1)
            .and_then(|c| c.as_ref())
            .or(previous);
        let same = self.columns[barcode_column].as_ref();

        let cell = |column: Option<&DetectionColumn>, offset: i32| -> Option<Codeword> {
            let column = column?;
            let index = row_index as i32 + offset;
            if index < 0 {
                return None;
            }
            column.codewords().get(index as usize).copied().flatten()
        };

        // examined in order of decreasing evidence quality: vertical
        // neighbors first, then the adjacent columns, then two rows out
        let neighbors = [
            cell(same, -1),
            cell(same, 1),
            cell(previous, 0),
            cell(next, 0),
            cell(previous, -1),
            cell(next, -1),
            cell(previous, 1),
            cell(next, 1),
            cell(same, -2),
            cell(same, 2),
            cell(previous, -2),
            cell(next, -2),
            cell(previous, 2),
            cell(next, 2),
        ];

        let adopted = neighbors.iter().flatten().find_map(|other| {
            if other.has_valid_row_number() && other.bucket() == codeword.bucket() {
                other.row_number()
            } else {
                None
            }
        });

        if let Some(row_number) = adopted {
            if let Some(column) = self.columns[barcode_column].as_mut() {
                if let Some(Some(codeword)) = column.codewords_mut().get_mut(row_index) {
                    codeword.set_row_number(row_number);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::column::IndicatorSide;
    use crate::models::Point;

    fn test_box(height: usize) -> BoundingBox {
        BoundingBox::new(
            300,
            height,
            Some(Point::new(10.0, 0.0)),
            Some(Point::new(10.0, height as f32 - 1.0)),
            Some(Point::new(280.0, 0.0)),
            Some(Point::new(280.0, height as f32 - 1.0)),
        )
        .unwrap()
    }

    fn indicator_codeword(row: i32, side: IndicatorSide, metadata: &BarcodeMetadata) -> Codeword {
        let field_row = match side {
            IndicatorSide::Left => row,
            IndicatorSide::Right => row + 2,
        };
        let indicator_value = match field_row % 3 {
            0 => metadata.row_count_upper_part().saturating_sub(1) / 3,
            1 => metadata.error_correction_level() * 3 + metadata.row_count_lower_part(),
            _ => metadata.column_count() - 1,
        };
        let value = (row as u16 / 3) * 30 + indicator_value as u16;
        let bucket = ((row % 3) * 3) as u8;
        Codeword::new(0, 17, bucket, value)
    }

    /// Build a 1-pixel-per-row detection result with full indicator columns
    /// and interior codewords of unknown row number.
    fn build_result(metadata: BarcodeMetadata) -> DetectionResult {
        let rows = metadata.row_count() as usize;
        let bbox = test_box(rows);
        let mut result = DetectionResult::new(metadata, bbox.clone());

        for (index, side) in [
            (0usize, IndicatorSide::Left),
            (metadata.column_count() as usize + 1, IndicatorSide::Right),
        ] {
            let mut column = DetectionColumn::new_indicator(&bbox, side);
            for row in 0..rows as i32 {
                column.set_codeword(row, indicator_codeword(row, side, &metadata));
            }
            result.set_column(index, Some(column));
        }
        for barcode_column in 1..=metadata.column_count() as usize {
            let mut column = DetectionColumn::new(&bbox);
            for row in 0..rows as i32 {
                let bucket = ((row % 3) * 3) as u8;
                column.set_codeword(row, Codeword::new(0, 17, bucket, 100 + row as u16));
            }
            result.set_column(barcode_column, Some(column));
        }
        result
    }

    #[test]
    fn test_interior_rows_resolved_from_indicators() {
        let metadata = BarcodeMetadata::new(3, 7, 2, 2).unwrap();
        let mut result = build_result(metadata);
        result.resolve_row_numbers().unwrap();

        for barcode_column in 1..=3 {
            let column = result.column(barcode_column).unwrap();
            for (index, cell) in column.codewords().iter().enumerate() {
                let codeword = cell.expect("codeword survived resolution");
                assert_eq!(codeword.row_number(), Some(index as i32));
                assert!(codeword.has_valid_row_number());
            }
        }
    }

    #[test]
    fn test_bucket_invariant_after_resolution() {
        let metadata = BarcodeMetadata::new(4, 10, 2, 3).unwrap();
        let mut result = build_result(metadata);
        result.resolve_row_numbers().unwrap();

        for barcode_column in 0..=metadata.column_count() as usize + 1 {
            let column = result.column(barcode_column).unwrap();
            for codeword in column.codewords().iter().flatten() {
                if let Some(row) = codeword.row_number() {
                    assert_eq!(codeword.bucket() as i32, (row % 3) * 3);
                }
            }
        }
    }

    #[test]
    fn test_resolution_with_single_indicator() {
        let metadata = BarcodeMetadata::new(2, 7, 2, 2).unwrap();
        let mut result = build_result(metadata);
        let last = metadata.column_count() as usize + 1;
        result.set_column(last, None); // right indicator never found
        result.resolve_row_numbers().unwrap();

        let column = result.column(1).unwrap();
        let resolved = column
            .codewords()
            .iter()
            .flatten()
            .filter(|c| c.has_valid_row_number())
            .count();
        assert_eq!(resolved, metadata.row_count() as usize);
    }

    #[test]
    fn test_unresolvable_codewords_become_erasures() {
        let metadata = BarcodeMetadata::new(3, 7, 2, 2).unwrap();
        let mut result = build_result(metadata);
        // poison one interior codeword with a bucket no row can justify
        let rows = metadata.row_count() as usize;
        {
            let bbox = test_box(rows);
            let mut column = DetectionColumn::new(&bbox);
            for row in 0..rows as i32 {
                // bucket shifted by 3: always contradicts the true row
                let bucket = (((row + 1) % 3) * 3) as u8;
                column.set_codeword(row, Codeword::new(0, 17, bucket, 200));
            }
            result.set_column(2, Some(column));
        }
        // must terminate (fixpoint stalls, no panic) and leave the poisoned
        // column unresolved rather than mislabeled
        result.resolve_row_numbers().unwrap();
        let poisoned = result.columns()[2].as_ref().unwrap();
        for codeword in poisoned.codewords().iter().flatten() {
            if let Some(row) = codeword.row_number() {
                // anything that did get a row must satisfy the bucket rule
                assert_eq!(codeword.bucket() as i32, (row % 3) * 3);
            }
        }
    }
}
