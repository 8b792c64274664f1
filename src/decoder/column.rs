use crate::decoder::bounding_box::BoundingBox;
use crate::decoder::codeword::Codeword;
use crate::decoder::metadata::{BarcodeMetadata, BarcodeValue};

/// How far [`DetectionColumn::codeword_nearby`] searches above and below
const MAX_NEARBY_DISTANCE: i32 = 5;

/// Which side of the symbol a row indicator column sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorSide {
    /// Leftmost column of the symbol
    Left,
    /// Rightmost column of the symbol
    Right,
}

/// One barcode column's detected codewords, stored densely per image row
/// (offset by the bounding box top). Columns 0 and `column_count + 1` carry
/// an [`IndicatorSide`] and the row-indicator specific behavior.
#[derive(Debug, Clone)]
pub struct DetectionColumn {
    bounding_box: BoundingBox,
    codewords: Vec<Option<Codeword>>,
    indicator: Option<IndicatorSide>,
}

impl DetectionColumn {
    /// Create an empty data column spanning the box height
    pub fn new(bounding_box: &BoundingBox) -> Self {
        let rows = (bounding_box.max_y() - bounding_box.min_y() + 1).max(0) as usize;
        Self {
            bounding_box: bounding_box.clone(),
            codewords: vec![None; rows],
            indicator: None,
        }
    }

    /// Create an empty row indicator column
    pub fn new_indicator(bounding_box: &BoundingBox, side: IndicatorSide) -> Self {
        let mut column = Self::new(bounding_box);
        column.indicator = Some(side);
        column
    }

    /// The indicator side, when this is a row indicator column
    pub fn indicator(&self) -> Option<IndicatorSide> {
        self.indicator
    }

    /// The box this column was scanned in
    pub fn bounding_box(&self) -> &BoundingBox {
        &self.bounding_box
    }

    fn index_for_row(&self, image_row: i32) -> Option<usize> {
        let index = image_row - self.bounding_box.min_y();
        if index < 0 || index as usize >= self.codewords.len() {
            return None;
        }
        Some(index as usize)
    }

    /// Codeword detected at an image row, if any
    pub fn codeword(&self, image_row: i32) -> Option<Codeword> {
        self.codewords[self.index_for_row(image_row)?]
    }

    /// Store a codeword for an image row
    pub fn set_codeword(&mut self, image_row: i32, codeword: Codeword) {
        if let Some(index) = self.index_for_row(image_row) {
            self.codewords[index] = Some(codeword);
        }
    }

    /// The codeword closest to `image_row`, searching up to
    /// `MAX_NEARBY_DISTANCE` rows above and below.
    pub fn codeword_nearby(&self, image_row: i32) -> Option<Codeword> {
        if let Some(codeword) = self.codeword(image_row) {
            return Some(codeword);
        }
        let index = self.index_for_row(image_row)? as i32;
        for distance in 1..MAX_NEARBY_DISTANCE {
            let above = index - distance;
            if above >= 0 {
                if let Some(codeword) = self.codewords[above as usize] {
                    return Some(codeword);
                }
            }
            let below = index + distance;
            if (below as usize) < self.codewords.len() {
                if let Some(codeword) = self.codewords[below as usize] {
                    return Some(codeword);
                }
            }
        }
        None
    }

    /// All cells, indexed by image row offset from the box top
    pub fn codewords(&self) -> &[Option<Codeword>] {
        &self.codewords
    }

    /// Mutable view of all cells
    pub fn codewords_mut(&mut self) -> &mut [Option<Codeword>] {
        &mut self.codewords
    }

    // ---- row indicator behavior ----

    /// Compute every codeword's row number directly from its value/bucket
    fn set_row_numbers(&mut self) {
        for codeword in self.codewords.iter_mut().flatten() {
            codeword.set_row_number_as_row_indicator();
        }
    }

    /// Vote the barcode metadata out of this indicator column. Returns
    /// `None` when a field received no votes or the voted values are out of
    /// bounds. Codewords disagreeing with the accepted metadata are
    /// discarded as misreads.
    pub fn barcode_metadata(&mut self) -> Option<BarcodeMetadata> {
        let side = self.indicator?;
        let mut column_count = BarcodeValue::new();
        let mut row_count_upper = BarcodeValue::new();
        let mut row_count_lower = BarcodeValue::new();
        let mut ec_level = BarcodeValue::new();

        self.set_row_numbers();
        for codeword in self.codewords.iter().flatten() {
            let indicator_value = codeword.value() as u32 % 30;
            let mut row_number = codeword.row_number().unwrap_or(0);
            if side == IndicatorSide::Right {
                row_number += 2;
            }
            match row_number % 3 {
                0 => row_count_upper.set_value(indicator_value * 3 + 1),
                1 => {
                    ec_level.set_value(indicator_value / 3);
                    row_count_lower.set_value(indicator_value % 3);
                }
                _ => column_count.set_value(indicator_value + 1),
            }
        }

        let (columns, upper, lower, level) = (
            column_count.get_value(),
            row_count_upper.get_value(),
            row_count_lower.get_value(),
            ec_level.get_value(),
        );
        if columns.is_empty() || upper.is_empty() || lower.is_empty() || level.is_empty() {
            return None;
        }
        let metadata = BarcodeMetadata::new(columns[0], upper[0], lower[0], level[0])?;
        self.remove_incorrect_codewords(&metadata);
        Some(metadata)
    }

    /// Re-derive row numbers, drop codewords contradicting the metadata,
    /// then enforce top-to-bottom monotonicity: a row number that decreases,
    /// exceeds the row count, or jumps further than the local gap justifies
    /// marks a misread and is discarded.
    pub fn adjust_complete_row_numbers(&mut self, metadata: &BarcodeMetadata) {
        let side = match self.indicator {
            Some(side) => side,
            None => return,
        };
        self.set_row_numbers();
        self.remove_incorrect_codewords(metadata);

        let (top, bottom) = self.side_points(side);
        let first_row = (top as i32 - self.bounding_box.min_y()).max(0) as usize;
        let last_row = ((bottom as i32 - self.bounding_box.min_y()).max(0) as usize)
            .min(self.codewords.len());

        let mut barcode_row = -1i32;
        let mut max_row_height = 1i32;
        let mut current_row_height = 0i32;
        for index in first_row..last_row {
            let Some(codeword) = self.codewords[index] else {
                continue;
            };
            let row_number = codeword.row_number().unwrap_or(-1);
            let row_difference = row_number - barcode_row;
            if row_difference == 0 {
                current_row_height += 1;
            } else if row_difference == 1 {
                max_row_height = max_row_height.max(current_row_height);
                current_row_height = 1;
                barcode_row = row_number;
            } else if row_difference < 0
                || row_number >= metadata.row_count() as i32
                || row_difference > index as i32
            {
                self.codewords[index] = None;
            } else {
                let checked_rows = if max_row_height > 2 {
                    (max_row_height - 2) * row_difference
                } else {
                    row_difference
                };
                let mut close_previous_found = checked_rows >= index as i32;
                for i in 1..=checked_rows {
                    if close_previous_found {
                        break;
                    }
                    // a jump of N rows implies roughly N*rowHeight empty
                    // cells above; a nearby occupied cell disproves it
                    close_previous_found = self.codewords[index - i as usize].is_some();
                }
                if close_previous_found {
                    self.codewords[index] = None;
                } else {
                    barcode_row = row_number;
                    current_row_height = 1;
                }
            }
        }
    }

    /// Per-barcode-row codeword tallies, used to spot rows the bounding box
    /// is missing entirely. `None` when the column has no usable metadata.
    pub fn row_heights(&mut self) -> Option<Vec<i32>> {
        let metadata = self.barcode_metadata()?;
        self.adjust_incomplete_row_numbers(&metadata);
        let mut heights = vec![0i32; metadata.row_count() as usize];
        for codeword in self.codewords.iter().flatten() {
            if let Some(row) = codeword.row_number() {
                if row >= 0 && (row as usize) < heights.len() {
                    heights[row as usize] += 1;
                }
            }
        }
        Some(heights)
    }

    /// Lighter monotonicity pass used before row heights are available
    fn adjust_incomplete_row_numbers(&mut self, metadata: &BarcodeMetadata) {
        let side = match self.indicator {
            Some(side) => side,
            None => return,
        };
        let (top, bottom) = self.side_points(side);
        let first_row = (top as i32 - self.bounding_box.min_y()).max(0) as usize;
        let last_row = ((bottom as i32 - self.bounding_box.min_y()).max(0) as usize)
            .min(self.codewords.len());

        let mut barcode_row = -1i32;
        for index in first_row..last_row {
            let Some(mut codeword) = self.codewords[index] else {
                continue;
            };
            codeword.set_row_number_as_row_indicator();
            self.codewords[index] = Some(codeword);
            let row_number = codeword.row_number().unwrap_or(-1);
            let row_difference = row_number - barcode_row;
            if row_difference == 0 || row_difference == 1 {
                barcode_row = barcode_row.max(row_number);
            } else if row_number >= metadata.row_count() as i32 {
                self.codewords[index] = None;
            } else {
                barcode_row = row_number;
            }
        }
    }

    fn side_points(&self, side: IndicatorSide) -> (f32, f32) {
        match side {
            IndicatorSide::Left => (
                self.bounding_box.top_left().y,
                self.bounding_box.bottom_left().y,
            ),
            IndicatorSide::Right => (
                self.bounding_box.top_right().y,
                self.bounding_box.bottom_right().y,
            ),
        }
    }

    fn remove_incorrect_codewords(&mut self, metadata: &BarcodeMetadata) {
        let side = match self.indicator {
            Some(side) => side,
            None => return,
        };
        for cell in &mut self.codewords {
            let Some(codeword) = *cell else {
                continue;
            };
            let indicator_value = codeword.value() as u32 % 30;
            let mut row_number = codeword.row_number().unwrap_or(-1);
            if row_number > metadata.row_count() as i32 {
                *cell = None;
                continue;
            }
            if side == IndicatorSide::Right {
                row_number += 2;
            }
            let keep = match row_number % 3 {
                0 => indicator_value * 3 + 1 == metadata.row_count_upper_part(),
                1 => {
                    indicator_value / 3 == metadata.error_correction_level()
                        && indicator_value % 3 == metadata.row_count_lower_part()
                }
                _ => indicator_value + 1 == metadata.column_count(),
            };
            if !keep {
                *cell = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Point;

    fn test_box() -> BoundingBox {
        BoundingBox::new(
            200,
            60,
            Some(Point::new(10.0, 5.0)),
            Some(Point::new(10.0, 44.0)),
            Some(Point::new(180.0, 5.0)),
            Some(Point::new(180.0, 44.0)),
        )
        .unwrap()
    }

    /// Left indicator codeword carrying the given metadata field for `row`
    fn indicator_codeword(row: i32, columns: u32, rows: u32, ec_level: u32) -> Codeword {
        let indicator_value = match row % 3 {
            0 => (rows - 1) / 3,
            1 => ec_level * 3 + (rows - 1) % 3,
            _ => columns - 1,
        };
        let value = (row as u16 / 3) * 30 + indicator_value as u16;
        let bucket = ((row % 3) * 3) as u8;
        Codeword::new(10, 27, bucket, value)
    }

    #[test]
    fn test_codeword_nearby() {
        let mut column = DetectionColumn::new(&test_box());
        column.set_codeword(20, Codeword::new(0, 17, 0, 50));
        assert_eq!(column.codeword_nearby(20).unwrap().value(), 50);
        assert_eq!(column.codeword_nearby(22).unwrap().value(), 50);
        assert_eq!(column.codeword_nearby(18).unwrap().value(), 50);
        assert!(column.codeword_nearby(30).is_none());
    }

    #[test]
    fn test_out_of_range_rows_ignored() {
        let mut column = DetectionColumn::new(&test_box());
        column.set_codeword(2, Codeword::new(0, 17, 0, 50)); // above the box
        assert!(column.codeword(2).is_none());
        assert!(column.codewords().iter().all(|c| c.is_none()));
    }

    #[test]
    fn test_metadata_voting() {
        let bbox = test_box();
        let mut column = DetectionColumn::new_indicator(&bbox, IndicatorSide::Left);
        // rows 0..=8 of a 12-row, 4-column, level 2 symbol, one pixel row each
        for row in 0..9 {
            column.set_codeword(5 + row, indicator_codeword(row, 4, 12, 2));
        }
        let metadata = column.barcode_metadata().unwrap();
        assert_eq!(metadata.column_count(), 4);
        assert_eq!(metadata.row_count(), 12);
        assert_eq!(metadata.error_correction_level(), 2);
    }

    #[test]
    fn test_metadata_requires_all_fields() {
        let bbox = test_box();
        let mut column = DetectionColumn::new_indicator(&bbox, IndicatorSide::Left);
        // only rows 0 and 3 present: field 1 and 2 never voted
        column.set_codeword(5, indicator_codeword(0, 4, 12, 2));
        column.set_codeword(8, indicator_codeword(3, 4, 12, 2));
        assert!(column.barcode_metadata().is_none());
    }

    #[test]
    fn test_misread_codeword_removed_by_vote() {
        let bbox = test_box();
        let mut column = DetectionColumn::new_indicator(&bbox, IndicatorSide::Left);
        for row in 0..9 {
            column.set_codeword(5 + row, indicator_codeword(row, 4, 12, 2));
        }
        // a second field-2 codeword claiming 7 columns, outvoted 2:1
        let mut misread = indicator_codeword(2, 8, 12, 2);
        misread.set_row_number(2);
        column.set_codeword(14, misread);
        column.set_codeword(15, indicator_codeword(5, 4, 12, 2));

        let metadata = column.barcode_metadata().unwrap();
        assert_eq!(metadata.column_count(), 4);
        // the disagreeing codeword was discarded
        assert!(column.codeword(14).is_none());
        assert!(column.codeword(15).is_some());
    }

    #[test]
    fn test_row_numbers_monotonic_after_adjustment() {
        let bbox = test_box();
        let mut column = DetectionColumn::new_indicator(&bbox, IndicatorSide::Left);
        for row in 0..12 {
            column.set_codeword(5 + 3 * row, indicator_codeword(row, 4, 12, 2));
        }
        let metadata = column.barcode_metadata().unwrap();
        column.adjust_complete_row_numbers(&metadata);
        let mut last = -1;
        for codeword in column.codewords().iter().flatten() {
            let row = codeword.row_number().unwrap();
            assert!(row >= last, "row numbers must not decrease");
            last = row;
        }
    }
}
