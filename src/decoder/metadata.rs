use crate::decoder::tables::{MAX_ROWS_IN_BARCODE, MIN_ROWS_IN_BARCODE};

/// Vote multiset used for grid cells and for row-indicator metadata fields.
///
/// Tie-break rule: [`get_value`](Self::get_value) returns every candidate
/// with the maximal vote count, sorted ascending, so callers that take the
/// first entry always pick the lowest value. This keeps edge-case decodes
/// reproducible.
#[derive(Debug, Default, Clone)]
pub struct BarcodeValue {
    votes: Vec<(u32, u32)>, // (candidate value, occurrence count)
}

impl BarcodeValue {
    /// Create an empty vote set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one occurrence of `value`
    pub fn set_value(&mut self, value: u32) {
        // bounded domain, a linear scan beats hashing here
        for entry in &mut self.votes {
            if entry.0 == value {
                entry.1 += 1;
                return;
            }
        }
        self.votes.push((value, 1));
    }

    /// All candidates with the maximal vote count, ascending.
    /// Empty when no votes were cast.
    pub fn get_value(&self) -> Vec<u32> {
        let max = self.votes.iter().map(|&(_, n)| n).max().unwrap_or(0);
        let mut result: Vec<u32> = self
            .votes
            .iter()
            .filter(|&&(_, n)| n == max)
            .map(|&(v, _)| v)
            .collect();
        result.sort_unstable();
        result
    }

    /// Vote count of `value`, for diagnostics
    pub fn confidence(&self, value: u32) -> u32 {
        self.votes
            .iter()
            .find(|&&(v, _)| v == value)
            .map(|&(_, n)| n)
            .unwrap_or(0)
    }
}

/// Barcode-wide metadata recovered from a row indicator column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarcodeMetadata {
    column_count: u32,
    row_count_upper_part: u32,
    row_count_lower_part: u32,
    error_correction_level: u32,
}

impl BarcodeMetadata {
    /// Build metadata from the four voted fields, applying the validity
    /// bounds: at least one data column and a total row count in [3, 90].
    pub fn new(
        column_count: u32,
        row_count_upper_part: u32,
        row_count_lower_part: u32,
        error_correction_level: u32,
    ) -> Option<Self> {
        let row_count = row_count_upper_part + row_count_lower_part;
        if column_count < 1
            || row_count < MIN_ROWS_IN_BARCODE
            || row_count > MAX_ROWS_IN_BARCODE
        {
            return None;
        }
        Some(Self {
            column_count,
            row_count_upper_part,
            row_count_lower_part,
            error_correction_level,
        })
    }

    /// Number of data columns (indicator columns excluded)
    pub fn column_count(&self) -> u32 {
        self.column_count
    }

    /// Total number of rows
    pub fn row_count(&self) -> u32 {
        self.row_count_upper_part + self.row_count_lower_part
    }

    /// Upper field of the row count encoding
    pub fn row_count_upper_part(&self) -> u32 {
        self.row_count_upper_part
    }

    /// Lower field of the row count encoding
    pub fn row_count_lower_part(&self) -> u32 {
        self.row_count_lower_part
    }

    /// Error correction level (0..=8)
    pub fn error_correction_level(&self) -> u32 {
        self.error_correction_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_majority_vote() {
        let mut value = BarcodeValue::new();
        value.set_value(7);
        value.set_value(3);
        value.set_value(7);
        assert_eq!(value.get_value(), vec![7]);
        assert_eq!(value.confidence(7), 2);
        assert_eq!(value.confidence(3), 1);
        assert_eq!(value.confidence(99), 0);
    }

    #[test]
    fn test_tie_returns_all_candidates_ascending() {
        let mut value = BarcodeValue::new();
        value.set_value(9);
        value.set_value(2);
        assert_eq!(value.get_value(), vec![2, 9]);
    }

    #[test]
    fn test_empty_vote() {
        let value = BarcodeValue::new();
        assert!(value.get_value().is_empty());
    }

    #[test]
    fn test_metadata_bounds() {
        assert!(BarcodeMetadata::new(1, 3, 0, 2).is_some());
        assert!(BarcodeMetadata::new(0, 3, 0, 2).is_none()); // no columns
        assert!(BarcodeMetadata::new(4, 1, 1, 2).is_none()); // 2 rows
        assert!(BarcodeMetadata::new(4, 90, 1, 2).is_none()); // 91 rows
        let m = BarcodeMetadata::new(5, 27, 1, 4).unwrap();
        assert_eq!(m.row_count(), 28);
        assert_eq!(m.column_count(), 5);
        assert_eq!(m.error_correction_level(), 4);
    }
}
