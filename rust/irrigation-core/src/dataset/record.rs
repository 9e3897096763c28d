// rust/irrigation-core/src/dataset/record.rs

use crate::error::{IrrigationError, Result};

/// One row of the data file: a date cell followed by numeric cells.
///
/// Cells are kept as text until a numeric value is asked for, so that
/// rows skipped while repositioning are never parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    line: u64,
    cells: Vec<String>,
}

impl RawRecord {
    pub fn new(line: u64, cells: Vec<String>) -> Self {
        Self { line, cells }
    }

    /// Converts a CSV row read at `line`. Cells that are not valid UTF-8
    /// are decoded lossily and then fail to parse as numbers.
    pub fn from_byte_record(line: u64, row: &csv::ByteRecord) -> Self {
        let cells = row
            .iter()
            .map(|cell| String::from_utf8_lossy(cell).into_owned())
            .collect();
        Self { line, cells }
    }

    /// 1-based line number of this row in the source file, header included.
    pub fn line(&self) -> u64 {
        self.line
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The leading date/identifier cell.
    pub fn date(&self) -> Option<&str> {
        self.cells.first().map(String::as_str)
    }

    pub fn cell(&self, index: usize) -> Option<&str> {
        self.cells.get(index).map(String::as_str)
    }

    /// Parses the cell at `index` (0-based, date cell included) as a number.
    ///
    /// Errors report the column 1-based, the way a spreadsheet shows it.
    pub fn numeric(&self, index: usize) -> Result<f32> {
        let cell = self
            .cells
            .get(index)
            .ok_or_else(|| IrrigationError::row_width(self.line, index + 1, self.cells.len()))?;

        cell.parse::<f32>()
            .map_err(|_| IrrigationError::parse(self.line, index + 1, cell.as_str()))
    }

    /// Fails with `RowWidth` unless the row has exactly `expected` cells.
    pub fn check_width(&self, expected: usize) -> Result<()> {
        if self.cells.len() == expected {
            Ok(())
        } else {
            Err(IrrigationError::row_width(self.line, expected, self.cells.len()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(line: u64, cells: &[&str]) -> RawRecord {
        RawRecord::new(line, cells.iter().map(|c| c.to_string()).collect())
    }

    #[test]
    fn test_from_byte_record() {
        let row = csv::ByteRecord::from(vec!["Jun 1, 2017", "0.31", "12.5", "0"]);
        let record = RawRecord::from_byte_record(2, &row);
        assert_eq!(record.len(), 4);
        assert_eq!(record.date(), Some("Jun 1, 2017"));
        assert_eq!(record.cell(1), Some("0.31"));
        assert_eq!(record.numeric(2).unwrap(), 12.5);
        assert_eq!(record.line(), 2);
    }

    #[test]
    fn test_invalid_utf8_cell_fails_to_parse() {
        let row = csv::ByteRecord::from(vec![&b"d"[..], &b"\xff1"[..]]);
        let record = RawRecord::from_byte_record(4, &row);
        assert!(matches!(
            record.numeric(1),
            Err(IrrigationError::Parse { line: 4, column: 2, .. })
        ));
    }

    #[test]
    fn test_numeric_reports_one_based_column() {
        let record = record(7, &["2017-06-01", "dry", "3"]);
        match record.numeric(1) {
            Err(IrrigationError::Parse { line, column, value }) => {
                assert_eq!(line, 7);
                assert_eq!(column, 2);
                assert_eq!(value, "dry");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_numeric_out_of_range_is_width_error() {
        let record = record(3, &["2017-06-01", "1"]);
        assert!(matches!(
            record.numeric(4),
            Err(IrrigationError::RowWidth { line: 3, .. })
        ));
    }

    #[test]
    fn test_check_width() {
        let record = record(5, &["d", "1", "2", "3"]);
        assert!(record.check_width(4).is_ok());
        assert!(matches!(
            record.check_width(8),
            Err(IrrigationError::RowWidth { expected: 8, found: 4, .. })
        ));
    }
}
