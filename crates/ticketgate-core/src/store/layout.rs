use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::RowColumns;

/// Sheets tops out at column ZZZ.
const MAX_COLUMN_LETTERS: usize = 3;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LayoutError {
    #[error("{field} column must be letters A-ZZZ, got {column:?}")]
    InvalidColumn { field: &'static str, column: String },

    #[error("{field} column {column} lies outside the read range A:{last_column}")]
    OutsideRange {
        field: &'static str,
        column: String,
        last_column: String,
    },

    #[error("status and ticket id cannot share column {0}")]
    SharedColumn(String),

    #[error("{field} column {column} overlaps the registration fields in B:F")]
    OverlapsFormFields { field: &'static str, column: String },

    #[error("first_data_row is 1-based and must be at least 1")]
    InvalidFirstRow,
}

/// Where the participant rows live inside the spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetLayout {
    pub sheet_name: String,
    /// Row 1 holds the form headers.
    pub first_data_row: u32,
    pub last_column: String,
    pub status_column: String,
    pub ticket_id_column: String,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            sheet_name: "Form Responses 1".to_string(),
            first_data_row: 2,
            last_column: "J".to_string(),
            status_column: "I".to_string(),
            ticket_id_column: "J".to_string(),
        }
    }
}

impl SheetLayout {
    /// A1 range covering every participant row, open-ended downwards.
    pub fn read_range(&self) -> String {
        format!(
            "{}!A{}:{}",
            self.quoted_sheet_name(),
            self.first_data_row,
            self.last_column
        )
    }

    /// A1 address of the status cell for one row.
    pub fn status_cell(&self, row: u32) -> String {
        format!("{}!{}{}", self.quoted_sheet_name(), self.status_column, row)
    }

    /// Zero-based position of the status column within a fetched row.
    pub fn status_index(&self) -> Option<usize> {
        Self::column_index(&self.status_column)
    }

    /// Resolve every field position, checking that each lies inside the read range.
    ///
    /// Reads and check-in writes both go through this, so a layout that
    /// passes here reads back the same status cell it writes.
    pub fn row_columns(&self) -> Result<RowColumns, LayoutError> {
        if self.first_data_row == 0 {
            return Err(LayoutError::InvalidFirstRow);
        }
        let last = Self::checked_index("last", &self.last_column)?;
        let within_range = |field: &'static str, column: &str| -> Result<usize, LayoutError> {
            let idx = Self::checked_index(field, column)?;
            if idx > last {
                return Err(LayoutError::OutsideRange {
                    field,
                    column: column.to_string(),
                    last_column: self.last_column.clone(),
                });
            }
            Ok(idx)
        };

        let status = within_range("status", &self.status_column)?;
        let ticket_id = within_range("ticket id", &self.ticket_id_column)?;
        if status == ticket_id {
            return Err(LayoutError::SharedColumn(self.status_column.clone()));
        }

        let columns = RowColumns {
            status,
            ticket_id,
            ..RowColumns::default()
        };
        // Registration form fields keep their fixed B:F positions
        if columns.phone > last {
            return Err(LayoutError::OutsideRange {
                field: "phone",
                column: "F".to_string(),
                last_column: self.last_column.clone(),
            });
        }
        let form_fields = columns.email..=columns.phone;
        for (field, idx, column) in [
            ("status", status, &self.status_column),
            ("ticket id", ticket_id, &self.ticket_id_column),
        ] {
            if form_fields.contains(&idx) {
                return Err(LayoutError::OverlapsFormFields {
                    field,
                    column: column.clone(),
                });
            }
        }
        Ok(columns)
    }

    /// Convert a column letter sequence ("A", "I", "AA") to a zero-based index.
    pub fn column_index(column: &str) -> Option<usize> {
        if !Self::is_valid_column(column) {
            return None;
        }
        let n = column.bytes().try_fold(0usize, |acc, b| {
            acc.checked_mul(26)?.checked_add((b - b'A' + 1) as usize)
        })?;
        Some(n - 1)
    }

    pub fn is_valid_column(column: &str) -> bool {
        !column.is_empty()
            && column.len() <= MAX_COLUMN_LETTERS
            && column.chars().all(|c| c.is_ascii_uppercase())
    }

    /// Sheet name as an A1 prefix. Embedded quotes are doubled.
    fn quoted_sheet_name(&self) -> String {
        format!("'{}'", self.sheet_name.replace('\'', "''"))
    }

    fn checked_index(field: &'static str, column: &str) -> Result<usize, LayoutError> {
        Self::column_index(column).ok_or_else(|| LayoutError::InvalidColumn {
            field,
            column: column.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ranges() {
        let layout = SheetLayout::default();
        assert_eq!(layout.read_range(), "'Form Responses 1'!A2:J");
        assert_eq!(layout.status_cell(17), "'Form Responses 1'!I17");
    }

    #[test]
    fn test_sheet_name_quotes_are_escaped() {
        let layout = SheetLayout {
            sheet_name: "Day 1's Responses".to_string(),
            ..SheetLayout::default()
        };
        assert_eq!(layout.read_range(), "'Day 1''s Responses'!A2:J");
        assert_eq!(layout.status_cell(4), "'Day 1''s Responses'!I4");
    }

    #[test]
    fn test_column_index() {
        assert_eq!(SheetLayout::column_index("A"), Some(0));
        assert_eq!(SheetLayout::column_index("I"), Some(8));
        assert_eq!(SheetLayout::column_index("J"), Some(9));
        assert_eq!(SheetLayout::column_index("AA"), Some(26));
        assert_eq!(SheetLayout::column_index("ZZZ"), Some(18277));
        assert_eq!(SheetLayout::column_index("9"), None);
    }

    #[test]
    fn test_overlong_column_is_rejected() {
        let long = "Z".repeat(64);
        assert!(!SheetLayout::is_valid_column(&long));
        assert_eq!(SheetLayout::column_index(&long), None);
    }

    #[test]
    fn test_is_valid_column() {
        assert!(SheetLayout::is_valid_column("I"));
        assert!(SheetLayout::is_valid_column("AA"));
        assert!(!SheetLayout::is_valid_column(""));
        assert!(!SheetLayout::is_valid_column("i"));
        assert!(!SheetLayout::is_valid_column("I1"));
    }

    #[test]
    fn test_default_row_columns() {
        assert_eq!(SheetLayout::default().row_columns(), Ok(RowColumns::default()));
    }

    #[test]
    fn test_row_columns_follow_configured_columns() {
        let layout = SheetLayout {
            last_column: "L".to_string(),
            status_column: "K".to_string(),
            ticket_id_column: "L".to_string(),
            ..SheetLayout::default()
        };
        let columns = layout.row_columns().unwrap();
        assert_eq!(columns.status, 10);
        assert_eq!(columns.ticket_id, 11);
        assert_eq!(layout.status_index(), Some(columns.status));
    }

    #[test]
    fn test_row_columns_reject_columns_outside_range() {
        let status_beyond = SheetLayout {
            status_column: "K".to_string(),
            ..SheetLayout::default()
        };
        assert!(matches!(
            status_beyond.row_columns(),
            Err(LayoutError::OutsideRange { field: "status", .. })
        ));

        let short_range = SheetLayout {
            last_column: "I".to_string(),
            ..SheetLayout::default()
        };
        assert!(matches!(
            short_range.row_columns(),
            Err(LayoutError::OutsideRange { field: "ticket id", .. })
        ));

        let too_narrow = SheetLayout {
            last_column: "E".to_string(),
            status_column: "A".to_string(),
            ticket_id_column: "E".to_string(),
            ..SheetLayout::default()
        };
        assert!(matches!(
            too_narrow.row_columns(),
            Err(LayoutError::OutsideRange { field: "phone", .. })
        ));
    }

    #[test]
    fn test_row_columns_reject_shared_or_invalid_columns() {
        let shared = SheetLayout {
            status_column: "J".to_string(),
            ..SheetLayout::default()
        };
        assert_eq!(shared.row_columns(), Err(LayoutError::SharedColumn("J".to_string())));

        let lowercase = SheetLayout {
            status_column: "i".to_string(),
            ..SheetLayout::default()
        };
        assert!(matches!(lowercase.row_columns(), Err(LayoutError::InvalidColumn { .. })));

        let over_email = SheetLayout {
            status_column: "B".to_string(),
            ..SheetLayout::default()
        };
        assert!(matches!(
            over_email.row_columns(),
            Err(LayoutError::OverlapsFormFields { field: "status", .. })
        ));

        let zero_row = SheetLayout {
            first_data_row: 0,
            ..SheetLayout::default()
        };
        assert_eq!(zero_row.row_columns(), Err(LayoutError::InvalidFirstRow));
    }
}
