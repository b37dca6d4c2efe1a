use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Placeholder shown when the name cell is blank.
const UNKNOWN_NAME: &str = "Unknown";

/// Check-in state of a ticket as recorded in the status column.
///
/// Only `"Ticket Sent"` and `"Checked In"` carry meaning. Anything else,
/// including an empty cell, is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketStatus {
    TicketSent,
    CheckedIn,
    Other(String),
}

impl TicketStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TicketStatus::TicketSent => "Ticket Sent",
            TicketStatus::CheckedIn => "Checked In",
            TicketStatus::Other(raw) => raw,
        }
    }

    pub fn is_checked_in(&self) -> bool {
        matches!(self, TicketStatus::CheckedIn)
    }
}

impl From<&str> for TicketStatus {
    fn from(raw: &str) -> Self {
        match raw {
            "Ticket Sent" => TicketStatus::TicketSent,
            "Checked In" => TicketStatus::CheckedIn,
            other => TicketStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TicketStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TicketStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(TicketStatus::from(raw.as_str()))
    }
}

/// Zero-based positions of each field within a fetched sheet row (A = 0).
///
/// Built from the sheet layout, so reads use the same status column that
/// check-ins write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowColumns {
    pub email: usize,
    pub rrn: usize,
    pub name: usize,
    pub degree_and_branch: usize,
    pub phone: usize,
    pub status: usize,
    pub ticket_id: usize,
}

impl Default for RowColumns {
    fn default() -> Self {
        Self {
            email: 1,
            rrn: 2,
            name: 3,
            degree_and_branch: 4,
            phone: 5,
            status: 8,
            ticket_id: 9,
        }
    }
}

/// A registered participant, built from one sheet row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRecord {
    pub ticket_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub rrn: String,
    pub degree_and_branch: String,
    pub status: TicketStatus,
    /// 1-based sheet row, used to address the status cell on check-in.
    pub source_row: u32,
}

impl ParticipantRecord {
    /// Build a record from a raw row. Returns `None` when the ticket cell is blank.
    ///
    /// The store omits trailing empty cells, so short rows are expected.
    pub fn from_row(row: &[String], source_row: u32, columns: &RowColumns) -> Option<Self> {
        let cell = |idx: usize| row.get(idx).map(|s| s.trim()).unwrap_or("");

        let ticket_id = cell(columns.ticket_id);
        if ticket_id.is_empty() {
            return None;
        }

        let name = match cell(columns.name) {
            "" => UNKNOWN_NAME,
            name => name,
        };

        Some(Self {
            ticket_id: ticket_id.to_string(),
            name: name.to_string(),
            email: cell(columns.email).to_string(),
            phone: cell(columns.phone).to_string(),
            rrn: cell(columns.rrn).to_string(),
            degree_and_branch: cell(columns.degree_and_branch).to_string(),
            status: TicketStatus::from(cell(columns.status)),
            source_row,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_row_full() {
        let r = row(&[
            "2024-01-01 10:00",
            "ada@example.com",
            "RRN42",
            "Ada Lovelace",
            "BSc CS",
            "555-0100",
            "",
            "",
            "Ticket Sent",
            "ABC123",
        ]);
        let record = ParticipantRecord::from_row(&r, 2, &RowColumns::default()).unwrap();
        assert_eq!(record.ticket_id, "ABC123");
        assert_eq!(record.name, "Ada Lovelace");
        assert_eq!(record.email, "ada@example.com");
        assert_eq!(record.rrn, "RRN42");
        assert_eq!(record.degree_and_branch, "BSc CS");
        assert_eq!(record.phone, "555-0100");
        assert_eq!(record.status, TicketStatus::TicketSent);
        assert_eq!(record.source_row, 2);
    }

    #[test]
    fn test_from_row_blank_ticket_is_skipped() {
        let r = row(&["ts", "a@b.c", "", "Name", "", "", "", "", "Ticket Sent", "  "]);
        assert!(ParticipantRecord::from_row(&r, 5, &RowColumns::default()).is_none());
        assert!(ParticipantRecord::from_row(&row(&["ts", "a@b.c"]), 6, &RowColumns::default()).is_none());
    }

    #[test]
    fn test_from_row_missing_name_uses_placeholder() {
        let r = row(&["", "", "", "", "", "", "", "", "", "T1"]);
        let record = ParticipantRecord::from_row(&r, 3, &RowColumns::default()).unwrap();
        assert_eq!(record.name, "Unknown");
        assert_eq!(record.email, "");
        assert_eq!(record.status, TicketStatus::Other(String::new()));
    }

    #[test]
    fn test_from_row_uses_given_columns() {
        let columns = RowColumns {
            status: 7,
            ticket_id: 0,
            ..RowColumns::default()
        };
        let r = row(&["T9", "b@example.com", "", "Bea", "", "", "", "Checked In"]);
        let record = ParticipantRecord::from_row(&r, 4, &columns).unwrap();
        assert_eq!(record.ticket_id, "T9");
        assert_eq!(record.name, "Bea");
        assert_eq!(record.status, TicketStatus::CheckedIn);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(TicketStatus::from("Ticket Sent"), TicketStatus::TicketSent);
        assert_eq!(TicketStatus::from("Checked In"), TicketStatus::CheckedIn);
        assert_eq!(
            TicketStatus::from("Pending Payment"),
            TicketStatus::Other("Pending Payment".to_string())
        );
        // Matching is exact; the sheet is the source of truth for spelling
        assert!(matches!(TicketStatus::from("checked in"), TicketStatus::Other(_)));
    }

    #[test]
    fn test_status_serializes_as_sheet_string() {
        let json = serde_json::to_string(&TicketStatus::CheckedIn).unwrap();
        assert_eq!(json, "\"Checked In\"");
        let other: TicketStatus = serde_json::from_str("\"Waitlisted\"").unwrap();
        assert_eq!(other.as_str(), "Waitlisted");
    }
}
