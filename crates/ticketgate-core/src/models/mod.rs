//! Data models for ticket holders.
//!
//! - `ParticipantRecord`: one row of the registration sheet, keyed by ticket id
//! - `TicketStatus`: the check-in state machine for a single ticket
//! - `RowColumns`: where each field sits within a fetched row

pub mod participant;

pub use participant::{ParticipantRecord, RowColumns, TicketStatus};
