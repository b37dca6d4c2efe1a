//! Ticketgate core library.
//!
//! Ticket verification and check-in backed by a spreadsheet:
//!
//! - `store`: the record store adapter (Google Sheets, or in-memory)
//! - `cache`: the read-through participant cache with a 30 second TTL
//! - `service`: verify / check-in / bulk verify / refresh operations
//! - `auth`: service-account access tokens for the Sheets API
//! - `config`: layered configuration

pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod service;
pub mod store;

pub use cache::{Lookup, ParticipantCache};
pub use config::Config;
pub use models::{ParticipantRecord, TicketStatus};
pub use service::{CheckInOutcome, ServiceError, TicketService, VerifyOutcome};
pub use store::{MemoryStore, RecordStore, SheetsClient, StoreError};
