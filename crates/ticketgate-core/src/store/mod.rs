//! Record store adapter.
//!
//! The participant sheet is the system of record. `RecordStore` is the only
//! channel to it: one ranged read of every participant row, and a single-cell
//! write of the status column. No caching or retrying happens at this layer.
//!
//! - `SheetsClient`: Google Sheets v4 REST implementation
//! - `MemoryStore`: in-process implementation for local runs and tests

pub mod client;
pub mod error;
pub mod layout;
pub mod memory;

use async_trait::async_trait;

use crate::models::TicketStatus;

pub use client::SheetsClient;
pub use error::StoreError;
pub use layout::{LayoutError, SheetLayout};
pub use memory::MemoryStore;

/// A single fetched row: cell strings in column order.
pub type Row = Vec<String>;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read every participant row in sheet order.
    async fn fetch_all_rows(&self) -> Result<Vec<Row>, StoreError>;

    /// Overwrite the status cell of one row.
    async fn write_status_cell(&self, source_row: u32, status: &TicketStatus) -> Result<(), StoreError>;

    /// Range and column layout shared by reads and writes.
    ///
    /// `source_row` of the record at fetched offset `i` is
    /// `layout().first_data_row + i`.
    fn layout(&self) -> &SheetLayout;
}
