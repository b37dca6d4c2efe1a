use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use super::{RecordStore, Row, SheetLayout, StoreError};
use crate::models::{RowColumns, TicketStatus};

/// In-process record store holding rows in memory.
///
/// Counts calls and can be switched into failure modes, which makes it the
/// stand-in for the spreadsheet in cache and route tests.
pub struct MemoryStore {
    layout: SheetLayout,
    rows: Mutex<Vec<Row>>,
    fetch_calls: AtomicUsize,
    write_calls: AtomicUsize,
    fail_fetch: AtomicBool,
    fail_write: AtomicBool,
    fetch_delay: Mutex<Option<Duration>>,
    write_delay: Mutex<Option<Duration>>,
}

impl MemoryStore {
    pub fn new(rows: Vec<Row>) -> Self {
        Self::with_layout(SheetLayout::default(), rows)
    }

    pub fn with_layout(layout: SheetLayout, rows: Vec<Row>) -> Self {
        Self {
            layout,
            rows: Mutex::new(rows),
            fetch_calls: AtomicUsize::new(0),
            write_calls: AtomicUsize::new(0),
            fail_fetch: AtomicBool::new(false),
            fail_write: AtomicBool::new(false),
            fetch_delay: Mutex::new(None),
            write_delay: Mutex::new(None),
        }
    }

    /// Build a row with the ticket id and status in their default columns.
    pub fn participant_row(ticket_id: &str, name: &str, status: &str) -> Row {
        Self::participant_row_at(&RowColumns::default(), ticket_id, name, status)
    }

    /// Build a row with each field placed per `columns`.
    pub fn participant_row_at(columns: &RowColumns, ticket_id: &str, name: &str, status: &str) -> Row {
        let width = columns.status.max(columns.ticket_id).max(columns.phone) + 1;
        let mut row = vec![String::new(); width];
        row[columns.email] = format!("{}@example.com", name.to_lowercase().replace(' ', "."));
        row[columns.name] = name.to_string();
        row[columns.status] = status.to_string();
        row[columns.ticket_id] = ticket_id.to_string();
        row
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_write(&self, fail: bool) {
        self.fail_write.store(fail, Ordering::SeqCst);
    }

    /// Make every fetch sleep before answering, to hold a reload in flight.
    pub fn set_fetch_delay(&self, delay: Option<Duration>) {
        *lock(&self.fetch_delay) = delay;
    }

    /// Make every status write sleep before landing.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        *lock(&self.write_delay) = delay;
    }

    pub fn replace_rows(&self, rows: Vec<Row>) {
        *self.lock_rows() = rows;
    }

    /// Current status cell of a sheet row, as the store sees it.
    pub fn status_at(&self, source_row: u32) -> Option<String> {
        let idx = self.row_offset(source_row)?;
        let status_idx = self.layout.status_index()?;
        self.lock_rows()
            .get(idx)
            .and_then(|row| row.get(status_idx).cloned())
    }

    fn row_offset(&self, source_row: u32) -> Option<usize> {
        source_row
            .checked_sub(self.layout.first_data_row)
            .map(|offset| offset as usize)
    }

    fn lock_rows(&self) -> MutexGuard<'_, Vec<Row>> {
        lock(&self.rows)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch_all_rows(&self) -> Result<Vec<Row>, StoreError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *lock(&self.fetch_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(StoreError::ServerError("memory store fetch disabled".to_string()));
        }
        Ok(self.lock_rows().clone())
    }

    async fn write_status_cell(&self, source_row: u32, status: &TicketStatus) -> Result<(), StoreError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *lock(&self.write_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_write.load(Ordering::SeqCst) {
            return Err(StoreError::ServerError("memory store write disabled".to_string()));
        }

        let status_idx = self
            .layout
            .status_index()
            .ok_or_else(|| StoreError::InvalidResponse("invalid status column".to_string()))?;
        let idx = self
            .row_offset(source_row)
            .ok_or_else(|| StoreError::NotFound(format!("row {}", source_row)))?;

        let mut rows = self.lock_rows();
        let row = rows
            .get_mut(idx)
            .ok_or_else(|| StoreError::NotFound(format!("row {}", source_row)))?;
        if row.len() <= status_idx {
            row.resize(status_idx + 1, String::new());
        }
        row[status_idx] = status.as_str().to_string();
        Ok(())
    }

    fn layout(&self) -> &SheetLayout {
        &self.layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_updates_status_cell() {
        let store = MemoryStore::new(vec![
            MemoryStore::participant_row("A1", "Ada", "Ticket Sent"),
            MemoryStore::participant_row("B2", "Bob", "Ticket Sent"),
        ]);

        store.write_status_cell(3, &TicketStatus::CheckedIn).await.unwrap();

        assert_eq!(store.status_at(2).as_deref(), Some("Ticket Sent"));
        assert_eq!(store.status_at(3).as_deref(), Some("Checked In"));
        assert_eq!(store.write_calls(), 1);
    }

    #[tokio::test]
    async fn test_write_out_of_range_fails() {
        let store = MemoryStore::new(vec![MemoryStore::participant_row("A1", "Ada", "")]);
        assert!(store.write_status_cell(1, &TicketStatus::CheckedIn).await.is_err());
        assert!(store.write_status_cell(9, &TicketStatus::CheckedIn).await.is_err());
    }

    #[tokio::test]
    async fn test_fail_fetch_flag() {
        let store = MemoryStore::new(vec![]);
        store.set_fail_fetch(true);
        assert!(store.fetch_all_rows().await.is_err());
        store.set_fail_fetch(false);
        assert!(store.fetch_all_rows().await.unwrap().is_empty());
        assert_eq!(store.fetch_calls(), 2);
    }
}
