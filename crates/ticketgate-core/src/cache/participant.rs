use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::models::{ParticipantRecord, TicketStatus};
use crate::store::{RecordStore, Row, StoreError};

/// Consider the mapping stale 30 seconds after the last full reload.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Result of a cache lookup.
///
/// A miss after a failed reload is reported the same way as a ticket that
/// never existed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(ParticipantRecord),
    NotFound,
}

#[derive(Error, Debug)]
pub enum CheckInError {
    /// The status write did not reach the store. The cache is unchanged.
    #[error("check-in write rejected: {0}")]
    WriteRejected(#[source] StoreError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub age_seconds: Option<u64>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, ParticipantRecord>,
    /// Monotonic time of the last full reload, drives the TTL.
    refreshed_at: Option<Instant>,
    /// Wall-clock time of the same reload, for reporting.
    refreshed_wall: Option<DateTime<Utc>>,
}

pub struct ParticipantCache {
    store: Arc<dyn RecordStore>,
    ttl: Duration,
    state: RwLock<CacheState>,
    /// Serializes reloads so concurrent expired lookups share one fetch.
    reload_gate: Mutex<()>,
    /// Completed reload attempts, successful or not. Only changed under `reload_gate`.
    reload_attempts: AtomicU64,
}

impl ParticipantCache {
    pub fn new(store: Arc<dyn RecordStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            state: RwLock::new(CacheState::default()),
            reload_gate: Mutex::new(()),
            reload_attempts: AtomicU64::new(0),
        }
    }

    /// Fetch every row and replace the mapping.
    ///
    /// On failure the previous mapping and timestamp are kept.
    pub async fn reload(&self) -> Result<usize, StoreError> {
        let _gate = self.reload_gate.lock().await;
        self.reload_locked().await
    }

    /// Manual cache-bust. Always fetches, even when the mapping is fresh.
    pub async fn force_refresh(&self) -> Result<usize, StoreError> {
        info!("Manual participant cache refresh requested");
        self.reload().await
    }

    /// Look up a ticket, reloading first when the mapping is stale or empty.
    pub async fn lookup(&self, ticket_id: &str) -> Lookup {
        let seen_attempts = {
            let state = self.state.read().await;
            if !self.needs_reload(&state) {
                debug!(ticket_id, "Serving lookup from fresh participant cache");
                return Self::find(&state, ticket_id);
            }
            self.reload_attempts.load(Ordering::SeqCst)
        };

        self.reload_if_no_one_else(seen_attempts).await;

        let state = self.state.read().await;
        Self::find(&state, ticket_id)
    }

    /// Mark a ticket as checked in: store first, then memory.
    ///
    /// `record` must come from a prior lookup so its `source_row` addresses
    /// the right sheet row. The refresh timestamp is not touched.
    pub async fn check_in(&self, record: &ParticipantRecord) -> Result<ParticipantRecord, CheckInError> {
        self.store
            .write_status_cell(record.source_row, &TicketStatus::CheckedIn)
            .await
            .map_err(|e| {
                warn!(
                    ticket_id = %record.ticket_id,
                    row = record.source_row,
                    error = %e,
                    "Check-in write failed, cache left unchanged"
                );
                CheckInError::WriteRejected(e)
            })?;

        let mut state = self.state.write().await;
        let patched = match state.entries.get_mut(&record.ticket_id) {
            Some(entry) if entry.source_row == record.source_row => {
                entry.status = TicketStatus::CheckedIn;
                entry.clone()
            }
            // Evicted or moved by a reload since the caller's lookup; the
            // next reload reconciles with the store.
            _ => {
                debug!(ticket_id = %record.ticket_id, "Checked-in ticket no longer cached at its row");
                ParticipantRecord {
                    status: TicketStatus::CheckedIn,
                    ..record.clone()
                }
            }
        };

        info!(ticket_id = %record.ticket_id, row = record.source_row, "Ticket checked in");
        Ok(patched)
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }

    pub async fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.refreshed_wall
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.state.read().await;
        CacheStats {
            entries: state.entries.len(),
            last_refreshed_at: state.refreshed_wall,
            age_seconds: state.refreshed_at.map(|at| at.elapsed().as_secs()),
        }
    }

    fn needs_reload(&self, state: &CacheState) -> bool {
        if state.entries.is_empty() {
            return true;
        }
        match state.refreshed_at {
            Some(at) => at.elapsed() >= self.ttl,
            None => true,
        }
    }

    fn find(state: &CacheState, ticket_id: &str) -> Lookup {
        match state.entries.get(ticket_id) {
            Some(record) => Lookup::Found(record.clone()),
            None => Lookup::NotFound,
        }
    }

    /// Reload unless another attempt finished while this caller waited for the gate.
    async fn reload_if_no_one_else(&self, seen_attempts: u64) {
        let _gate = self.reload_gate.lock().await;
        if self.reload_attempts.load(Ordering::SeqCst) != seen_attempts {
            debug!("Joined a concurrent participant reload");
            return;
        }
        if let Err(e) = self.reload_locked().await {
            debug!(error = %e, "Lookup proceeding against previous participant mapping");
        }
    }

    /// Caller must hold `reload_gate`.
    async fn reload_locked(&self) -> Result<usize, StoreError> {
        debug!("Loading participant cache");
        let fetched = self.store.fetch_all_rows().await;
        self.reload_attempts.fetch_add(1, Ordering::SeqCst);

        let rows = match fetched {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Participant reload failed, keeping previous mapping");
                return Err(e);
            }
        };

        let entries = self.build_entries(&rows)?;
        let count = entries.len();

        let mut state = self.state.write().await;
        state.entries = entries;
        state.refreshed_at = Some(Instant::now());
        state.refreshed_wall = Some(Utc::now());
        drop(state);

        info!(participants = count, rows = rows.len(), "Participant cache loaded");
        Ok(count)
    }

    fn build_entries(&self, rows: &[Row]) -> Result<HashMap<String, ParticipantRecord>, StoreError> {
        let layout = self.store.layout();
        let columns = layout.row_columns().map_err(|e| {
            warn!(error = %e, "Participant reload failed, keeping previous mapping");
            StoreError::Layout(e)
        })?;
        let first_row = layout.first_data_row;
        let mut entries = HashMap::with_capacity(rows.len());

        for (offset, row) in rows.iter().enumerate() {
            let source_row = first_row + offset as u32;
            let Some(record) = ParticipantRecord::from_row(row, source_row, &columns) else {
                continue;
            };
            if let Some(previous) = entries.insert(record.ticket_id.clone(), record) {
                warn!(
                    ticket_id = %previous.ticket_id,
                    replaced_row = previous.source_row,
                    row = source_row,
                    "Duplicate ticket id, keeping the later row"
                );
            }
        }

        Ok(entries)
    }
}
