//! Ticket verification and check-in operations.
//!
//! `TicketService` is the caller-facing layer over the participant cache. It
//! validates input, classifies ticket status, and turns cache results into
//! outcomes the HTTP layer can render directly.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::cache::{CacheStats, CheckInError, Lookup, ParticipantCache};
use crate::models::{ParticipantRecord, TicketStatus};
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Record store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    #[error("Check-in write rejected: {0}")]
    WriteRejected(#[source] StoreError),
}

impl From<CheckInError> for ServiceError {
    fn from(err: CheckInError) -> Self {
        match err {
            CheckInError::WriteRejected(e) => ServiceError::WriteRejected(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum VerifyOutcome {
    Valid,
    AlreadyUsed,
    InvalidStatus,
    NotFound,
}

impl VerifyOutcome {
    pub fn classify(status: &TicketStatus) -> Self {
        match status {
            TicketStatus::TicketSent => VerifyOutcome::Valid,
            TicketStatus::CheckedIn => VerifyOutcome::AlreadyUsed,
            TicketStatus::Other(_) => VerifyOutcome::InvalidStatus,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyOutcome::Valid)
    }

    pub fn message(&self) -> &'static str {
        match self {
            VerifyOutcome::Valid => "Valid ticket",
            VerifyOutcome::AlreadyUsed => "Ticket already used",
            VerifyOutcome::InvalidStatus => "Invalid ticket status",
            VerifyOutcome::NotFound => "Ticket not found",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub ticket_id: String,
    pub outcome: VerifyOutcome,
    pub participant: Option<ParticipantRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckInOutcome {
    CheckedIn {
        participant: ParticipantRecord,
        checked_in_at: DateTime<Utc>,
    },
    /// Idempotent: the ticket was already used and nothing was written.
    AlreadyCheckedIn(ParticipantRecord),
    NotFound,
}

/// One element of a bulk verification, in input order.
#[derive(Debug)]
pub struct BulkEntry {
    pub ticket_id: String,
    pub result: Result<Verification, ServiceError>,
}

#[derive(Clone)]
pub struct TicketService {
    cache: Arc<ParticipantCache>,
    /// Held from the status lookup through the write, so two scanners
    /// presenting the same ticket cannot both check it in.
    check_in_gate: Arc<Mutex<()>>,
}

impl TicketService {
    pub fn new(cache: Arc<ParticipantCache>) -> Self {
        Self {
            cache,
            check_in_gate: Arc::new(Mutex::new(())),
        }
    }

    fn normalize(ticket_id: &str) -> Result<&str, ServiceError> {
        let trimmed = ticket_id.trim();
        if trimmed.is_empty() {
            return Err(ServiceError::InvalidInput("Ticket ID is required".to_string()));
        }
        Ok(trimmed)
    }

    pub async fn verify(&self, ticket_id: &str) -> Result<Verification, ServiceError> {
        let ticket_id = Self::normalize(ticket_id)?;
        debug!(ticket_id, "Verifying ticket");

        let verification = match self.cache.lookup(ticket_id).await {
            Lookup::Found(record) => Verification {
                ticket_id: ticket_id.to_string(),
                outcome: VerifyOutcome::classify(&record.status),
                participant: Some(record),
            },
            Lookup::NotFound => Verification {
                ticket_id: ticket_id.to_string(),
                outcome: VerifyOutcome::NotFound,
                participant: None,
            },
        };
        Ok(verification)
    }

    /// Check a ticket in unless it is unknown or already used.
    ///
    /// Tickets whose status is neither sent nor checked in are still written;
    /// the door staff decide on those from the verify result.
    pub async fn check_in(&self, ticket_id: &str) -> Result<CheckInOutcome, ServiceError> {
        let ticket_id = Self::normalize(ticket_id)?;
        let _gate = self.check_in_gate.lock().await;

        let record = match self.cache.lookup(ticket_id).await {
            Lookup::Found(record) => record,
            Lookup::NotFound => {
                info!(ticket_id, "Check-in refused, ticket not found");
                return Ok(CheckInOutcome::NotFound);
            }
        };

        if record.status.is_checked_in() {
            info!(ticket_id, "Ticket already checked in");
            return Ok(CheckInOutcome::AlreadyCheckedIn(record));
        }

        let participant = self.cache.check_in(&record).await?;
        Ok(CheckInOutcome::CheckedIn {
            participant,
            checked_in_at: Utc::now(),
        })
    }

    /// Verify tickets one at a time, preserving input order.
    ///
    /// A bad id only fails its own entry.
    pub async fn bulk_verify(&self, ticket_ids: &[String]) -> Result<Vec<BulkEntry>, ServiceError> {
        if ticket_ids.is_empty() {
            return Err(ServiceError::InvalidInput("TicketIds array is required".to_string()));
        }
        info!(count = ticket_ids.len(), "Bulk verifying tickets");

        let mut entries = Vec::with_capacity(ticket_ids.len());
        for ticket_id in ticket_ids {
            let result = self.verify(ticket_id).await;
            entries.push(BulkEntry {
                ticket_id: ticket_id.clone(),
                result,
            });
        }
        Ok(entries)
    }

    pub async fn refresh(&self) -> Result<usize, ServiceError> {
        self.cache
            .force_refresh()
            .await
            .map_err(ServiceError::StoreUnavailable)
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}
