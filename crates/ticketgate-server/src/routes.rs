//! HTTP routes for the scanner API.
//!
//! Handlers are thin: they validate the JSON body, call `TicketService`, and
//! render the outcome. Every response carries a `success` flag.

use std::path::Path;

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, get_service, post},
    Json, Router,
};
use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::services::{ServeDir, ServeFile};
use tracing::info;

use ticketgate_core::cache::CacheStats;
use ticketgate_core::service::{BulkEntry, Verification};
use ticketgate_core::{CheckInOutcome, ParticipantRecord, ServiceError, TicketService};

use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub tickets: TicketService,
}

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/verify", post(verify_handler))
        .route("/checkin", post(check_in_handler))
        .route("/bulk-verify", post(bulk_verify_handler))
        .route("/refresh-cache", post(refresh_cache_handler))
        .route("/cache-stats", get(cache_stats_handler))
        .route("/health", get(health_handler))
}

/// API under `/api`, scanner pages at `/` and `/fast`, other assets from `static_dir`.
pub fn app_router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .nest("/api", api_router())
        .route(
            "/",
            get_service(ServeFile::new(static_dir.join("index.html"))),
        )
        .route(
            "/fast",
            get_service(ServeFile::new(static_dir.join("fast-scanner.html"))),
        )
        .fallback_service(ServeDir::new(static_dir))
        .with_state(state)
}

// ============================================================================
// Request / response bodies
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRequest {
    ticket_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkVerifyRequest {
    ticket_ids: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
}

impl ParticipantView {
    /// Contact summary shown for tickets that cannot be admitted.
    fn summary(record: &ParticipantRecord) -> Self {
        Self {
            name: record.name.clone(),
            email: record.email.clone(),
            phone: None,
            status: record.status.to_string(),
            ticket_id: None,
        }
    }

    fn full(record: &ParticipantRecord) -> Self {
        Self {
            phone: Some(record.phone.clone()),
            ticket_id: Some(record.ticket_id.clone()),
            ..Self::summary(record)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant: Option<ParticipantView>,
}

impl From<Verification> for VerifyResponse {
    fn from(verification: Verification) -> Self {
        let valid = verification.outcome.is_valid();
        let participant = verification.participant.as_ref().map(|record| {
            if valid {
                ParticipantView::full(record)
            } else {
                ParticipantView::summary(record)
            }
        });
        Self {
            success: valid,
            message: verification.outcome.message().to_string(),
            participant,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInParticipant {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub checked_in_time: String,
}

#[derive(Debug, Serialize)]
pub struct CheckInResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant: Option<CheckInParticipant>,
}

impl CheckInResponse {
    fn failed(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            participant: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResult {
    pub ticket_id: String,
    pub valid: bool,
    pub participant: Option<ParticipantRecord>,
    pub message: Option<String>,
}

impl From<BulkEntry> for BulkResult {
    fn from(entry: BulkEntry) -> Self {
        match entry.result {
            Ok(verification) => Self {
                ticket_id: entry.ticket_id,
                valid: verification.outcome.is_valid(),
                message: Some(verification.outcome.message().to_string()),
                participant: verification.participant,
            },
            Err(e) => Self {
                ticket_id: entry.ticket_id,
                valid: false,
                participant: None,
                message: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BulkVerifyResponse {
    pub success: bool,
    pub results: Vec<BulkResult>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub message: String,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub stats: CacheStats,
}

// ============================================================================
// Handlers
// ============================================================================

fn ticket_id_from(payload: Result<Json<TicketRequest>, JsonRejection>) -> Result<String, ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::bad_request("Ticket ID is required"))?;
    match request.ticket_id {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(ApiError::bad_request("Ticket ID is required")),
    }
}

fn display_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

pub async fn verify_handler(
    State(state): State<AppState>,
    payload: Result<Json<TicketRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let ticket_id = ticket_id_from(payload)?;
    info!(ticket_id = %ticket_id, "Verifying ticket");

    let verification = state
        .tickets
        .verify(&ticket_id)
        .await
        .map_err(|e| ApiError::from_service(e, "Server error during verification"))?;

    Ok(Json(verification.into()))
}

pub async fn check_in_handler(
    State(state): State<AppState>,
    payload: Result<Json<TicketRequest>, JsonRejection>,
) -> Result<Json<CheckInResponse>, ApiError> {
    let ticket_id = ticket_id_from(payload)?;
    info!(ticket_id = %ticket_id, "Checking in ticket");

    let response = match state.tickets.check_in(&ticket_id).await {
        Ok(CheckInOutcome::CheckedIn {
            participant,
            checked_in_at,
        }) => CheckInResponse {
            success: true,
            message: "Successfully checked in".to_string(),
            participant: Some(CheckInParticipant {
                name: participant.name,
                email: Some(participant.email),
                checked_in_time: display_time(checked_in_at),
            }),
        },
        Ok(CheckInOutcome::AlreadyCheckedIn(participant)) => CheckInResponse {
            success: false,
            message: "Already checked in".to_string(),
            participant: Some(CheckInParticipant {
                name: participant.name,
                email: None,
                checked_in_time: "Previously checked in".to_string(),
            }),
        },
        Ok(CheckInOutcome::NotFound) => CheckInResponse::failed("Invalid ticket - cannot check in"),
        Err(ServiceError::WriteRejected(_)) => {
            CheckInResponse::failed("Failed to update check-in status")
        }
        Err(e) => return Err(ApiError::from_service(e, "Server error during check-in")),
    };

    Ok(Json(response))
}

pub async fn bulk_verify_handler(
    State(state): State<AppState>,
    payload: Result<Json<BulkVerifyRequest>, JsonRejection>,
) -> Result<Json<BulkVerifyResponse>, ApiError> {
    const REQUIRED: &str = "TicketIds array is required";

    let Json(request) = payload.map_err(|_| ApiError::bad_request(REQUIRED))?;
    let Some(Value::Array(items)) = request.ticket_ids else {
        return Err(ApiError::bad_request(REQUIRED));
    };
    if items.is_empty() {
        return Err(ApiError::bad_request(REQUIRED));
    }

    let ticket_ids = items
        .into_iter()
        .map(|item| match item {
            Value::String(id) => Ok(id),
            _ => Err(ApiError::bad_request("TicketIds must be strings")),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let entries = state
        .tickets
        .bulk_verify(&ticket_ids)
        .await
        .map_err(|e| ApiError::from_service(e, "Server error during bulk verification"))?;

    Ok(Json(BulkVerifyResponse {
        success: true,
        results: entries.into_iter().map(BulkResult::from).collect(),
    }))
}

pub async fn refresh_cache_handler(
    State(state): State<AppState>,
) -> Result<Json<RefreshResponse>, ApiError> {
    match state.tickets.refresh().await {
        Ok(count) => Ok(Json(RefreshResponse {
            success: true,
            message: "Cache refreshed successfully".to_string(),
            count,
        })),
        Err(e) => {
            tracing::warn!(error = %e, "Manual cache refresh failed");
            Err(ApiError::internal("Failed to refresh cache"))
        }
    }
}

pub async fn cache_stats_handler(State(state): State<AppState>) -> Json<CacheStatsResponse> {
    Json(CacheStatsResponse {
        success: true,
        stats: state.tickets.stats().await,
    })
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        message: "Scanner API is healthy".to_string(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}
