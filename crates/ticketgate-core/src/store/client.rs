//! Google Sheets v4 REST implementation of `RecordStore`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{RecordStore, Row, SheetLayout, StoreError};
use crate::auth::TokenProvider;
use crate::models::TicketStatus;

/// Public Sheets API endpoint.
pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";

/// HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Row>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValueUpdate<'a> {
    range: &'a str,
    major_dimension: &'a str,
    values: [[&'a str; 1]; 1],
}

/// Sheets client bound to one spreadsheet and layout.
pub struct SheetsClient {
    client: Client,
    tokens: TokenProvider,
    base_url: Url,
    spreadsheet_id: String,
    layout: SheetLayout,
}

impl SheetsClient {
    pub fn new(
        client: Client,
        tokens: TokenProvider,
        base_url: &str,
        spreadsheet_id: impl Into<String>,
        layout: SheetLayout,
    ) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Sheets API base is not a usable URL: {}", base_url);
        }
        layout.row_columns()?;
        Ok(Self {
            client,
            tokens,
            base_url,
            spreadsheet_id: spreadsheet_id.into(),
            layout,
        })
    }

    /// Build the shared HTTP client with the configured timeout.
    pub fn http_client(timeout_secs: u64) -> reqwest::Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
    }

    /// `{base}/v4/spreadsheets/{id}/values/{range}` with the range percent-encoded.
    fn values_url(&self, range: &str) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str(), "values", range]);
        }
        url
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(&self, response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let error = StoreError::from_status(status, &body);
        if matches!(error, StoreError::Unauthorized) {
            // Force a fresh exchange on the next call
            self.tokens.invalidate().await;
        }
        Err(error)
    }
}

#[async_trait]
impl RecordStore for SheetsClient {
    async fn fetch_all_rows(&self) -> Result<Vec<Row>, StoreError> {
        let range = self.layout.read_range();
        let url = self.values_url(&range);
        let token = self.tokens.bearer().await?;

        debug!(range = %range, "Fetching participant rows");

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Sheets read request failed");
                StoreError::Network(e)
            })?;

        let response = self.check_response(response).await?;
        let parsed: ValueRange = response
            .json()
            .await
            .map_err(|e| StoreError::InvalidResponse(format!("Failed to parse value range: {}", e)))?;

        debug!(rows = parsed.values.len(), "Fetched participant rows");
        Ok(parsed.values)
    }

    async fn write_status_cell(&self, source_row: u32, status: &TicketStatus) -> Result<(), StoreError> {
        let cell = self.layout.status_cell(source_row);
        let mut url = self.values_url(&cell);
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let token = self.tokens.bearer().await?;

        let body = ValueUpdate {
            range: &cell,
            major_dimension: "ROWS",
            values: [[status.as_str()]],
        };

        let response = self
            .client
            .put(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        self.check_response(response).await?;
        info!(cell = %cell, status = %status, "Wrote status cell");
        Ok(())
    }

    fn layout(&self) -> &SheetLayout {
        &self.layout
    }
}
