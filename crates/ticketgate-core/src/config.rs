//! Application configuration management.
//!
//! Settings come from three layers, later ones winning:
//! 1. Built-in defaults
//! 2. An optional JSON file (`TICKETGATE_CONFIG`, or
//!    `~/.config/ticketgate/config.json`)
//! 3. Environment variables (a `.env` file is loaded by the server binary)

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::{ServiceAccountKey, TokenProvider, TokenSource};
use crate::cache::DEFAULT_TTL;
use crate::store::client::{DEFAULT_API_BASE, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::store::{SheetLayout, SheetsClient};

/// Application name used for the config directory path
const APP_NAME: &str = "ticketgate";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable naming an explicit config file
const CONFIG_PATH_ENV: &str = "TICKETGATE_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub spreadsheet_id: String,
    /// Google service-account key file.
    pub credentials_path: PathBuf,
    /// Pre-issued bearer token; skips the service-account exchange when set.
    pub access_token: Option<String>,
    pub sheets_api_base: String,
    pub layout: SheetLayout,
    pub cache_ttl_secs: u64,
    pub request_timeout_secs: u64,
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            credentials_path: PathBuf::from("credentials.json"),
            access_token: None,
            sheets_api_base: DEFAULT_API_BASE.to_string(),
            layout: SheetLayout::default(),
            cache_ttl_secs: DEFAULT_TTL.as_secs(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            host: "0.0.0.0".to_string(),
            port: 4000,
            static_dir: PathBuf::from("public"),
        }
    }
}

impl Config {
    /// Load from the config file (if any) and the process environment.
    pub fn load() -> Result<Self> {
        let path = match std::env::var(CONFIG_PATH_ENV) {
            Ok(explicit) => Some(PathBuf::from(explicit)),
            Err(_) => Self::default_config_path().filter(|p| p.exists()),
        };
        Self::from_sources(path.as_deref(), |key| std::env::var(key).ok())
    }

    /// Build a config from an optional file and an environment lookup.
    pub fn from_sources(
        file: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE))
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = env("SPREADSHEET_ID") {
            self.spreadsheet_id = v;
        }
        if let Some(v) = env("GOOGLE_CREDENTIALS") {
            self.credentials_path = PathBuf::from(v);
        }
        if let Some(v) = env("GOOGLE_ACCESS_TOKEN").filter(|v| !v.is_empty()) {
            self.access_token = Some(v);
        }
        if let Some(v) = env("SHEETS_API_BASE") {
            self.sheets_api_base = v;
        }
        if let Some(v) = env("SHEET_NAME") {
            self.layout.sheet_name = v;
        }
        if let Some(v) = env("STATUS_COLUMN") {
            self.layout.status_column = v.trim().to_ascii_uppercase();
        }
        if let Some(v) = env("TICKET_ID_COLUMN") {
            self.layout.ticket_id_column = v.trim().to_ascii_uppercase();
        }
        if let Some(v) = env("LAST_COLUMN") {
            self.layout.last_column = v.trim().to_ascii_uppercase();
        }
        if let Some(v) = env("CACHE_TTL_SECS") {
            self.cache_ttl_secs = parse_var("CACHE_TTL_SECS", &v)?;
        }
        if let Some(v) = env("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_var("REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = env("HOST") {
            self.host = v;
        }
        if let Some(v) = env("PORT") {
            self.port = parse_var("PORT", &v)?;
        }
        if let Some(v) = env("STATIC_DIR") {
            self.static_dir = PathBuf::from(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.spreadsheet_id.trim().is_empty() {
            anyhow::bail!("SPREADSHEET_ID must be set");
        }
        if self.cache_ttl_secs == 0 {
            anyhow::bail!("cache_ttl_secs must be greater than zero");
        }
        self.layout
            .row_columns()
            .context("Sheet layout does not read back the column it writes")?;
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn token_source(&self) -> Result<TokenSource> {
        match &self.access_token {
            Some(token) => Ok(TokenSource::Static(token.clone())),
            None => Ok(TokenSource::ServiceAccount(ServiceAccountKey::from_file(
                &self.credentials_path,
            )?)),
        }
    }

    /// Build the Sheets-backed record store described by this config.
    pub fn sheets_client(&self) -> Result<SheetsClient> {
        let http = SheetsClient::http_client(self.request_timeout_secs)
            .context("Failed to build HTTP client")?;
        let tokens = TokenProvider::new(self.token_source()?, http.clone());
        SheetsClient::new(
            http,
            tokens,
            &self.sheets_api_base,
            self.spreadsheet_id.clone(),
            self.layout.clone(),
        )
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {}: {:?}", name, value))
}
