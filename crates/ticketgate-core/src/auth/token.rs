use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::store::StoreError;

/// OAuth scope granting read/write access to spreadsheets.
const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Grant type for the service-account JWT bearer flow.
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Default token endpoint when the key file does not name one.
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Lifetime requested for the signed grant. Google caps this at one hour.
const GRANT_LIFETIME_MINUTES: i64 = 60;

/// Refresh this long before the access token expires.
const TOKEN_REFRESH_BUFFER_MINUTES: i64 = 5;

/// Fields of a Google service-account key file that the token exchange needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials file: {}", path.display()))?;
        Self::from_json(&contents)
            .with_context(|| format!("Failed to parse credentials file: {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Serialize)]
struct GrantClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Check if the token will expire soon and should be replaced
    pub fn needs_refresh(&self) -> bool {
        Utc::now() > self.expires_at - Duration::minutes(TOKEN_REFRESH_BUFFER_MINUTES)
    }
}

/// Where bearer tokens come from.
#[derive(Debug, Clone)]
pub enum TokenSource {
    /// A pre-issued token, used as-is. Handy for local runs and tests.
    Static(String),
    ServiceAccount(ServiceAccountKey),
}

/// Hands out bearer tokens, caching the last exchanged one.
pub struct TokenProvider {
    source: TokenSource,
    client: Client,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenProvider {
    pub fn new(source: TokenSource, client: Client) -> Self {
        Self {
            source,
            client,
            cached: Mutex::new(None),
        }
    }

    /// Return a usable bearer token, exchanging a new one if needed.
    ///
    /// The cache lock is held across the exchange so concurrent callers share
    /// a single token request.
    pub async fn bearer(&self) -> Result<String, StoreError> {
        let key = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::ServiceAccount(key) => key,
        };

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if !token.needs_refresh() {
                return Ok(token.token.clone());
            }
            debug!(expires_at = %token.expires_at, "Access token near expiry, refreshing");
        }

        let fresh = self.exchange(key).await?;
        let bearer = fresh.token.clone();
        *cached = Some(fresh);
        Ok(bearer)
    }

    /// Drop the cached token so the next call exchanges a new one.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn exchange(&self, key: &ServiceAccountKey) -> Result<AccessToken, StoreError> {
        let assertion = Self::sign_grant(key, Utc::now())?;

        let response = self
            .client
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Auth(
                StoreError::from_status(status, &body).to_string(),
            ));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Auth(format!("Failed to parse token response: {}", e)))?;

        info!(
            account = %key.client_email,
            expires_in = parsed.expires_in,
            "Obtained Sheets access token"
        );

        Ok(AccessToken {
            token: parsed.access_token,
            expires_at: Utc::now() + Duration::seconds(parsed.expires_in),
        })
    }

    fn sign_grant(key: &ServiceAccountKey, now: DateTime<Utc>) -> Result<String, StoreError> {
        let claims = GrantClaims {
            iss: &key.client_email,
            scope: SPREADSHEETS_SCOPE,
            aud: &key.token_uri,
            iat: now.timestamp(),
            exp: (now + Duration::minutes(GRANT_LIFETIME_MINUTES)).timestamp(),
        };

        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| StoreError::Auth(format!("Invalid service-account private key: {}", e)))?;

        encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|e| StoreError::Auth(format!("Failed to sign token grant: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TEST_KEY_PEM: &str = include_str!("../../tests/fixtures/test-service-account.pem");

    fn test_key(token_uri: String) -> ServiceAccountKey {
        ServiceAccountKey {
            client_email: "scanner@project.iam.gserviceaccount.com".to_string(),
            private_key: TEST_KEY_PEM.to_string(),
            token_uri,
        }
    }

    #[test]
    fn test_access_token_needs_refresh() {
        let fresh = AccessToken {
            token: "t".to_string(),
            expires_at: Utc::now() + Duration::minutes(30),
        };
        assert!(!fresh.needs_refresh());

        let nearly = AccessToken {
            token: "t".to_string(),
            expires_at: Utc::now() + Duration::minutes(2),
        };
        assert!(nearly.needs_refresh());
    }

    #[test]
    fn test_key_from_json_defaults_token_uri() {
        let key = ServiceAccountKey::from_json(
            r#"{"client_email": "a@b.iam", "private_key": "pem", "type": "service_account"}"#,
        )
        .unwrap();
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn test_sign_grant_produces_jwt() {
        let jwt = TokenProvider::sign_grant(&test_key(DEFAULT_TOKEN_URI.to_string()), Utc::now()).unwrap();
        assert_eq!(jwt.split('.').count(), 3);
    }

    #[test]
    fn test_sign_grant_rejects_bad_key() {
        let mut key = test_key(DEFAULT_TOKEN_URI.to_string());
        key.private_key = "not a pem".to_string();
        assert!(matches!(
            TokenProvider::sign_grant(&key, Utc::now()),
            Err(StoreError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_static_token_passthrough() {
        let provider = TokenProvider::new(TokenSource::Static("dev-token".to_string()), Client::new());
        assert_eq!(provider.bearer().await.unwrap(), "dev-token");
    }

    #[tokio::test]
    async fn test_service_account_exchange_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=urn"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.test",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let key = test_key(format!("{}/token", server.uri()));
        let provider = TokenProvider::new(TokenSource::ServiceAccount(key), Client::new());

        assert_eq!(provider.bearer().await.unwrap(), "ya29.test");
        assert_eq!(provider.bearer().await.unwrap(), "ya29.test");
    }

    #[tokio::test]
    async fn test_service_account_exchange_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let key = test_key(format!("{}/token", server.uri()));
        let provider = TokenProvider::new(TokenSource::ServiceAccount(key), Client::new());

        assert!(matches!(provider.bearer().await, Err(StoreError::Auth(_))));
    }
}
