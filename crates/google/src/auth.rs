use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use leadneedle_core::config::GoogleConfig;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Refresh the cached token this long before it actually expires, so a
/// token handed to a caller is never on the verge of rejection.
const EXPIRY_SLACK_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum GoogleAuthError {
    #[error("missing google oauth credentials (client_id, client_secret, refresh_token)")]
    MissingCredentials,
    #[error("token endpoint rejected refresh with status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("token endpoint transport failure: {0}")]
    Network(String),
    #[error("token response could not be decoded: {0}")]
    Decode(String),
}

/// Exchanges a long-lived refresh token for short-lived access tokens and
/// caches the current one until it nears expiry.
pub struct OauthTokenProvider {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
    refresh_token: SecretString,
    cached: Mutex<Option<CachedToken>>,
}

#[derive(Clone)]
struct CachedToken {
    access_token: SecretString,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

impl OauthTokenProvider {
    pub fn from_config(config: &GoogleConfig) -> Result<Self, GoogleAuthError> {
        let (client_id, client_secret, refresh_token) =
            match (&config.client_id, &config.client_secret, &config.refresh_token) {
                (Some(id), Some(secret), Some(token)) => {
                    (id.clone(), secret.clone(), token.clone())
                }
                _ => return Err(GoogleAuthError::MissingCredentials),
            };

        Ok(Self::new(client_id, client_secret, refresh_token, TOKEN_URL))
    }

    pub fn new(
        client_id: String,
        client_secret: SecretString,
        refresh_token: SecretString,
        token_url: impl Into<String>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            http,
            token_url: token_url.into(),
            client_id,
            client_secret,
            refresh_token,
            cached: Mutex::new(None),
        }
    }

    /// Returns a currently valid access token, refreshing if the cached one
    /// is absent or within the expiry slack.
    pub async fn access_token(&self) -> Result<SecretString, GoogleAuthError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            let usable_until = token.expires_at - chrono::Duration::seconds(EXPIRY_SLACK_SECS);
            if Utc::now() < usable_until {
                return Ok(token.access_token.clone());
            }
        }

        let refreshed = self.refresh().await?;
        let access_token = refreshed.access_token.clone();
        *cached = Some(refreshed);
        debug!(event_name = "google.oauth.refreshed", "access token refreshed");

        Ok(access_token)
    }

    async fn refresh(&self) -> Result<CachedToken, GoogleAuthError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("refresh_token", self.refresh_token.expose_secret()),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|error| GoogleAuthError::Network(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GoogleAuthError::Api { status: status.as_u16(), message });
        }

        let token = response
            .json::<TokenResponse>()
            .await
            .map_err(|error| GoogleAuthError::Decode(error.to_string()))?;

        Ok(CachedToken {
            access_token: token.access_token.into(),
            expires_at: Utc::now() + chrono::Duration::seconds(token.expires_in.max(0)),
        })
    }
}
