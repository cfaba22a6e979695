use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use serde_json::json;
use thiserror::Error;
use tracing::info;

use crate::auth::OauthTokenProvider;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";
const REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("sheets authorization failed: {0}")]
    Auth(String),
    #[error("sheets request rejected with status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("sheets transport failure: {0}")]
    Network(String),
}

/// Appends rows to a submissions spreadsheet.
pub struct SheetsClient {
    http: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    auth: Arc<OauthTokenProvider>,
}

impl SheetsClient {
    pub fn new(auth: Arc<OauthTokenProvider>, spreadsheet_id: impl Into<String>) -> Self {
        Self::with_base_url(auth, spreadsheet_id, SHEETS_API_BASE)
    }

    pub fn with_base_url(
        auth: Arc<OauthTokenProvider>,
        spreadsheet_id: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            auth,
        }
    }

    pub async fn append_row(&self, sheet_name: &str, row: Vec<String>) -> Result<(), SheetsError> {
        let token = self
            .auth
            .access_token()
            .await
            .map_err(|error| SheetsError::Auth(error.to_string()))?;

        let endpoint = format!(
            "{}/spreadsheets/{}/values/{}!A1:append",
            self.base_url, self.spreadsheet_id, sheet_name
        );

        let response = self
            .http
            .post(endpoint)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .bearer_auth(token.expose_secret())
            .json(&json!({ "values": [row] }))
            .send()
            .await
            .map_err(|error| SheetsError::Network(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SheetsError::Api { status: status.as_u16(), message });
        }

        info!(
            event_name = "google.sheets.appended",
            sheet = %sheet_name,
            "submission row appended"
        );

        Ok(())
    }
}
