use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use leadneedle_core::errors::BookingError;
use leadneedle_core::ports::{AppointmentScheduler, BookingConfirmation, BookingRequest};

use crate::auth::OauthTokenProvider;

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Books slots on a Google Calendar through the events API.
pub struct CalendarScheduler {
    http: reqwest::Client,
    base_url: String,
    calendar_id: String,
    auth: Arc<OauthTokenProvider>,
}

#[derive(Debug, Deserialize)]
struct EventResource {
    #[serde(rename = "htmlLink", default)]
    html_link: String,
}

impl CalendarScheduler {
    pub fn new(auth: Arc<OauthTokenProvider>, calendar_id: impl Into<String>) -> Self {
        Self::with_base_url(auth, calendar_id, CALENDAR_API_BASE)
    }

    pub fn with_base_url(
        auth: Arc<OauthTokenProvider>,
        calendar_id: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            calendar_id: calendar_id.into(),
            auth,
        }
    }

    fn events_endpoint(&self) -> String {
        format!("{}/calendars/{}/events", self.base_url, self.calendar_id)
    }
}

#[async_trait]
impl AppointmentScheduler for CalendarScheduler {
    async fn book(&self, request: BookingRequest) -> Result<BookingConfirmation, BookingError> {
        let token = self
            .auth
            .access_token()
            .await
            .map_err(|error| BookingError::Auth(error.to_string()))?;

        let start = request.start_time.unwrap_or_else(|| Utc::now() + chrono::Duration::hours(1));
        let end = start + chrono::Duration::minutes(i64::from(request.duration_minutes));

        let event = json!({
            "summary": request.summary,
            "description": request.description,
            "start": { "dateTime": start.to_rfc3339(), "timeZone": "UTC" },
            "end": { "dateTime": end.to_rfc3339(), "timeZone": "UTC" },
        });

        let response = self
            .http
            .post(self.events_endpoint())
            .bearer_auth(token.expose_secret())
            .json(&event)
            .send()
            .await
            .map_err(|error| BookingError::Network(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BookingError::Api { status: status.as_u16(), message });
        }

        let resource = response
            .json::<EventResource>()
            .await
            .map_err(|error| BookingError::Network(error.to_string()))?;

        info!(
            event_name = "google.calendar.booked",
            summary = %request.summary,
            start = %start.to_rfc3339(),
            "calendar event created"
        );

        Ok(BookingConfirmation { event_link: resource.html_link })
    }
}
