use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{info, warn};

use leadneedle_core::config::TwilioConfig;
use leadneedle_core::errors::SmsError;
use leadneedle_core::ports::SmsSender;

const TWILIO_API_BASE: &str = "https://api.twilio.com";
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Sends messages through a Twilio messaging service. The messaging
/// service SID replaces a fixed `From` number so Twilio picks the sender.
pub struct TwilioSmsSender {
    http: reqwest::Client,
    base_url: String,
    account_sid: String,
    auth_token: SecretString,
    messaging_service_sid: String,
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
}

impl TwilioSmsSender {
    pub fn new(config: &TwilioConfig) -> Self {
        Self::with_base_url(config, TWILIO_API_BASE)
    }

    pub fn with_base_url(config: &TwilioConfig, base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            messaging_service_sid: config.messaging_service_sid.clone(),
        }
    }

    fn messages_endpoint(&self) -> String {
        format!("{}/2010-04-01/Accounts/{}/Messages.json", self.base_url, self.account_sid)
    }
}

#[async_trait]
impl SmsSender for TwilioSmsSender {
    async fn send(&self, to: &str, body: &str) -> Result<(), SmsError> {
        let params = [
            ("To", to),
            ("Body", body),
            ("MessagingServiceSid", self.messaging_service_sid.as_str()),
        ];

        let response = self
            .http
            .post(self.messages_endpoint())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&params)
            .send()
            .await
            .map_err(|error| SmsError::Network(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(
                event_name = "sms.send.rejected",
                to = %to,
                status = status.as_u16(),
                "carrier rejected outbound sms"
            );
            return Err(SmsError::Api { status: status.as_u16(), message });
        }

        let message_sid = response
            .json::<MessageResource>()
            .await
            .map(|resource| resource.sid)
            .unwrap_or_else(|_| "unknown".to_string());
        info!(
            event_name = "sms.send.accepted",
            to = %to,
            message_sid = %message_sid,
            "outbound sms accepted by carrier"
        );

        Ok(())
    }
}
