use leadneedle_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use serde_json::json;

const REDACTED: &str = "<redacted>";
const UNSET: &str = "<unset>";

/// Prints the effective configuration with every secret redacted. Presence
/// of a secret is still visible so operators can tell "missing" from
/// "wrong".
pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return serde_json::to_string_pretty(&json!({
                "command": "config",
                "status": "error",
                "message": error.to_string(),
            }))
            .unwrap_or_else(|_| error.to_string());
        }
    };

    let snapshot = json!({
        "database": {
            "url": config.database.url,
            "max_connections": config.database.max_connections,
            "timeout_secs": config.database.timeout_secs,
        },
        "twilio": {
            "account_sid": config.twilio.account_sid,
            "auth_token": redact_present(!config.twilio.auth_token.expose_secret().is_empty()),
            "messaging_service_sid": config.twilio.messaging_service_sid,
        },
        "llm": {
            "base_url": config.llm.base_url,
            "api_key": redact_present(config.llm.api_key.is_some()),
            "model": config.llm.model,
            "temperature": config.llm.temperature,
            "timeout_secs": config.llm.timeout_secs,
        },
        "mailer": {
            "smtp_host": config.mailer.smtp_host,
            "smtp_port": config.mailer.smtp_port,
            "sender_address": config.mailer.sender_address,
            "sender_password": redact_present(
                !config.mailer.sender_password.expose_secret().is_empty()
            ),
            "admin_address": config.mailer.admin_address,
            "max_attempts": config.mailer.max_attempts,
            "poll_interval_ms": config.mailer.poll_interval_ms,
            "backoff_base_ms": config.mailer.backoff_base_ms,
        },
        "google": {
            "client_id": config.google.client_id.clone().unwrap_or_else(|| UNSET.to_string()),
            "client_secret": redact_present(config.google.client_secret.is_some()),
            "refresh_token": redact_present(config.google.refresh_token.is_some()),
            "calendar_id": config.google.calendar_id,
            "spreadsheet_id": config.google.spreadsheet_id.clone().unwrap_or_else(|| UNSET.to_string()),
            "sheet_name": config.google.sheet_name,
        },
        "server": {
            "bind_address": config.server.bind_address,
            "port": config.server.port,
            "graceful_shutdown_secs": config.server.graceful_shutdown_secs,
        },
        "logging": {
            "level": config.logging.level,
            "format": config.logging.format,
        },
    });

    serde_json::to_string_pretty(&snapshot).unwrap_or_else(|error| error.to_string())
}

fn redact_present(present: bool) -> &'static str {
    if present {
        REDACTED
    } else {
        UNSET
    }
}
