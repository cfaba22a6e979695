use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub twilio: TwilioConfig,
    pub llm: LlmConfig,
    pub mailer: MailerConfig,
    pub google: GoogleConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    pub messaging_service_sid: String,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub model: String,
    pub temperature: f64,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct MailerConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub sender_address: String,
    pub sender_password: SecretString,
    pub admin_address: String,
    pub max_attempts: u32,
    pub poll_interval_ms: u64,
    pub backoff_base_ms: u64,
    pub shutdown_grace_secs: u64,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct GoogleConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub refresh_token: Option<SecretString>,
    pub calendar_id: String,
    pub spreadsheet_id: Option<String>,
    pub sheet_name: String,
}

impl GoogleConfig {
    pub fn is_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some() && self.refresh_token.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_messaging_service_sid: Option<String>,
    pub sender_address: Option<String>,
    pub sender_password: Option<String>,
    pub admin_address: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://leadneedle.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            twilio: TwilioConfig {
                account_sid: String::new(),
                auth_token: String::new().into(),
                messaging_service_sid: String::new(),
            },
            llm: LlmConfig {
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: None,
                model: "gpt-4-turbo".to_string(),
                temperature: 0.5,
                timeout_secs: 30,
            },
            mailer: MailerConfig {
                smtp_host: "smtp.gmail.com".to_string(),
                smtp_port: 465,
                sender_address: String::new(),
                sender_password: String::new().into(),
                admin_address: String::new(),
                max_attempts: 3,
                poll_interval_ms: 1_000,
                backoff_base_ms: 1_000,
                shutdown_grace_secs: 5,
                timeout_secs: 30,
            },
            google: GoogleConfig {
                client_id: None,
                client_secret: None,
                refresh_token: None,
                calendar_id: "primary".to_string(),
                spreadsheet_id: None,
                sheet_name: "Submissions".to_string(),
            },
            server: ServerConfig {
                bind_address: "0.0.0.0".to_string(),
                port: 10_000,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("leadneedle.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(twilio) = patch.twilio {
            if let Some(account_sid) = twilio.account_sid {
                self.twilio.account_sid = account_sid;
            }
            if let Some(auth_token_value) = twilio.auth_token {
                self.twilio.auth_token = secret_value(auth_token_value);
            }
            if let Some(messaging_service_sid) = twilio.messaging_service_sid {
                self.twilio.messaging_service_sid = messaging_service_sid;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(mailer) = patch.mailer {
            if let Some(smtp_host) = mailer.smtp_host {
                self.mailer.smtp_host = smtp_host;
            }
            if let Some(smtp_port) = mailer.smtp_port {
                self.mailer.smtp_port = smtp_port;
            }
            if let Some(sender_address) = mailer.sender_address {
                self.mailer.sender_address = sender_address;
            }
            if let Some(sender_password_value) = mailer.sender_password {
                self.mailer.sender_password = secret_value(sender_password_value);
            }
            if let Some(admin_address) = mailer.admin_address {
                self.mailer.admin_address = admin_address;
            }
            if let Some(max_attempts) = mailer.max_attempts {
                self.mailer.max_attempts = max_attempts;
            }
            if let Some(poll_interval_ms) = mailer.poll_interval_ms {
                self.mailer.poll_interval_ms = poll_interval_ms;
            }
            if let Some(backoff_base_ms) = mailer.backoff_base_ms {
                self.mailer.backoff_base_ms = backoff_base_ms;
            }
            if let Some(shutdown_grace_secs) = mailer.shutdown_grace_secs {
                self.mailer.shutdown_grace_secs = shutdown_grace_secs;
            }
            if let Some(timeout_secs) = mailer.timeout_secs {
                self.mailer.timeout_secs = timeout_secs;
            }
        }

        if let Some(google) = patch.google {
            if let Some(client_id) = google.client_id {
                self.google.client_id = Some(client_id);
            }
            if let Some(client_secret_value) = google.client_secret {
                self.google.client_secret = Some(secret_value(client_secret_value));
            }
            if let Some(refresh_token_value) = google.refresh_token {
                self.google.refresh_token = Some(secret_value(refresh_token_value));
            }
            if let Some(calendar_id) = google.calendar_id {
                self.google.calendar_id = calendar_id;
            }
            if let Some(spreadsheet_id) = google.spreadsheet_id {
                self.google.spreadsheet_id = Some(spreadsheet_id);
            }
            if let Some(sheet_name) = google.sheet_name {
                self.google.sheet_name = sheet_name;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LEADNEEDLE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("LEADNEEDLE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("LEADNEEDLE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("LEADNEEDLE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("LEADNEEDLE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("TWILIO_ACCOUNT_SID") {
            self.twilio.account_sid = value;
        }
        if let Some(value) = read_env("TWILIO_AUTH_TOKEN") {
            self.twilio.auth_token = secret_value(value);
        }
        if let Some(value) = read_env("TWILIO_MESSAGING_SERVICE_SID") {
            self.twilio.messaging_service_sid = value;
        }

        if let Some(value) = read_env("LEADNEEDLE_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        let llm_api_key =
            read_env("LEADNEEDLE_LLM_API_KEY").or_else(|| read_env("OPENAI_API_KEY"));
        if let Some(value) = llm_api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("LEADNEEDLE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("LEADNEEDLE_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f64("LEADNEEDLE_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("LEADNEEDLE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("LEADNEEDLE_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("LEADNEEDLE_SMTP_HOST") {
            self.mailer.smtp_host = value;
        }
        if let Some(value) = read_env("LEADNEEDLE_SMTP_PORT") {
            self.mailer.smtp_port = parse_u16("LEADNEEDLE_SMTP_PORT", &value)?;
        }
        if let Some(value) = read_env("SENDER_EMAIL") {
            self.mailer.sender_address = value;
        }
        if let Some(value) = read_env("SENDER_PASSWORD") {
            self.mailer.sender_password = secret_value(value);
        }
        if let Some(value) = read_env("LEADNEEDLE_ADMIN_EMAIL") {
            self.mailer.admin_address = value;
        }
        if let Some(value) = read_env("LEADNEEDLE_MAILER_MAX_ATTEMPTS") {
            self.mailer.max_attempts = parse_u32("LEADNEEDLE_MAILER_MAX_ATTEMPTS", &value)?;
        }

        if let Some(value) = read_env("GOOGLE_CLIENT_ID") {
            self.google.client_id = Some(value);
        }
        if let Some(value) = read_env("GOOGLE_CLIENT_SECRET") {
            self.google.client_secret = Some(secret_value(value));
        }
        if let Some(value) = read_env("GOOGLE_REFRESH_TOKEN") {
            self.google.refresh_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("LEADNEEDLE_GOOGLE_CALENDAR_ID") {
            self.google.calendar_id = value;
        }
        if let Some(value) = read_env("LEADNEEDLE_GOOGLE_SPREADSHEET_ID") {
            self.google.spreadsheet_id = Some(value);
        }
        if let Some(value) = read_env("LEADNEEDLE_GOOGLE_SHEET_NAME") {
            self.google.sheet_name = value;
        }

        if let Some(value) = read_env("LEADNEEDLE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        let server_port = read_env("LEADNEEDLE_SERVER_PORT").or_else(|| read_env("PORT"));
        if let Some(value) = server_port {
            self.server.port = parse_u16("LEADNEEDLE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("LEADNEEDLE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("LEADNEEDLE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("LEADNEEDLE_LOGGING_LEVEL").or_else(|| read_env("LEADNEEDLE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("LEADNEEDLE_LOGGING_FORMAT").or_else(|| read_env("LEADNEEDLE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(account_sid) = overrides.twilio_account_sid {
            self.twilio.account_sid = account_sid;
        }
        if let Some(auth_token) = overrides.twilio_auth_token {
            self.twilio.auth_token = secret_value(auth_token);
        }
        if let Some(messaging_service_sid) = overrides.twilio_messaging_service_sid {
            self.twilio.messaging_service_sid = messaging_service_sid;
        }
        if let Some(sender_address) = overrides.sender_address {
            self.mailer.sender_address = sender_address;
        }
        if let Some(sender_password) = overrides.sender_password {
            self.mailer.sender_password = secret_value(sender_password);
        }
        if let Some(admin_address) = overrides.admin_address {
            self.mailer.admin_address = admin_address;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_twilio(&self.twilio)?;
        validate_llm(&self.llm)?;
        validate_mailer(&self.mailer)?;
        validate_google(&self.google)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("leadneedle.toml"), PathBuf::from("config/leadneedle.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_twilio(twilio: &TwilioConfig) -> Result<(), ConfigError> {
    let account_sid = twilio.account_sid.trim();
    if account_sid.is_empty() {
        return Err(ConfigError::Validation(
            "twilio.account_sid is required. Get it from https://console.twilio.com > Account Info"
                .to_string(),
        ));
    }
    if !account_sid.starts_with("AC") {
        let hint = if account_sid.starts_with("SK") {
            " (hint: you may have used an API key SID instead of the account SID)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "twilio.account_sid must start with `AC`{hint}"
        )));
    }

    if twilio.auth_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "twilio.auth_token is required. Get it from https://console.twilio.com > Account Info"
                .to_string(),
        ));
    }

    let messaging_service_sid = twilio.messaging_service_sid.trim();
    if messaging_service_sid.is_empty() {
        return Err(ConfigError::Validation(
            "twilio.messaging_service_sid is required. Get it from https://console.twilio.com > Messaging > Services"
                .to_string(),
        ));
    }
    if !messaging_service_sid.starts_with("MG") {
        return Err(ConfigError::Validation(
            "twilio.messaging_service_sid must start with `MG`".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    let missing =
        llm.api_key.as_ref().map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true);
    if missing {
        return Err(ConfigError::Validation(
            "llm.api_key is required (set LEADNEEDLE_LLM_API_KEY or OPENAI_API_KEY)".to_string(),
        ));
    }

    Ok(())
}

fn validate_mailer(mailer: &MailerConfig) -> Result<(), ConfigError> {
    if mailer.smtp_host.trim().is_empty() {
        return Err(ConfigError::Validation("mailer.smtp_host must not be empty".to_string()));
    }
    if mailer.smtp_port == 0 {
        return Err(ConfigError::Validation(
            "mailer.smtp_port must be greater than zero".to_string(),
        ));
    }
    if !mailer.sender_address.contains('@') {
        return Err(ConfigError::Validation(
            "mailer.sender_address must be an email address (set SENDER_EMAIL)".to_string(),
        ));
    }
    if mailer.sender_password.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "mailer.sender_password is required (set SENDER_PASSWORD)".to_string(),
        ));
    }
    if !mailer.admin_address.contains('@') {
        return Err(ConfigError::Validation(
            "mailer.admin_address must be an email address (set LEADNEEDLE_ADMIN_EMAIL)"
                .to_string(),
        ));
    }
    if mailer.max_attempts == 0 {
        return Err(ConfigError::Validation(
            "mailer.max_attempts must be greater than zero".to_string(),
        ));
    }
    if mailer.poll_interval_ms == 0 {
        return Err(ConfigError::Validation(
            "mailer.poll_interval_ms must be greater than zero".to_string(),
        ));
    }
    if mailer.timeout_secs == 0 || mailer.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "mailer.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_google(google: &GoogleConfig) -> Result<(), ConfigError> {
    let any_credential = google.client_id.is_some()
        || google.client_secret.is_some()
        || google.refresh_token.is_some();
    if any_credential && !google.is_configured() {
        return Err(ConfigError::Validation(
            "google credentials are partially configured: client_id, client_secret, and refresh_token must all be set"
                .to_string(),
        ));
    }

    if google.calendar_id.trim().is_empty() {
        return Err(ConfigError::Validation("google.calendar_id must not be empty".to_string()));
    }
    if google.sheet_name.trim().is_empty() {
        return Err(ConfigError::Validation("google.sheet_name must not be empty".to_string()));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    twilio: Option<TwilioPatch>,
    llm: Option<LlmPatch>,
    mailer: Option<MailerPatch>,
    google: Option<GooglePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TwilioPatch {
    account_sid: Option<String>,
    auth_token: Option<String>,
    messaging_service_sid: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    base_url: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    temperature: Option<f64>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MailerPatch {
    smtp_host: Option<String>,
    smtp_port: Option<u16>,
    sender_address: Option<String>,
    sender_password: Option<String>,
    admin_address: Option<String>,
    max_attempts: Option<u32>,
    poll_interval_ms: Option<u64>,
    backoff_base_ms: Option<u64>,
    shutdown_grace_secs: Option<u64>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct GooglePatch {
    client_id: Option<String>,
    client_secret: Option<String>,
    refresh_token: Option<String>,
    calendar_id: Option<String>,
    spreadsheet_id: Option<String>,
    sheet_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
