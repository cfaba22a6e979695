use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use leadneedle_agent::{Dispatcher, OpenAiCompletionClient};
use leadneedle_core::config::{AppConfig, ConfigError, LoadOptions};
use leadneedle_core::errors::BookingError;
use leadneedle_core::ports::{AppointmentScheduler, BookingConfirmation, BookingRequest};
use leadneedle_db::repositories::SqlLeadRepository;
use leadneedle_db::{connect_with_settings, migrations, DbPool};
use leadneedle_google::{CalendarScheduler, OauthTokenProvider, SheetsClient};
use leadneedle_mailer::{
    DeliveryQueue, DeliveryQueueConfig, SenderIdentity, SmtpMailTransport,
};
use leadneedle_sms::TwilioSmsSender;

use crate::routes::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("google auth initialization failed: {0}")]
    GoogleAuth(#[source] leadneedle_google::GoogleAuthError),
}

/// Placeholder scheduler used when no Google credentials are configured.
/// Booking becomes a logged no-op failure, which the dispatcher already
/// treats as best-effort.
struct UnconfiguredScheduler;

#[async_trait]
impl AppointmentScheduler for UnconfiguredScheduler {
    async fn book(&self, _request: BookingRequest) -> Result<BookingConfirmation, BookingError> {
        Err(BookingError::Auth("google calendar is not configured".to_string()))
    }
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let leads = Arc::new(SqlLeadRepository::new(db_pool.clone()));
    let sms = Arc::new(TwilioSmsSender::new(&config.twilio));
    let llm = Arc::new(OpenAiCompletionClient::from_config(&config.llm));

    let (scheduler, sheets): (Arc<dyn AppointmentScheduler>, Option<Arc<SheetsClient>>) =
        if config.google.is_configured() {
            let auth = Arc::new(
                OauthTokenProvider::from_config(&config.google)
                    .map_err(BootstrapError::GoogleAuth)?,
            );
            let scheduler: Arc<dyn AppointmentScheduler> =
                Arc::new(CalendarScheduler::new(auth.clone(), config.google.calendar_id.clone()));
            let sheets = config
                .google
                .spreadsheet_id
                .clone()
                .map(|spreadsheet_id| Arc::new(SheetsClient::new(auth, spreadsheet_id)));
            (scheduler, sheets)
        } else {
            warn!(
                event_name = "system.bootstrap.google_unconfigured",
                correlation_id = "bootstrap",
                "google credentials absent, calendar booking and sheets append disabled"
            );
            (Arc::new(UnconfiguredScheduler), None)
        };

    let dispatcher = Arc::new(Dispatcher::new(llm, sms, leads, scheduler));

    let transport = Arc::new(SmtpMailTransport::from_config(&config.mailer));
    let queue = Arc::new(DeliveryQueue::new(
        transport,
        DeliveryQueueConfig::from_config(&config.mailer),
    ));

    let state = AppState {
        dispatcher,
        queue,
        sheets,
        sheet_name: config.google.sheet_name.clone(),
        admin_address: config.mailer.admin_address.clone(),
        sender: SenderIdentity {
            address: config.mailer.sender_address.clone(),
            secret: config.mailer.sender_password.clone(),
        },
    };

    Ok(Application { config, db_pool, state })
}
