use crate::commands::CommandResult;
use leadneedle_core::config::{AppConfig, LoadOptions};
use leadneedle_db::{connect_with_settings, migrations};

struct CommandFailure {
    error_class: &'static str,
    message: String,
    exit_code: u8,
}

pub fn run() -> CommandResult {
    match apply_pending() {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err(failure) => CommandResult::failure(
            "migrate",
            failure.error_class,
            failure.message,
            failure.exit_code,
        ),
    }
}

fn apply_pending() -> Result<(), CommandFailure> {
    let config = AppConfig::load(LoadOptions::default()).map_err(|error| CommandFailure {
        error_class: "config_validation",
        message: format!("configuration issue: {error}"),
        exit_code: 2,
    })?;

    let runtime =
        tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
            CommandFailure {
                error_class: "runtime_init",
                message: format!("failed to initialize async runtime: {error}"),
                exit_code: 3,
            }
        })?;

    runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| CommandFailure {
            error_class: "db_connectivity",
            message: error.to_string(),
            exit_code: 4,
        })?;

        let applied = migrations::run_pending(&pool).await;
        pool.close().await;
        applied.map_err(|error| CommandFailure {
            error_class: "migration",
            message: error.to_string(),
            exit_code: 5,
        })
    })
}
