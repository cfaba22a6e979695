use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::commands::CommandResult;
use leadneedle_core::config::{AppConfig, LoadOptions};
use leadneedle_db::{connect_with_settings, migrations};
use leadneedle_mailer::{
    DeliveryQueue, DeliveryQueueConfig, EmailJob, EmailKind, MemoryMailTransport, SenderIdentity,
};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

pub fn run() -> CommandResult {
    let started = Instant::now();
    let mut checks = Vec::new();

    let config_started = Instant::now();
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Pass,
                elapsed_ms: config_started.elapsed().as_millis() as u64,
                message: "configuration loaded and validated".to_string(),
            });
            config
        }
        Err(error) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Fail,
                elapsed_ms: config_started.elapsed().as_millis() as u64,
                message: error.to_string(),
            });
            checks.push(skipped("db_connectivity"));
            checks.push(skipped("migration_visibility"));
            checks.push(skipped("mail_queue_round_trip"));
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            checks.push(SmokeCheck {
                name: "db_connectivity",
                status: SmokeStatus::Fail,
                elapsed_ms: 0,
                message: format!("failed to initialize async runtime: {error}"),
            });
            checks.push(skipped("migration_visibility"));
            checks.push(skipped("mail_queue_round_trip"));
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    let db_started = Instant::now();
    let pool = match runtime.block_on(connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )) {
        Ok(pool) => {
            checks.push(SmokeCheck {
                name: "db_connectivity",
                status: SmokeStatus::Pass,
                elapsed_ms: db_started.elapsed().as_millis() as u64,
                message: "database connection established".to_string(),
            });
            Some(pool)
        }
        Err(error) => {
            checks.push(SmokeCheck {
                name: "db_connectivity",
                status: SmokeStatus::Fail,
                elapsed_ms: db_started.elapsed().as_millis() as u64,
                message: error.to_string(),
            });
            None
        }
    };

    match pool {
        Some(pool) => {
            let migration_started = Instant::now();
            let migration_result = runtime.block_on(async {
                let result = migrations::run_pending(&pool).await;
                pool.close().await;
                result
            });
            checks.push(match migration_result {
                Ok(()) => SmokeCheck {
                    name: "migration_visibility",
                    status: SmokeStatus::Pass,
                    elapsed_ms: migration_started.elapsed().as_millis() as u64,
                    message: "pending migrations applied".to_string(),
                },
                Err(error) => SmokeCheck {
                    name: "migration_visibility",
                    status: SmokeStatus::Fail,
                    elapsed_ms: migration_started.elapsed().as_millis() as u64,
                    message: error.to_string(),
                },
            });
        }
        None => checks.push(skipped("migration_visibility")),
    }

    // Exercises the real worker machinery against an in-memory transport:
    // enqueue, lazy worker start, drain, clean shutdown.
    let queue_started = Instant::now();
    let queue_result = runtime.block_on(async {
        let transport = Arc::new(MemoryMailTransport::new());
        let queue = DeliveryQueue::new(
            transport.clone(),
            DeliveryQueueConfig {
                poll_interval: Duration::from_millis(5),
                backoff_base: Duration::from_millis(1),
                shutdown_grace: Duration::from_millis(500),
            },
        );

        queue.enqueue(EmailJob::new(
            EmailKind::Custom,
            "smoke@example.invalid",
            "Leadneedle smoke check",
            "<p>smoke</p>",
            SenderIdentity {
                address: "smoke@example.invalid".to_string(),
                secret: "unused".to_string().into(),
            },
        ));

        let drained = queue.drain_and_wait(Duration::from_secs(5)).await;
        let stopped = queue.shutdown().await;
        let delivered = transport.delivered().len();

        if drained && stopped && delivered == 1 {
            Ok(())
        } else {
            Err(format!(
                "queue round trip incomplete (drained={drained}, stopped={stopped}, delivered={delivered})"
            ))
        }
    });
    checks.push(match queue_result {
        Ok(()) => SmokeCheck {
            name: "mail_queue_round_trip",
            status: SmokeStatus::Pass,
            elapsed_ms: queue_started.elapsed().as_millis() as u64,
            message: "delivery worker processed a job and stopped cleanly".to_string(),
        },
        Err(message) => SmokeCheck {
            name: "mail_queue_round_trip",
            status: SmokeStatus::Fail,
            elapsed_ms: queue_started.elapsed().as_millis() as u64,
            message,
        },
    });

    finalize_report(checks, started.elapsed().as_millis() as u64)
}

fn skipped(name: &'static str) -> SmokeCheck {
    SmokeCheck {
        name,
        status: SmokeStatus::Skipped,
        elapsed_ms: 0,
        message: "skipped because a prerequisite check failed".to_string(),
    }
}

fn finalize_report(checks: Vec<SmokeCheck>, total_elapsed_ms: u64) -> CommandResult {
    let all_pass = checks.iter().all(|check| check.status == SmokeStatus::Pass);
    let status = if all_pass { SmokeStatus::Pass } else { SmokeStatus::Fail };
    let summary = if all_pass {
        "smoke: all readiness checks passed".to_string()
    } else {
        "smoke: one or more readiness checks failed".to_string()
    };

    let report = SmokeReport { command: "smoke", status, summary, total_elapsed_ms, checks };
    let output = serde_json::to_string_pretty(&report)
        .unwrap_or_else(|error| format!("smoke serialization failed: {error}"));

    CommandResult { exit_code: if all_pass { 0 } else { 1 }, output }
}
