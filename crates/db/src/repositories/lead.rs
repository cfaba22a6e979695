use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use tracing::debug;

use leadneedle_core::domain::lead::{Lead, LeadPayload, NewLead};
use leadneedle_core::errors::StoreError;
use leadneedle_core::ports::LeadStore;

use super::{LeadRepository, RepositoryError};
use crate::DbPool;

pub struct SqlLeadRepository {
    pool: DbPool,
}

impl SqlLeadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadRepository for SqlLeadRepository {
    async fn insert(&self, lead: NewLead) -> Result<i64, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO lead (lead_name, lead_phone, qualification_responses, appointment_date, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&lead.name)
        .bind(&lead.phone)
        .bind(&lead.qualification_responses)
        .bind(&lead.appointment_date)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn find_by_id(&self, lead_id: i64) -> Result<Option<Lead>, RepositoryError> {
        let row = sqlx::query(
            "SELECT lead_id, lead_name, lead_phone, qualification_responses, appointment_date, created_at
             FROM lead
             WHERE lead_id = ?",
        )
        .bind(lead_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(lead_from_row).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Lead>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT lead_id, lead_name, lead_phone, qualification_responses, appointment_date, created_at
             FROM lead
             ORDER BY created_at ASC, lead_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(lead_from_row).collect()
    }
}

#[async_trait]
impl LeadStore for SqlLeadRepository {
    async fn save(&self, caller_id: &str, payload: LeadPayload) -> Result<(), StoreError> {
        let lead = NewLead::from_payload(caller_id, &payload);
        let lead_id = LeadRepository::insert(self, lead)
            .await
            .map_err(|error| StoreError::Database(error.to_string()))?;
        debug!(
            event_name = "db.lead.saved",
            caller_id = %caller_id,
            lead_id,
            "lead responses saved"
        );
        Ok(())
    }
}

fn lead_from_row(row: SqliteRow) -> Result<Lead, RepositoryError> {
    Ok(Lead {
        id: row.try_get("lead_id")?,
        name: row.try_get("lead_name")?,
        phone: row.try_get("lead_phone")?,
        qualification_responses: row.try_get("qualification_responses")?,
        appointment_date: row.try_get("appointment_date")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

#[cfg(test)]
mod tests {
    use leadneedle_core::domain::lead::{LeadPayload, NewLead};
    use leadneedle_core::ports::LeadStore;

    use super::SqlLeadRepository;
    use crate::migrations;
    use crate::repositories::LeadRepository;
    use crate::{connect_with_settings, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    #[tokio::test]
    async fn insert_and_find_round_trip() {
        let pool = setup_pool().await;
        let repo = SqlLeadRepository::new(pool.clone());

        let lead_id = repo
            .insert(NewLead {
                name: "Dana".to_string(),
                phone: "+15550001111".to_string(),
                qualification_responses: "[\"hi\", \"hello\"]".to_string(),
                appointment_date: "2026-08-07 10:00 AM".to_string(),
            })
            .await
            .expect("insert lead");

        let found = repo.find_by_id(lead_id).await.expect("find lead").expect("lead exists");
        assert_eq!(found.name, "Dana");
        assert_eq!(found.phone, "+15550001111");
        assert_eq!(found.appointment_date, "2026-08-07 10:00 AM");

        pool.close().await;
    }

    #[tokio::test]
    async fn lead_store_save_inserts_unknown_lead_keyed_by_caller() {
        let pool = setup_pool().await;
        let repo = SqlLeadRepository::new(pool.clone());

        repo.save("+15551234567", LeadPayload::exchange("need a deck quote", "What size?"))
            .await
            .expect("save via port");

        let all = repo.list_all().await.expect("list leads");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Unknown");
        assert_eq!(all[0].phone, "+15551234567");
        assert!(all[0].qualification_responses.contains("need a deck quote"));

        pool.close().await;
    }
}
