//! In-memory repository doubles for tests and the smoke command.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use leadneedle_core::domain::lead::{Lead, LeadPayload, NewLead};
use leadneedle_core::errors::StoreError;
use leadneedle_core::ports::LeadStore;

use super::{LeadRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryLeadRepository {
    leads: Mutex<Vec<Lead>>,
}

impl InMemoryLeadRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeadRepository for InMemoryLeadRepository {
    async fn insert(&self, lead: NewLead) -> Result<i64, RepositoryError> {
        let mut leads = self.leads.lock().expect("lead lock poisoned");
        let id = leads.len() as i64 + 1;
        leads.push(Lead {
            id,
            name: lead.name,
            phone: lead.phone,
            qualification_responses: lead.qualification_responses,
            appointment_date: lead.appointment_date,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn find_by_id(&self, lead_id: i64) -> Result<Option<Lead>, RepositoryError> {
        let leads = self.leads.lock().expect("lead lock poisoned");
        Ok(leads.iter().find(|lead| lead.id == lead_id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Lead>, RepositoryError> {
        let leads = self.leads.lock().expect("lead lock poisoned");
        Ok(leads.clone())
    }
}

#[async_trait]
impl LeadStore for InMemoryLeadRepository {
    async fn save(&self, caller_id: &str, payload: LeadPayload) -> Result<(), StoreError> {
        let lead = NewLead::from_payload(caller_id, &payload);
        LeadRepository::insert(self, lead)
            .await
            .map(|_| ())
            .map_err(|error| StoreError::Database(error.to_string()))
    }
}
