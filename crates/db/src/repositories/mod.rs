use async_trait::async_trait;
use thiserror::Error;

use leadneedle_core::domain::lead::{Lead, NewLead};

pub mod lead;
pub mod memory;

pub use lead::SqlLeadRepository;
pub use memory::InMemoryLeadRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn insert(&self, lead: NewLead) -> Result<i64, RepositoryError>;
    async fn find_by_id(&self, lead_id: i64) -> Result<Option<Lead>, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<Lead>, RepositoryError>;
}
