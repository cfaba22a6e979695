use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::job::EmailJob;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("recipients refused: {recipients:?}")]
    RecipientsRefused { recipients: Vec<String> },
    #[error("connection failure: {0}")]
    Connection(String),
    #[error("protocol failure: {0}")]
    Protocol(String),
    #[error("unexpected transport failure: {0}")]
    Unexpected(String),
}

impl TransportError {
    /// Terminal errors must not be retried; they will fail identically on
    /// every attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::RecipientsRefused { .. })
    }
}

/// Fully addressed message handed to a transport session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub date: DateTime<Utc>,
    pub message_id: String,
    pub body_html: String,
}

impl MailMessage {
    pub fn from_job(job: &EmailJob) -> Self {
        let domain = job.sender.address.split('@').nth(1).unwrap_or("leadneedle.local");
        Self {
            from: job.sender.address.clone(),
            to: job.recipient.clone(),
            subject: job.subject.clone(),
            date: Utc::now(),
            message_id: format!("<{}@{}>", Uuid::new_v4(), domain),
            body_html: job.body_html.clone(),
        }
    }
}

/// Opens one fresh session per delivery attempt.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn MailSession>, TransportError>;
}

/// One connected submission session. `submit` returns the recipients the
/// server refused; an empty list means full acceptance.
#[async_trait]
pub trait MailSession: Send {
    async fn authenticate(&mut self, identity: &str, secret: &str) -> Result<(), TransportError>;
    async fn submit(&mut self, message: &MailMessage) -> Result<Vec<String>, TransportError>;
    async fn close(&mut self) -> Result<(), TransportError>;
}
