use chrono::{DateTime, Utc};
use secrecy::SecretString;
use uuid::Uuid;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmailKind {
    Notification,
    Confirmation,
    Custom,
}

impl EmailKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Notification => "notification",
            Self::Confirmation => "confirmation",
            Self::Custom => "custom",
        }
    }
}

/// Lifecycle of one job inside the queue. `Sent` and `Failed` are terminal;
/// the queue keeps only aggregate counters afterwards, never job history.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryState {
    Queued,
    Sending,
    Retrying,
    Sent,
    Failed,
}

impl DeliveryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Sending => "sending",
            Self::Retrying => "retrying",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }
}

/// Credentials the transport authenticates with for a given job.
#[derive(Clone, Debug)]
pub struct SenderIdentity {
    pub address: String,
    pub secret: SecretString,
}

/// One outbound email, owned exclusively by the queue from enqueue until a
/// terminal state. Only the worker mutates `attempt_count`.
#[derive(Clone, Debug)]
pub struct EmailJob {
    pub id: Uuid,
    pub kind: EmailKind,
    pub recipient: String,
    pub subject: String,
    pub body_html: String,
    pub sender: SenderIdentity,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl EmailJob {
    pub fn new(
        kind: EmailKind,
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body_html: impl Into<String>,
        sender: SenderIdentity,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            recipient: recipient.into(),
            subject: subject.into(),
            body_html: body_html.into(),
            sender,
            attempt_count: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            enqueued_at: Utc::now(),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}
