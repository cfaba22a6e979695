//! Delivery Queue - durable in-process email delivery, decoupled from the
//! request that enqueued it.
//!
//! Jobs move `Queued -> Sending -> { Sent | Retrying -> Sending | Failed }`.
//! One background worker drains the FIFO; every attempt opens a fresh
//! transport session. Authentication failures and refused recipients are
//! terminal; everything else retries with exponential backoff up to the
//! job's attempt budget.

pub mod job;
pub mod memory;
pub mod queue;
pub mod smtp;
pub mod templates;
pub mod transport;

pub use job::{DeliveryState, EmailJob, EmailKind, SenderIdentity};
pub use memory::MemoryMailTransport;
pub use queue::{DeliveryQueue, DeliveryQueueConfig, QueueStats};
pub use smtp::SmtpMailTransport;
pub use templates::{confirmation_email, notification_email, TemplateError};
pub use transport::{MailMessage, MailSession, MailTransport, TransportError};
