//! Capability ports consumed by the conversation dispatcher.
//!
//! Each port is a narrow contract over an external collaborator (carrier
//! API, lead store, calendar). Concrete adapters live in sibling crates;
//! tests substitute in-memory doubles.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::lead::LeadPayload;
use crate::errors::{BookingError, SmsError, StoreError};

#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<(), SmsError>;
}

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn save(&self, caller_id: &str, payload: LeadPayload) -> Result<(), StoreError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingRequest {
    pub summary: String,
    pub description: String,
    /// Defaults to one hour from now when absent; the scheduler decides.
    pub start_time: Option<DateTime<Utc>>,
    pub duration_minutes: u32,
}

impl BookingRequest {
    pub const DEFAULT_DURATION_MINUTES: u32 = 30;

    pub fn auto_booked(caller_id: &str) -> Self {
        Self {
            summary: "Lead Needle Appointment".to_string(),
            description: format!("Auto-booked lead from {caller_id}"),
            start_time: None,
            duration_minutes: Self::DEFAULT_DURATION_MINUTES,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookingConfirmation {
    pub event_link: String,
}

#[async_trait]
pub trait AppointmentScheduler: Send + Sync {
    async fn book(&self, request: BookingRequest) -> Result<BookingConfirmation, BookingError>;
}
