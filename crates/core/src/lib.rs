pub mod config;
pub mod domain;
pub mod errors;
pub mod ports;

pub use chrono;

pub use domain::conversation::ConversationTurn;
pub use domain::lead::{FormSubmission, Lead, LeadPayload, NewLead};
pub use domain::quote::{estimate_quote, format_dollars, QuoteEstimate};
pub use errors::{BookingError, CompletionError, SmsError, StoreError};
pub use ports::{
    AppointmentScheduler, BookingConfirmation, BookingRequest, LeadStore, SmsSender,
};
