use thiserror::Error;

/// Failure talking to the language-model completion service.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CompletionError {
    #[error("completion request rejected with status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("completion request timed out")]
    Timeout,
    #[error("completion transport failure: {0}")]
    Network(String),
    #[error("completion response contained no reply text")]
    EmptyReply,
}

/// Failure sending an outbound SMS through the carrier API.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SmsError {
    #[error("sms request rejected with status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("sms transport failure: {0}")]
    Network(String),
}

/// Failure persisting a lead record.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("lead store failure: {0}")]
    Database(String),
    #[error("lead payload could not be serialized: {0}")]
    Serialization(String),
}

/// Failure booking a calendar slot.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BookingError {
    #[error("calendar authorization failed: {0}")]
    Auth(String),
    #[error("calendar request rejected with status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("calendar transport failure: {0}")]
    Network(String),
}
