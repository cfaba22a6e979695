use chrono::{DateTime, Utc};

/// One inbound message plus the identity of its reply channel.
///
/// Created per inbound message and dropped when dispatch completes; any
/// cross-message continuity comes from the lead store, not from here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationTurn {
    pub caller_id: String,
    pub inbound_text: String,
    pub received_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(caller_id: impl Into<String>, inbound_text: impl Into<String>) -> Self {
        Self {
            caller_id: caller_id.into(),
            inbound_text: inbound_text.into(),
            received_at: Utc::now(),
        }
    }
}
