use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What gets persisted for a caller: either one question/answer exchange
/// from the dispatcher, or an arbitrary parameter mapping from a
/// `store_lead` action.
#[derive(Clone, Debug, PartialEq)]
pub enum LeadPayload {
    Exchange { input: String, reply: String },
    Fields(Map<String, Value>),
}

impl LeadPayload {
    pub fn exchange(input: impl Into<String>, reply: impl Into<String>) -> Self {
        Self::Exchange { input: input.into(), reply: reply.into() }
    }

    /// Wire form: an exchange is a two-element array, fields stay an object.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Exchange { input, reply } => {
                Value::Array(vec![Value::String(input.clone()), Value::String(reply.clone())])
            }
            Self::Fields(fields) => Value::Object(fields.clone()),
        }
    }
}

/// A stored lead row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub qualification_responses: String,
    pub appointment_date: String,
    pub created_at: DateTime<Utc>,
}

/// A lead row about to be inserted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewLead {
    pub name: String,
    pub phone: String,
    pub qualification_responses: String,
    pub appointment_date: String,
}

impl NewLead {
    /// Shape used by the dispatcher's lead-store port: unknown name, the
    /// caller's phone as channel identity, appointment still to be set.
    pub fn from_payload(caller_id: &str, payload: &LeadPayload) -> Self {
        let responses = serde_json::to_string_pretty(&payload.to_json())
            .unwrap_or_else(|_| payload.to_json().to_string());
        Self {
            name: "Unknown".to_string(),
            phone: caller_id.to_string(),
            qualification_responses: responses,
            appointment_date: "TBD".to_string(),
        }
    }
}

/// A web-form submission as accepted by the form routes. Field names match
/// the frontend payload; unknown extra fields are dropped at the route.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSubmission {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub website_name: String,
    #[serde(default)]
    pub website_description: String,
    #[serde(default)]
    pub has_website: String,
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub submitted_at: String,
}

impl FormSubmission {
    /// Row shape appended to the submissions spreadsheet.
    pub fn as_sheet_row(&self) -> Vec<String> {
        vec![
            self.submitted_at.clone(),
            self.first_name.clone(),
            self.email.clone(),
            self.phone_number.clone(),
            self.has_website.clone(),
            self.website_name.clone(),
            self.website_description.clone(),
        ]
    }
}
