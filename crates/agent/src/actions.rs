use serde_json::{Map, Value};

/// A single structured action decoded from a completion reply.
#[derive(Clone, Debug, PartialEq)]
pub enum ActionRequest {
    ScheduleAppointment { time: Option<String> },
    QuoteJob { job_type: Option<String>, square_footage: Option<f64> },
    SendReply { message: String },
    StoreLead(Map<String, Value>),
    /// Missing or unrecognized tool tag. Carries the raw tag for logging.
    Fallback { tool: String },
}

/// Classification of one completion reply.
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedReply {
    Plain(String),
    Action(ActionRequest),
}

/// Classify a completion reply as plain text or a structured action.
///
/// Only text that is entirely a single JSON object (after trimming) is
/// considered structured. Delimited text that fails to parse as JSON is
/// still a plain reply - customers get whatever the model said, and a
/// decode problem never becomes a dispatch failure.
pub fn parse_completion_reply(reply: &str) -> ParsedReply {
    let trimmed = reply.trim();
    if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
        return ParsedReply::Plain(trimmed.to_string());
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => ParsedReply::Action(decode_action(value)),
        Err(_) => ParsedReply::Plain(trimmed.to_string()),
    }
}

fn decode_action(value: Value) -> ActionRequest {
    let tool = value.get("tool").and_then(Value::as_str).unwrap_or_default().to_string();
    let parameters = value
        .get("parameters")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    match tool.as_str() {
        "calendar_event" => ActionRequest::ScheduleAppointment {
            time: string_param(&parameters, "time"),
        },
        "quote_lead" => ActionRequest::QuoteJob {
            job_type: string_param(&parameters, "job_type"),
            square_footage: number_param(&parameters, "square_footage"),
        },
        "sms_reply" => ActionRequest::SendReply {
            message: string_param(&parameters, "message").unwrap_or_default(),
        },
        "store_lead" => ActionRequest::StoreLead(parameters),
        _ => ActionRequest::Fallback { tool },
    }
}

fn string_param(parameters: &Map<String, Value>, key: &str) -> Option<String> {
    parameters.get(key).and_then(Value::as_str).map(|value| value.to_string())
}

/// Numeric parameters arrive as JSON numbers, but models occasionally quote
/// them; accept both.
fn number_param(parameters: &Map<String, Value>, key: &str) -> Option<f64> {
    match parameters.get(key) {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(raw)) => raw.trim().parse::<f64>().ok(),
        _ => None,
    }
}
