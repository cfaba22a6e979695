use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use leadneedle_core::domain::conversation::ConversationTurn;
use leadneedle_core::domain::lead::LeadPayload;
use leadneedle_core::domain::quote::{estimate_quote, format_dollars};
use leadneedle_core::ports::{AppointmentScheduler, BookingRequest, LeadStore, SmsSender};

use crate::actions::{parse_completion_reply, ActionRequest, ParsedReply};
use crate::llm::CompletionClient;
use crate::prompt::{APOLOGY_TEXT, FALLBACK_TEXT, SYSTEM_PROMPT};

/// Result of one dispatch, serialized with a `status` tag for the HTTP
/// surface.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    MessageSent {
        #[serde(skip_serializing_if = "Option::is_none")]
        reply: Option<String>,
    },
    AppointmentBooked {
        time: String,
    },
    QuoteSent {
        amount: f64,
    },
    LeadSaved,
    UnknownTool,
    Error {
        message: String,
    },
}

/// Turns one inbound message into at most one customer-visible reply and
/// at most one side-effecting action.
pub struct Dispatcher {
    llm: Arc<dyn CompletionClient>,
    sms: Arc<dyn SmsSender>,
    leads: Arc<dyn LeadStore>,
    scheduler: Arc<dyn AppointmentScheduler>,
}

impl Dispatcher {
    pub fn new(
        llm: Arc<dyn CompletionClient>,
        sms: Arc<dyn SmsSender>,
        leads: Arc<dyn LeadStore>,
        scheduler: Arc<dyn AppointmentScheduler>,
    ) -> Self {
        Self { llm, sms, leads, scheduler }
    }

    pub async fn handle_message(&self, caller_id: &str, inbound_text: &str) -> DispatchOutcome {
        let turn = ConversationTurn::new(caller_id, inbound_text);
        if turn.inbound_text.trim().is_empty() {
            return DispatchOutcome::Error { message: "inbound message is empty".to_string() };
        }

        match self.llm.complete(SYSTEM_PROMPT, &turn.inbound_text).await {
            Ok(reply) => match parse_completion_reply(&reply) {
                ParsedReply::Plain(text) => {
                    self.send_sms(caller_id, &text).await;
                    self.save_lead(caller_id, LeadPayload::exchange(&turn.inbound_text, &text))
                        .await;
                    info!(
                        event_name = "agent.dispatch.replied",
                        caller_id = %caller_id,
                        "plain reply relayed to caller"
                    );
                    DispatchOutcome::MessageSent { reply: Some(text) }
                }
                ParsedReply::Action(action) => self.handle_action(action, caller_id).await,
            },
            Err(error) => {
                warn!(
                    event_name = "agent.dispatch.completion_failed",
                    caller_id = %caller_id,
                    error = %error,
                    "completion service failure, sending apology"
                );
                self.send_sms(caller_id, APOLOGY_TEXT).await;
                DispatchOutcome::Error { message: error.to_string() }
            }
        }
    }

    async fn handle_action(&self, action: ActionRequest, caller_id: &str) -> DispatchOutcome {
        match action {
            ActionRequest::ScheduleAppointment { time } => {
                let time = time.unwrap_or_else(|| "TBD".to_string());
                if let Err(error) = self.scheduler.book(BookingRequest::auto_booked(caller_id)).await
                {
                    warn!(
                        event_name = "agent.action.booking_failed",
                        caller_id = %caller_id,
                        error = %error,
                        "appointment booking failed, confirmation still sent"
                    );
                }
                self.send_sms(caller_id, &format!("Appointment booked for {time}.")).await;
                info!(
                    event_name = "agent.action.appointment_booked",
                    caller_id = %caller_id,
                    time = %time,
                    "appointment flow completed"
                );
                DispatchOutcome::AppointmentBooked { time }
            }
            ActionRequest::QuoteJob { job_type, square_footage } => {
                let estimate = estimate_quote(job_type, square_footage);
                let text = format!(
                    "Estimated quote for {}: ${}",
                    estimate.job_type,
                    format_dollars(estimate.estimated_price)
                );
                self.send_sms(caller_id, &text).await;
                info!(
                    event_name = "agent.action.quote_sent",
                    caller_id = %caller_id,
                    job_type = %estimate.job_type,
                    amount = estimate.estimated_price,
                    "quote sent to caller"
                );
                DispatchOutcome::QuoteSent { amount: estimate.estimated_price }
            }
            ActionRequest::SendReply { message } => {
                self.send_sms(caller_id, &message).await;
                DispatchOutcome::MessageSent { reply: None }
            }
            ActionRequest::StoreLead(fields) => {
                self.save_lead(caller_id, LeadPayload::Fields(fields)).await;
                info!(
                    event_name = "agent.action.lead_saved",
                    caller_id = %caller_id,
                    "lead parameters stored"
                );
                DispatchOutcome::LeadSaved
            }
            ActionRequest::Fallback { tool } => {
                warn!(
                    event_name = "agent.action.unknown_tool",
                    caller_id = %caller_id,
                    tool = %tool,
                    "model requested unrecognized tool"
                );
                self.send_sms(caller_id, FALLBACK_TEXT).await;
                DispatchOutcome::UnknownTool
            }
        }
    }

    /// SMS delivery is best-effort: a carrier failure is logged, never
    /// propagated.
    async fn send_sms(&self, to: &str, body: &str) {
        if let Err(error) = self.sms.send(to, body).await {
            warn!(
                event_name = "agent.sms.send_failed",
                to = %to,
                error = %error,
                "outbound sms failed"
            );
        }
    }

    async fn save_lead(&self, caller_id: &str, payload: LeadPayload) {
        if let Err(error) = self.leads.save(caller_id, payload).await {
            warn!(
                event_name = "agent.lead.save_failed",
                caller_id = %caller_id,
                error = %error,
                "lead store failure"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::json;

    use leadneedle_core::domain::lead::LeadPayload;
    use leadneedle_core::errors::{BookingError, CompletionError, SmsError, StoreError};
    use leadneedle_core::ports::{
        AppointmentScheduler, BookingConfirmation, BookingRequest, LeadStore, SmsSender,
    };

    use super::{DispatchOutcome, Dispatcher};
    use crate::llm::CompletionClient;
    use crate::prompt::{APOLOGY_TEXT, FALLBACK_TEXT};

    struct StubCompletion {
        reply: Result<String, CompletionError>,
        calls: Mutex<u32>,
    }

    impl StubCompletion {
        fn replying(reply: &str) -> Self {
            Self { reply: Ok(reply.to_string()), calls: Mutex::new(0) }
        }

        fn failing(error: CompletionError) -> Self {
            Self { reply: Err(error), calls: Mutex::new(0) }
        }

        fn call_count(&self) -> u32 {
            *self.calls.lock().expect("call lock")
        }
    }

    #[async_trait]
    impl CompletionClient for StubCompletion {
        async fn complete(
            &self,
            _system_prompt: &str,
            _user_text: &str,
        ) -> Result<String, CompletionError> {
            *self.calls.lock().expect("call lock") += 1;
            self.reply.clone()
        }
    }

    #[derive(Default)]
    struct RecordingSms {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl RecordingSms {
        fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().expect("sms lock").clone()
        }
    }

    #[async_trait]
    impl SmsSender for RecordingSms {
        async fn send(&self, to: &str, body: &str) -> Result<(), SmsError> {
            self.sent.lock().expect("sms lock").push((to.to_string(), body.to_string()));
            if self.fail {
                return Err(SmsError::Network("carrier unreachable".to_string()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingLeads {
        saved: Mutex<Vec<(String, LeadPayload)>>,
    }

    impl RecordingLeads {
        fn saved(&self) -> Vec<(String, LeadPayload)> {
            self.saved.lock().expect("lead lock").clone()
        }
    }

    #[async_trait]
    impl LeadStore for RecordingLeads {
        async fn save(&self, caller_id: &str, payload: LeadPayload) -> Result<(), StoreError> {
            self.saved.lock().expect("lead lock").push((caller_id.to_string(), payload));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingScheduler {
        booked: Mutex<Vec<BookingRequest>>,
        fail: bool,
    }

    impl RecordingScheduler {
        fn booked(&self) -> Vec<BookingRequest> {
            self.booked.lock().expect("booking lock").clone()
        }
    }

    #[async_trait]
    impl AppointmentScheduler for RecordingScheduler {
        async fn book(
            &self,
            request: BookingRequest,
        ) -> Result<BookingConfirmation, BookingError> {
            self.booked.lock().expect("booking lock").push(request);
            if self.fail {
                return Err(BookingError::Network("calendar unreachable".to_string()));
            }
            Ok(BookingConfirmation { event_link: "https://calendar.example/evt-1".to_string() })
        }
    }

    struct Harness {
        dispatcher: Dispatcher,
        llm: Arc<StubCompletion>,
        sms: Arc<RecordingSms>,
        leads: Arc<RecordingLeads>,
        scheduler: Arc<RecordingScheduler>,
    }

    fn harness(llm: StubCompletion) -> Harness {
        harness_with(llm, RecordingSms::default(), RecordingScheduler::default())
    }

    fn harness_with(
        llm: StubCompletion,
        sms: RecordingSms,
        scheduler: RecordingScheduler,
    ) -> Harness {
        let llm = Arc::new(llm);
        let sms = Arc::new(sms);
        let leads = Arc::new(RecordingLeads::default());
        let scheduler = Arc::new(scheduler);
        let dispatcher = Dispatcher::new(
            llm.clone(),
            sms.clone(),
            leads.clone(),
            scheduler.clone(),
        );
        Harness { dispatcher, llm, sms, leads, scheduler }
    }

    #[tokio::test]
    async fn plain_reply_sends_exact_text_and_stores_exchange() {
        let harness = harness(StubCompletion::replying("What size is the deck?"));

        let outcome =
            harness.dispatcher.handle_message("+15551234567", "I need a deck quote").await;

        assert_eq!(
            outcome,
            DispatchOutcome::MessageSent { reply: Some("What size is the deck?".to_string()) }
        );
        assert_eq!(
            harness.sms.sent(),
            vec![("+15551234567".to_string(), "What size is the deck?".to_string())]
        );
        let saved = harness.leads.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, "+15551234567");
        assert_eq!(
            saved[0].1,
            LeadPayload::exchange("I need a deck quote", "What size is the deck?")
        );
    }

    #[tokio::test]
    async fn quote_action_computes_price_and_formats_sms() {
        let reply = json!({
            "tool": "quote_lead",
            "parameters": {"job_type": "decking", "square_footage": 1200}
        })
        .to_string();
        let harness = harness(StubCompletion::replying(&reply));

        let outcome = harness
            .dispatcher
            .handle_message("+15551234567", "I need a quote for a 1200 sqft deck")
            .await;

        assert_eq!(outcome, DispatchOutcome::QuoteSent { amount: 180.0 });
        assert_eq!(
            harness.sms.sent(),
            vec![("+15551234567".to_string(), "Estimated quote for decking: $180.0".to_string())]
        );
    }

    #[tokio::test]
    async fn quote_action_without_square_footage_yields_zero_quote() {
        let reply =
            json!({"tool": "quote_lead", "parameters": {"job_type": "roofing"}}).to_string();
        let harness = harness(StubCompletion::replying(&reply));

        let outcome = harness.dispatcher.handle_message("+15550000000", "quote me").await;

        assert_eq!(outcome, DispatchOutcome::QuoteSent { amount: 0.0 });
        assert_eq!(harness.sms.sent()[0].1, "Estimated quote for roofing: $0.0");
    }

    #[tokio::test]
    async fn schedule_action_books_and_confirms_with_default_time() {
        let reply = json!({"tool": "calendar_event", "parameters": {}}).to_string();
        let harness = harness(StubCompletion::replying(&reply));

        let outcome = harness.dispatcher.handle_message("+15551112222", "book me in").await;

        assert_eq!(outcome, DispatchOutcome::AppointmentBooked { time: "TBD".to_string() });
        let booked = harness.scheduler.booked();
        assert_eq!(booked.len(), 1);
        assert!(booked[0].description.contains("+15551112222"));
        assert_eq!(harness.sms.sent()[0].1, "Appointment booked for TBD.");
    }

    #[tokio::test]
    async fn booking_failure_still_sends_confirmation() {
        let reply =
            json!({"tool": "calendar_event", "parameters": {"time": "3pm Friday"}}).to_string();
        let harness = harness_with(
            StubCompletion::replying(&reply),
            RecordingSms::default(),
            RecordingScheduler { fail: true, ..RecordingScheduler::default() },
        );

        let outcome = harness.dispatcher.handle_message("+15551112222", "book me in").await;

        assert_eq!(
            outcome,
            DispatchOutcome::AppointmentBooked { time: "3pm Friday".to_string() }
        );
        assert_eq!(harness.sms.sent()[0].1, "Appointment booked for 3pm Friday.");
    }

    #[tokio::test]
    async fn sms_reply_action_relays_message_verbatim() {
        let reply =
            json!({"tool": "sms_reply", "parameters": {"message": "See you then!"}}).to_string();
        let harness = harness(StubCompletion::replying(&reply));

        let outcome = harness.dispatcher.handle_message("+15553334444", "thanks").await;

        assert_eq!(outcome, DispatchOutcome::MessageSent { reply: None });
        assert_eq!(
            harness.sms.sent(),
            vec![("+15553334444".to_string(), "See you then!".to_string())]
        );
        assert!(harness.leads.saved().is_empty());
    }

    #[tokio::test]
    async fn store_lead_action_persists_parameter_mapping() {
        let reply = json!({
            "tool": "store_lead",
            "parameters": {"name": "Dana", "job_type": "fencing"}
        })
        .to_string();
        let harness = harness(StubCompletion::replying(&reply));

        let outcome = harness.dispatcher.handle_message("+15555556666", "save my info").await;

        assert_eq!(outcome, DispatchOutcome::LeadSaved);
        let saved = harness.leads.saved();
        assert_eq!(saved.len(), 1);
        let LeadPayload::Fields(fields) = &saved[0].1 else {
            panic!("expected fields payload");
        };
        assert_eq!(fields.get("name"), Some(&json!("Dana")));
    }

    #[tokio::test]
    async fn unknown_tool_sends_fallback_text() {
        let reply = json!({"tool": "send_invoice", "parameters": {}}).to_string();
        let harness = harness(StubCompletion::replying(&reply));

        let outcome = harness.dispatcher.handle_message("+15557778888", "invoice me").await;

        assert_eq!(outcome, DispatchOutcome::UnknownTool);
        assert_eq!(harness.sms.sent(), vec![("+15557778888".to_string(), FALLBACK_TEXT.to_string())]);
    }

    #[tokio::test]
    async fn completion_failure_sends_apology_and_reports_error() {
        let harness = harness(StubCompletion::failing(CompletionError::Timeout));

        let outcome = harness.dispatcher.handle_message("+15559990000", "hello").await;

        let DispatchOutcome::Error { message } = outcome else {
            panic!("expected error outcome");
        };
        assert!(message.contains("timed out"));
        assert_eq!(harness.sms.sent(), vec![("+15559990000".to_string(), APOLOGY_TEXT.to_string())]);
        assert!(harness.leads.saved().is_empty());
    }

    #[tokio::test]
    async fn delimited_but_invalid_reply_degrades_to_plain_text() {
        let harness = harness(StubCompletion::replying("{not actually json}"));

        let outcome = harness.dispatcher.handle_message("+15551234567", "hello").await;

        assert_eq!(
            outcome,
            DispatchOutcome::MessageSent { reply: Some("{not actually json}".to_string()) }
        );
        assert_eq!(harness.sms.sent()[0].1, "{not actually json}");
        assert_eq!(harness.leads.saved().len(), 1);
    }

    #[tokio::test]
    async fn empty_inbound_text_short_circuits_without_side_effects() {
        let harness = harness(StubCompletion::replying("unused"));

        let outcome = harness.dispatcher.handle_message("+15551234567", "   ").await;

        assert!(matches!(outcome, DispatchOutcome::Error { .. }));
        assert!(harness.sms.sent().is_empty());
        assert_eq!(harness.llm.call_count(), 0);
    }

    #[tokio::test]
    async fn carrier_failure_does_not_change_outcome() {
        let harness = harness_with(
            StubCompletion::replying("Happy to help!"),
            RecordingSms { fail: true, ..RecordingSms::default() },
            RecordingScheduler::default(),
        );

        let outcome = harness.dispatcher.handle_message("+15551234567", "hi").await;

        assert_eq!(
            outcome,
            DispatchOutcome::MessageSent { reply: Some("Happy to help!".to_string()) }
        );
    }

    #[tokio::test]
    async fn outcome_serializes_with_status_tag() {
        let outcome = DispatchOutcome::QuoteSent { amount: 180.0 };
        let value = serde_json::to_value(&outcome).expect("serialize outcome");
        assert_eq!(value, json!({"status": "quote_sent", "amount": 180.0}));

        let outcome = DispatchOutcome::MessageSent { reply: None };
        let value = serde_json::to_value(&outcome).expect("serialize outcome");
        assert_eq!(value, json!({"status": "message_sent"}));
    }
}
