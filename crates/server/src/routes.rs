use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use leadneedle_agent::Dispatcher;
use leadneedle_core::domain::lead::FormSubmission;
use leadneedle_google::SheetsClient;
use leadneedle_mailer::{confirmation_email, notification_email, DeliveryQueue, SenderIdentity};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub queue: Arc<DeliveryQueue>,
    pub sheets: Option<Arc<SheetsClient>>,
    pub sheet_name: String,
    pub admin_address: String,
    pub sender: SenderIdentity,
}

const WIZARD_SHEET_NAME: &str = "Website Submissions";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/sms", post(receive_sms))
        .route("/submit", post(submit_contact_form))
        .route("/submit-wizard", post(submit_wizard_form))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct SmsInbound {
    phone: Option<String>,
    sms_text: Option<String>,
}

async fn receive_sms(
    State(state): State<AppState>,
    Json(inbound): Json<SmsInbound>,
) -> (StatusCode, Json<Value>) {
    let phone = inbound.phone.unwrap_or_default();
    let sms_text = inbound.sms_text.unwrap_or_default();

    if phone.trim().is_empty() || sms_text.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Missing phone or sms_text"})),
        );
    }

    info!(
        event_name = "server.sms.received",
        caller_id = %phone,
        "inbound sms accepted for dispatch"
    );

    let outcome = state.dispatcher.handle_message(&phone, &sms_text).await;

    (StatusCode::OK, Json(json!({"status": "success", "responses": outcome})))
}

async fn submit_contact_form(
    State(state): State<AppState>,
    Json(payload): Json<Map<String, Value>>,
) -> (StatusCode, Json<Value>) {
    let sheet_name = state.sheet_name.clone();
    handle_form_submission(state, payload, &sheet_name).await
}

async fn submit_wizard_form(
    State(state): State<AppState>,
    Json(payload): Json<Map<String, Value>>,
) -> (StatusCode, Json<Value>) {
    handle_form_submission(state, payload, WIZARD_SHEET_NAME).await
}

/// Shared form flow: spreadsheet append is best-effort, then a notification
/// email for the admin and a confirmation for the submitter are queued. The
/// request never waits on delivery.
async fn handle_form_submission(
    state: AppState,
    payload: Map<String, Value>,
    sheet_name: &str,
) -> (StatusCode, Json<Value>) {
    if payload.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"status": "error", "message": "No data received in the request body."})),
        );
    }

    let form = form_from_payload(&payload);
    info!(
        event_name = "server.form.received",
        sheet = %sheet_name,
        submitter = %form.email,
        "form submission accepted"
    );

    if let Some(sheets) = &state.sheets {
        if let Err(error) = sheets.append_row(sheet_name, form.as_sheet_row()).await {
            warn!(
                event_name = "server.form.sheet_append_failed",
                sheet = %sheet_name,
                error = %error,
                "spreadsheet append failed, continuing"
            );
        }
    }

    match notification_email(&state.admin_address, state.sender.clone(), &form) {
        Ok(job) => state.queue.enqueue(job),
        Err(error) => warn!(
            event_name = "server.form.notification_render_failed",
            error = %error,
            "notification email not queued"
        ),
    }

    if form.email.trim().is_empty() {
        warn!(
            event_name = "server.form.confirmation_skipped",
            "no recipient email provided for confirmation email"
        );
    } else {
        match confirmation_email(&form.email, state.sender.clone(), &form) {
            Ok(job) => state.queue.enqueue(job),
            Err(error) => warn!(
                event_name = "server.form.confirmation_render_failed",
                error = %error,
                "confirmation email not queued"
            ),
        }
    }

    (
        StatusCode::OK,
        Json(json!({"status": "success", "message": "Form submitted successfully!"})),
    )
}

fn form_from_payload(payload: &Map<String, Value>) -> FormSubmission {
    let text = |key: &str| -> String {
        payload.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
    };

    let phone_number = {
        let primary = text("phoneNumber");
        if primary.is_empty() {
            text("phone")
        } else {
            primary
        }
    };
    let website_description = text("websiteDescription");
    let message = {
        let explicit = text("message");
        if explicit.is_empty() {
            website_description.clone()
        } else {
            explicit
        }
    };
    let service = {
        let explicit = text("service");
        if explicit.is_empty() {
            "Free Website Wizard".to_string()
        } else {
            explicit
        }
    };

    FormSubmission {
        first_name: text("firstName"),
        last_name: text("lastName"),
        email: text("email"),
        phone_number,
        website_name: text("websiteName"),
        website_description,
        has_website: text("hasWebsite"),
        service,
        message,
        source: text("source"),
        submitted_at: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    use leadneedle_agent::{CompletionClient, Dispatcher};
    use leadneedle_core::domain::lead::LeadPayload;
    use leadneedle_core::errors::{BookingError, CompletionError, SmsError, StoreError};
    use leadneedle_core::ports::{
        AppointmentScheduler, BookingConfirmation, BookingRequest, LeadStore, SmsSender,
    };
    use leadneedle_mailer::{
        DeliveryQueue, DeliveryQueueConfig, MemoryMailTransport, SenderIdentity,
    };

    use super::{router, AppState};

    struct StubCompletion {
        reply: String,
    }

    #[async_trait]
    impl CompletionClient for StubCompletion {
        async fn complete(
            &self,
            _system_prompt: &str,
            _user_text: &str,
        ) -> Result<String, CompletionError> {
            Ok(self.reply.clone())
        }
    }

    #[derive(Default)]
    struct RecordingSms {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl SmsSender for RecordingSms {
        async fn send(&self, to: &str, body: &str) -> Result<(), SmsError> {
            self.sent.lock().expect("sms lock").push((to.to_string(), body.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct NullLeads;

    #[async_trait]
    impl LeadStore for NullLeads {
        async fn save(&self, _caller_id: &str, _payload: LeadPayload) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct NullScheduler;

    #[async_trait]
    impl AppointmentScheduler for NullScheduler {
        async fn book(
            &self,
            _request: BookingRequest,
        ) -> Result<BookingConfirmation, BookingError> {
            Ok(BookingConfirmation { event_link: "https://calendar.example/evt".to_string() })
        }
    }

    fn state_with_reply(reply: &str) -> (AppState, Arc<RecordingSms>, Arc<DeliveryQueue>) {
        let sms = Arc::new(RecordingSms::default());
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(StubCompletion { reply: reply.to_string() }),
            sms.clone(),
            Arc::new(NullLeads),
            Arc::new(NullScheduler),
        ));
        let queue = Arc::new(DeliveryQueue::new(
            Arc::new(MemoryMailTransport::new()),
            DeliveryQueueConfig {
                poll_interval: Duration::from_millis(5),
                backoff_base: Duration::from_millis(1),
                shutdown_grace: Duration::from_millis(500),
            },
        ));

        let state = AppState {
            dispatcher,
            queue: queue.clone(),
            sheets: None,
            sheet_name: "Submissions".to_string(),
            admin_address: "owner@example.com".to_string(),
            sender: SenderIdentity {
                address: "robot@example.com".to_string(),
                secret: "pw".to_string().into(),
            },
        };
        (state, sms, queue)
    }

    async fn post_json(router: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn sms_route_rejects_missing_fields() {
        let (state, _, _) = state_with_reply("unused");
        let (status, body) =
            post_json(router(state), "/sms", json!({"phone": "+15551234567"})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Missing phone or sms_text"}));
    }

    #[tokio::test]
    async fn sms_route_runs_quote_flow_end_to_end() {
        let reply = json!({
            "tool": "quote_lead",
            "parameters": {"job_type": "decking", "square_footage": 1200}
        })
        .to_string();
        let (state, sms, _) = state_with_reply(&reply);

        let (status, body) = post_json(
            router(state),
            "/sms",
            json!({"phone": "+15551234567", "sms_text": "I need a quote for a 1200 sqft deck"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "status": "success",
                "responses": {"status": "quote_sent", "amount": 180.0}
            })
        );
        assert_eq!(
            sms.sent.lock().expect("sms lock").clone(),
            vec![("+15551234567".to_string(), "Estimated quote for decking: $180.0".to_string())]
        );
    }

    #[tokio::test]
    async fn form_submission_queues_notification_and_confirmation() {
        let (state, _, queue) = state_with_reply("unused");

        let (status, body) = post_json(
            router(state),
            "/submit-wizard",
            json!({
                "firstName": "Dana",
                "email": "dana@example.com",
                "phoneNumber": "+15551234567",
                "websiteDescription": "Small bakery site"
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert!(queue.drain_and_wait(Duration::from_secs(5)).await);
        let stats = queue.stats();
        assert_eq!(stats.queued_total, 2, "notification plus confirmation");
        assert_eq!(stats.sent_total, 2);

        queue.shutdown().await;
    }

    #[tokio::test]
    async fn form_submission_without_email_queues_only_notification() {
        let (state, _, queue) = state_with_reply("unused");

        let (status, _) = post_json(
            router(state),
            "/submit",
            json!({"firstName": "Dana", "phone": "+15551234567"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(queue.drain_and_wait(Duration::from_secs(5)).await);
        assert_eq!(queue.stats().queued_total, 1);

        queue.shutdown().await;
    }

    #[tokio::test]
    async fn empty_form_body_is_rejected() {
        let (state, _, _) = state_with_reply("unused");
        let (status, body) = post_json(router(state), "/submit", json!({})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }
}
