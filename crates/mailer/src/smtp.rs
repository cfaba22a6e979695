use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::Error as SmtpError;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use leadneedle_core::config::MailerConfig;

use crate::transport::{MailMessage, MailSession, MailTransport, TransportError};

/// SMTP implementation of the mail transport port. Every `connect` builds a
/// brand-new TLS relay so each delivery attempt starts from a clean
/// connection, mirroring the one-session-per-attempt contract.
pub struct SmtpMailTransport {
    host: String,
    port: u16,
    timeout: Duration,
}

impl SmtpMailTransport {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self { host: host.into(), port, timeout }
    }

    pub fn from_config(config: &MailerConfig) -> Self {
        Self::new(
            config.smtp_host.clone(),
            config.smtp_port,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn connect(&self) -> Result<Box<dyn MailSession>, TransportError> {
        let builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.host)
            .map_err(|error| TransportError::Connection(error.to_string()))?
            .port(self.port)
            .timeout(Some(self.timeout));

        debug!(
            event_name = "mailer.smtp.connect",
            host = %self.host,
            port = self.port,
            "smtp relay prepared"
        );

        Ok(Box::new(SmtpSession { pending: Some(builder), mailer: None }))
    }
}

struct SmtpSession {
    pending: Option<lettre::transport::smtp::AsyncSmtpTransportBuilder>,
    mailer: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

#[async_trait]
impl MailSession for SmtpSession {
    async fn authenticate(&mut self, identity: &str, secret: &str) -> Result<(), TransportError> {
        let builder = self.pending.take().ok_or_else(|| {
            TransportError::Unexpected("session already authenticated".to_string())
        })?;

        let mailer = builder
            .credentials(Credentials::new(identity.to_string(), secret.to_string()))
            .build();

        // The probe performs the full handshake including AUTH, so bad
        // credentials surface here rather than on submit.
        match mailer.test_connection().await {
            Ok(true) => {
                self.mailer = Some(mailer);
                Ok(())
            }
            Ok(false) => {
                Err(TransportError::Connection("smtp server rejected connection probe".to_string()))
            }
            Err(error) => Err(classify_smtp_error(&error, None)),
        }
    }

    async fn submit(&mut self, message: &MailMessage) -> Result<Vec<String>, TransportError> {
        let mailer = self.mailer.as_ref().ok_or_else(|| {
            TransportError::Unexpected("submit called before authenticate".to_string())
        })?;

        let email = build_message(message)?;
        match mailer.send(email).await {
            Ok(_) => Ok(Vec::new()),
            Err(error) => Err(classify_smtp_error(&error, Some(&message.to))),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.mailer = None;
        Ok(())
    }
}

fn build_message(message: &MailMessage) -> Result<Message, TransportError> {
    let from = message
        .from
        .parse()
        .map_err(|_| TransportError::Unexpected(format!("invalid sender `{}`", message.from)))?;
    let to = message
        .to
        .parse()
        .map_err(|_| TransportError::Unexpected(format!("invalid recipient `{}`", message.to)))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(message.subject.clone())
        .date(message.date.into())
        .message_id(Some(message.message_id.clone()))
        .header(ContentType::TEXT_HTML)
        .body(message.body_html.clone())
        .map_err(|error| TransportError::Unexpected(error.to_string()))
}

/// Map SMTP status codes onto the retry taxonomy: credential rejections and
/// mailbox rejections are terminal, everything else is worth another try.
fn classify_smtp_error(error: &SmtpError, recipient: Option<&str>) -> TransportError {
    if let Some(code) = error.status() {
        return match code.to_string().as_str() {
            "530" | "534" | "535" | "538" => TransportError::Auth(error.to_string()),
            "550" | "551" | "553" => TransportError::RecipientsRefused {
                recipients: recipient.map(|to| vec![to.to_string()]).unwrap_or_default(),
            },
            _ => TransportError::Protocol(error.to_string()),
        };
    }

    TransportError::Connection(error.to_string())
}
