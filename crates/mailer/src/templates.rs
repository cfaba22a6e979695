use tera::{Context, Tera};
use thiserror::Error;

use leadneedle_core::domain::lead::FormSubmission;

use crate::job::{EmailJob, EmailKind, SenderIdentity};

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("email template rendering failed: {0}")]
    Render(#[from] tera::Error),
}

const NOTIFICATION_TEMPLATE: &str = r#"
<html>
<body>
    <h2>New Website Submission Received</h2>
    <p><strong>Name:</strong> {{ first_name }}</p>
    <p><strong>Email:</strong> {{ email }}</p>
    <p><strong>Phone:</strong> {{ phone_number }}</p>
    <p><strong>Has Website:</strong> {{ has_website }}</p>
    <p><strong>Website Description:</strong></p>
    <p>{{ website_description }}</p>
    <p><strong>Source:</strong> {{ source }}</p>
    <p><strong>Timestamp:</strong> {{ submitted_at }}</p>

    <hr>
    <p><em>This email was delivered through the background queue.</em></p>
</body>
</html>
"#;

const CONFIRMATION_TEMPLATE: &str = r#"
<html>
<body>
    <h2>Thank you for your submission!</h2>
    <p>Hi {{ greeting_name }},</p>

    <p>We've received your website submission and will be in touch soon!</p>

    <h3>Your Submission Details:</h3>
    <p><strong>Name:</strong> {{ first_name }}</p>
    <p><strong>Email:</strong> {{ email }}</p>
    <p><strong>Phone:</strong> {{ phone_number }}</p>
    <p><strong>Has Website:</strong> {{ has_website }}</p>

    <p>We'll review your requirements and get back to you within 24 hours.</p>

    <p>Best regards,<br>
    The Lead Needle Team</p>
</body>
</html>
"#;

/// Admin-facing notification for a new form submission.
pub fn notification_email(
    admin_address: &str,
    sender: SenderIdentity,
    form: &FormSubmission,
) -> Result<EmailJob, TemplateError> {
    let subject = format!("New Website Submission - {}", or_fallback(&form.first_name, "Unknown"));
    let body = render(NOTIFICATION_TEMPLATE, form)?;

    Ok(EmailJob::new(EmailKind::Notification, admin_address, subject, body, sender))
}

/// Customer-facing confirmation for a form submission.
pub fn confirmation_email(
    recipient: &str,
    sender: SenderIdentity,
    form: &FormSubmission,
) -> Result<EmailJob, TemplateError> {
    let subject = "Thank you for your website submission!".to_string();
    let body = render(CONFIRMATION_TEMPLATE, form)?;

    Ok(EmailJob::new(EmailKind::Confirmation, recipient, subject, body, sender))
}

fn render(template: &str, form: &FormSubmission) -> Result<String, TemplateError> {
    let mut context = Context::new();
    context.insert("greeting_name", or_fallback(&form.first_name, "there"));
    context.insert("first_name", or_fallback(&form.first_name, "N/A"));
    context.insert("email", or_fallback(&form.email, "N/A"));
    context.insert("phone_number", or_fallback(&form.phone_number, "N/A"));
    context.insert("has_website", or_fallback(&form.has_website, "N/A"));
    context.insert("website_description", or_fallback(&form.website_description, "N/A"));
    context.insert("source", or_fallback(&form.source, "N/A"));
    context.insert("submitted_at", or_fallback(&form.submitted_at, "N/A"));

    Ok(Tera::one_off(template, &context, true)?)
}

fn or_fallback<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}
