//! Delivery of the confirmation email carrying the attendee's QR code.

use askama::Template;
use async_trait::async_trait;
use lettre::message::header::{ContentType, ContentTypeErr};
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::MailConfig;
use crate::db::models::AttendeeRecord;
use crate::qr::QrError;

const QR_ATTACHMENT_NAME: &str = "qr_code.png";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("invalid attachment content type: {0}")]
    ContentType(#[from] ContentTypeErr),

    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("failed to render email body: {0}")]
    Template(#[from] askama::Error),

    #[error("failed to render QR code: {0}")]
    Qr(#[from] QrError),
}

/// Sends an attendee their QR code.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send_confirmation(
        &self,
        attendee: &AttendeeRecord,
        qr_png: Vec<u8>,
    ) -> Result<(), NotifyError>;
}

#[derive(Template)]
#[template(path = "email/confirmation.html")]
struct ConfirmationEmail<'a> {
    event_name: &'a str,
    name: &'a str,
    register_number: &'a str,
    email: &'a str,
}

/// Sends confirmation emails through an authenticated STARTTLS relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    subject: String,
    event_name: String,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig, event_name: &str) -> Result<Self, NotifyError> {
        let credentials = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from: config.from.parse()?,
            subject: config.subject.clone(),
            event_name: event_name.to_string(),
        })
    }

    fn build_message(
        &self,
        attendee: &AttendeeRecord,
        qr_png: Vec<u8>,
    ) -> Result<Message, NotifyError> {
        let body = ConfirmationEmail {
            event_name: &self.event_name,
            name: &attendee.name,
            register_number: &attendee.register_number,
            email: &attendee.email,
        }
        .render()?;

        let attachment = Attachment::new(QR_ATTACHMENT_NAME.to_string())
            .body(qr_png, ContentType::parse("image/png")?);

        let message = Message::builder()
            .from(self.from.clone())
            .to(attendee.email.parse()?)
            .subject(self.subject.clone())
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::html(body))
                    .singlepart(attachment),
            )?;
        Ok(message)
    }
}

#[async_trait]
impl NotificationSink for SmtpMailer {
    async fn send_confirmation(
        &self,
        attendee: &AttendeeRecord,
        qr_png: Vec<u8>,
    ) -> Result<(), NotifyError> {
        let message = self.build_message(attendee, qr_png)?;
        self.transport.send(message).await?;
        info!(register_number = %attendee.register_number, "Confirmation email sent");
        Ok(())
    }
}

/// Stand-in used when no SMTP credentials are configured.
pub struct LogOnlyNotifier;

#[async_trait]
impl NotificationSink for LogOnlyNotifier {
    async fn send_confirmation(
        &self,
        attendee: &AttendeeRecord,
        qr_png: Vec<u8>,
    ) -> Result<(), NotifyError> {
        warn!(
            register_number = %attendee.register_number,
            qr_bytes = qr_png.len(),
            "SMTP is not configured, confirmation email not sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::attendee;
    use secrecy::SecretString;

    fn mailer() -> SmtpMailer {
        let config = MailConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "events@example.com".to_string(),
            password: SecretString::from("app-password".to_string()),
            from: "Events <events@example.com>".to_string(),
            subject: "Your ticket".to_string(),
        };
        SmtpMailer::new(&config, "AI Summit").unwrap()
    }

    #[tokio::test]
    async fn message_carries_body_and_qr_attachment() {
        let message = mailer()
            .build_message(&attendee("R100"), vec![0x89, b'P', b'N', b'G'])
            .unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).to_string();

        assert!(raw.contains("To: a@x.com"));
        assert!(raw.contains("Subject: Your ticket"));
        assert!(raw.contains("qr_code.png"));
        assert!(raw.contains("image/png"));
    }

    #[tokio::test]
    async fn invalid_recipient_is_reported() {
        let mut record = attendee("R100");
        record.email = "not an address".to_string();

        let err = mailer().build_message(&record, Vec::new()).unwrap_err();
        assert!(matches!(err, NotifyError::Address(_)));
    }
}
