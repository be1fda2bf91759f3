use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::Mailer;
use crate::errors::CollectorError;

/// Mail over SMTP submission: STARTTLS, then login.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
}

fn mailbox(field: &str, address: &str) -> Result<Mailbox, CollectorError> {
    address.parse().map_err(|e| {
        CollectorError::Notification(format!("Invalid {} address '{}': {}", field, address, e))
    })
}

impl SmtpMailer {
    /// Build the transport. No connection is made until the first send.
    pub fn new(
        host: &str,
        port: u16,
        user: &str,
        pass: &str,
        from: &str,
        to: &str,
    ) -> Result<Self, CollectorError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| {
                CollectorError::Notification(format!("SMTP setup for {} failed: {}", host, e))
            })?
            .port(port)
            .credentials(Credentials::new(user.to_string(), pass.to_string()))
            .build();

        Ok(Self {
            transport,
            from: mailbox("from", from)?,
            to: mailbox("to", to)?,
        })
    }

    /// Plain text, or text with an HTML alternative.
    pub fn build_message(
        &self,
        subject: &str,
        text: &str,
        html: Option<&str>,
    ) -> Result<Message, CollectorError> {
        let builder = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject);

        let message = match html {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(
                text.to_string(),
                html.to_string(),
            )),
            None => builder.singlepart(SinglePart::plain(text.to_string())),
        };
        message.map_err(|e| CollectorError::Notification(format!("Invalid email: {}", e)))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(
        &self,
        subject: &str,
        text: &str,
        html: Option<&str>,
    ) -> Result<(), CollectorError> {
        let message = self.build_message(subject, text, html)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| CollectorError::Notification(format!("SMTP send failed: {}", e)))?;
        tracing::info!("Sent '{}' via SMTP", subject);
        Ok(())
    }
}
