pub mod postmark;
pub mod smtp;

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::CollectorError;
use crate::models::config::MailConfig;
use crate::models::MailProvider;

pub use postmark::PostmarkMailer;
pub use smtp::SmtpMailer;

/// Outbound mail capability. Every failure is a `Notification` error.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, subject: &str, text: &str, html: Option<&str>)
        -> Result<(), CollectorError>;
}

/// Writes messages to the log instead of delivering them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(
        &self,
        subject: &str,
        text: &str,
        _html: Option<&str>,
    ) -> Result<(), CollectorError> {
        tracing::info!("Mail (log provider): {}\n{}", subject, text);
        Ok(())
    }
}

/// Select the mailer named by `mail.provider`.
pub fn build_mailer(
    config: &MailConfig,
    client: reqwest::Client,
) -> Result<Arc<dyn Mailer>, CollectorError> {
    match config.provider {
        MailProvider::Log => Ok(Arc::new(LogMailer)),
        MailProvider::Postmark => {
            let token = config.postmark_token.as_deref().ok_or_else(|| {
                CollectorError::Validation("postmark mailer requires a server token".to_string())
            })?;
            let from = config.from.as_deref().ok_or_else(|| {
                CollectorError::Validation("postmark mailer requires mail.from".to_string())
            })?;
            let to = config.to.as_deref().ok_or_else(|| {
                CollectorError::Validation("postmark mailer requires mail.to".to_string())
            })?;
            Ok(Arc::new(PostmarkMailer::new(
                client,
                token,
                from,
                to,
                &config.message_stream,
            )))
        }
        MailProvider::Smtp => {
            let required = |value: &Option<String>, key: &str| {
                value.clone().ok_or_else(|| {
                    CollectorError::Validation(format!("smtp mailer requires {}", key))
                })
            };
            let host = required(&config.smtp_host, "mail.smtp_host")?;
            let user = required(&config.smtp_user, "mail.smtp_user")?;
            let pass = required(&config.smtp_pass, "mail.smtp_pass")?;
            let from = required(&config.from, "mail.from")?;
            let to = required(&config.to, "mail.to")?;
            Ok(Arc::new(SmtpMailer::new(
                &host,
                config.smtp_port,
                &user,
                &pass,
                &from,
                &to,
            )?))
        }
    }
}
