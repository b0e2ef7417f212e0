use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpSettings;
use crate::domain::notification::AssignmentNotice;
use crate::error::{AppError, AppResult};
use crate::services::MailService;

pub struct SmtpMailer {
    settings: SmtpSettings,
}

impl SmtpMailer {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    fn build_message(&self, notice: &AssignmentNotice) -> AppResult<Message> {
        let from = self
            .settings
            .from
            .as_deref()
            .ok_or_else(|| AppError::Configuration("SMTP sender address not configured".to_string()))?;
        let from: Mailbox = from
            .parse()
            .map_err(|err| AppError::Configuration(format!("invalid sender address: {err}")))?;
        let to: Mailbox = notice
            .to
            .parse()
            .map_err(|err| AppError::Mail(format!("invalid recipient '{}': {err}", notice.to)))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(notice.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(notice.body.clone())
            .map_err(|err| AppError::Mail(format!("failed to build email: {err}")))
    }

    fn transport(&self) -> AppResult<AsyncSmtpTransport<Tokio1Executor>> {
        let host = self
            .settings
            .host
            .as_deref()
            .ok_or_else(|| AppError::Configuration("SMTP host not configured".to_string()))?;

        let builder = if self.settings.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|err| AppError::Mail(format!("SMTP relay: {err}")))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };
        let mut builder = builder.port(self.settings.port);

        if let (Some(username), Some(password)) = (&self.settings.username, &self.settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }
}

#[async_trait]
impl MailService for SmtpMailer {
    async fn send(&self, notice: &AssignmentNotice) -> AppResult<()> {
        let message = self.build_message(notice)?;
        let mailer = self.transport()?;

        mailer
            .send(message)
            .await
            .map_err(|err| AppError::Mail(format!("SMTP send: {err}")))?;

        tracing::info!(to = %notice.to, subject = %notice.subject, "email sent");
        Ok(())
    }
}
