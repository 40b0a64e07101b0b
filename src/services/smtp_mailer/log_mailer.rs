use async_trait::async_trait;
use tracing::warn;

use super::{password_setup_link, MailError, Mailer};

/// Development mailer used when SMTP is not configured: the message content
/// goes to the log instead of an inbox.
pub struct LogMailer {
    frontend_origin: String,
}

impl LogMailer {
    pub fn new(frontend_origin: impl Into<String>) -> Self {
        Self {
            frontend_origin: frontend_origin.into(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send_otp_email(
        &self,
        to: &str,
        code: &str,
        ttl_minutes: u64,
    ) -> Result<(), MailError> {
        warn!(%to, %code, ttl_minutes, "SMTP not configured; verification code logged instead of sent");
        Ok(())
    }

    async fn send_password_setup_email(&self, to: &str, token: &str) -> Result<(), MailError> {
        let link = password_setup_link(&self.frontend_origin, token);
        warn!(%to, %link, "SMTP not configured; password setup link logged instead of sent");
        Ok(())
    }
}
