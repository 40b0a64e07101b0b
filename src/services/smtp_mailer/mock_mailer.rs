use crate::services::smtp_mailer::{MailError, Mailer};
use async_trait::async_trait;
use std::sync::Mutex;

/// A mock mailer that records sent emails for testing purposes.
#[derive(Debug, Default)]
pub struct MockMailer {
    pub sent_otp_emails: Mutex<Vec<(String, String)>>,
    pub sent_setup_emails: Mutex<Vec<(String, String)>>,
    pub fail_send: bool,
}

impl MockMailer {
    pub fn failing() -> Self {
        Self {
            fail_send: true,
            ..Default::default()
        }
    }

    pub fn last_otp_for(&self, to: &str) -> Option<String> {
        self.sent_otp_emails
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(email, _)| email == to)
            .map(|(_, code)| code.clone())
    }

    pub fn last_setup_token_for(&self, to: &str) -> Option<String> {
        self.sent_setup_emails
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(email, _)| email == to)
            .map(|(_, token)| token.clone())
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send_otp_email(
        &self,
        to: &str,
        code: &str,
        _ttl_minutes: u64,
    ) -> Result<(), MailError> {
        if self.fail_send {
            return Err(MailError::Other("mock failure".into()));
        }
        self.sent_otp_emails
            .lock()
            .unwrap()
            .push((to.to_string(), code.to_string()));
        Ok(())
    }

    async fn send_password_setup_email(&self, to: &str, token: &str) -> Result<(), MailError> {
        if self.fail_send {
            return Err(MailError::Other("mock failure".into()));
        }
        self.sent_setup_emails
            .lock()
            .unwrap()
            .push((to.to_string(), token.to_string()));
        Ok(())
    }
}
