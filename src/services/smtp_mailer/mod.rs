use async_trait::async_trait;
use lettre::address::AddressError;
use lettre::transport::smtp::Error as SmtpError;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Invalid Address: {0}")]
    InvalidEmailAddress(String),
    #[error("Send error: {0}")]
    SendError(String),
    #[error("Error: {0}")]
    Other(String),
}

impl From<SmtpError> for MailError {
    fn from(err: SmtpError) -> Self {
        MailError::SendError(err.to_string())
    }
}

impl From<lettre::error::Error> for MailError {
    fn from(err: lettre::error::Error) -> Self {
        MailError::SendError(err.to_string())
    }
}

impl From<AddressError> for MailError {
    fn from(e: AddressError) -> Self {
        MailError::InvalidEmailAddress(e.to_string())
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_otp_email(&self, to: &str, code: &str, ttl_minutes: u64)
        -> Result<(), MailError>;
    async fn send_password_setup_email(&self, to: &str, token: &str) -> Result<(), MailError>;
}

mod log_mailer;
#[cfg(test)]
mod mock_mailer;
mod smtp_impl;

pub use log_mailer::LogMailer;
#[cfg(test)]
pub use mock_mailer::MockMailer;
pub use smtp_impl::SmtpMailer;

pub const OTP_SUBJECT: &str = "Your Pitchlab verification code";
pub const PASSWORD_SETUP_SUBJECT: &str = "Set your Pitchlab password";

pub fn otp_body(code: &str, ttl_minutes: u64) -> String {
    format!(
        "Your verification code is: {}\n\nIt expires in {} minutes. If you did not request it, you can ignore this email.",
        code, ttl_minutes
    )
}

pub fn password_setup_link(frontend_origin: &str, token: &str) -> String {
    format!("{}/set-password?token={}", frontend_origin, token)
}

pub fn password_setup_body(link: &str) -> String {
    format!(
        "Welcome to Pitchlab!\n\nChoose your password here:\n{}\n\nThe link can be used once.",
        link
    )
}
