use async_trait::async_trait;
use lettre::{
    address::AddressError,
    message::Mailbox,
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use crate::config::SmtpSettings;
use crate::services::smtp_mailer::{
    otp_body, password_setup_body, password_setup_link, Mailer, OTP_SUBJECT,
    PASSWORD_SETUP_SUBJECT,
};

use super::MailError;

#[derive(Clone)]
pub struct SmtpMailer {
    transport: Arc<AsyncSmtpTransport<Tokio1Executor>>,
    sender: Mailbox,
    frontend_origin: String,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings, frontend_origin: &str) -> Result<Self, anyhow::Error> {
        let from: Mailbox = settings.from.parse()?;
        let transport = build_transport(settings)?;

        Ok(Self {
            transport: Arc::new(transport),
            sender: from,
            frontend_origin: frontend_origin.to_string(),
        })
    }

    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        let email = Message::builder()
            .from(self.sender.clone())
            .to(to
                .parse()
                .map_err(|e: AddressError| MailError::InvalidEmailAddress(e.to_string()))?)
            .subject(subject)
            .body(body.to_string())?;

        self.transport
            .send(email)
            .await
            .map(|_| ())
            .map_err(|e| e.into())
    }
}

fn build_transport(
    settings: &SmtpSettings,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
    let mut builder = if settings.tls_disabled {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host).port(settings.port)
    } else if settings.port == 465 {
        let tls = TlsParameters::new(settings.host.clone())?;
        AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)?
            .port(settings.port)
            .tls(Tls::Wrapper(tls))
    } else {
        let tls = TlsParameters::new(settings.host.clone())?;
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)?
            .port(settings.port)
            .tls(Tls::Required(tls))
    };

    if let (Some(username), Some(password)) =
        (settings.username.as_ref(), settings.password.as_ref())
    {
        builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
    }

    Ok(builder.build())
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_otp_email(
        &self,
        to: &str,
        code: &str,
        ttl_minutes: u64,
    ) -> Result<(), MailError> {
        self.send_email(to, OTP_SUBJECT, &otp_body(code, ttl_minutes))
            .await
    }

    async fn send_password_setup_email(&self, to: &str, token: &str) -> Result<(), MailError> {
        let link = password_setup_link(&self.frontend_origin, token);
        self.send_email(to, PASSWORD_SETUP_SUBJECT, &password_setup_body(&link))
            .await
    }
}
