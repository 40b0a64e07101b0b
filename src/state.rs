use crate::config::Config;
use crate::db::{
    company_repository::CompanyRepository, payment_repository::PaymentRepository,
    stripe_event_log_repository::StripeEventLogRepository, user_repository::UserRepository,
};
use crate::services::{otp::OtpStore, smtp_mailer::Mailer, stripe::StripeService};
use crate::utils::jwt::SessionSigner;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn UserRepository>,
    pub company_repo: Arc<dyn CompanyRepository>,
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub stripe_event_repo: Arc<dyn StripeEventLogRepository>,
    pub mailer: Arc<dyn Mailer>,
    pub stripe: Arc<dyn StripeService>,
    pub otp_store: Arc<OtpStore>,
    pub config: Arc<Config>,
    pub session_signer: Arc<SessionSigner>,
}
