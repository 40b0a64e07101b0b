pub mod otp;
pub mod provisioning;
pub mod smtp_mailer;
pub mod stripe;
