pub mod checkout;
pub mod company;
pub mod payment;
pub mod plan;
pub mod user;
