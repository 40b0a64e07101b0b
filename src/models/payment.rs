use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

pub const PAYMENT_STATUS_PAID: &str = "paid";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub stripe_session_id: String,
    pub stripe_customer_id: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub plan: String,
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub user_id: Uuid,
    pub stripe_session_id: String,
    pub stripe_customer_id: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub plan: String,
    pub status: String,
}
