use async_trait::async_trait;

use crate::models::payment::{NewPayment, Payment};

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn find_payment_by_session(
        &self,
        stripe_session_id: &str,
    ) -> Result<Option<Payment>, sqlx::Error>;

    /// Returns `None` when a payment for the same checkout session already exists.
    async fn insert_payment_if_absent(
        &self,
        payment: &NewPayment,
    ) -> Result<Option<Payment>, sqlx::Error>;
}
