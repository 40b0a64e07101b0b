use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::payment_repository::PaymentRepository;
use crate::models::payment::{NewPayment, Payment};

pub struct PostgresPaymentRepository {
    pub pool: PgPool,
}

const PAYMENT_COLUMNS: &str = "id, user_id, stripe_session_id, stripe_customer_id, amount, \
                               currency, plan, status, created_at";

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    async fn find_payment_by_session(
        &self,
        stripe_session_id: &str,
    ) -> Result<Option<Payment>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM payments WHERE stripe_session_id = $1",
            PAYMENT_COLUMNS
        );
        sqlx::query_as::<_, Payment>(&sql)
            .bind(stripe_session_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn insert_payment_if_absent(
        &self,
        payment: &NewPayment,
    ) -> Result<Option<Payment>, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO payments
                (user_id, stripe_session_id, stripe_customer_id, amount, currency, plan, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (stripe_session_id) DO NOTHING
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        );
        sqlx::query_as::<_, Payment>(&sql)
            .bind(payment.user_id)
            .bind(&payment.stripe_session_id)
            .bind(&payment.stripe_customer_id)
            .bind(payment.amount)
            .bind(&payment.currency)
            .bind(&payment.plan)
            .bind(&payment.status)
            .fetch_optional(&self.pool)
            .await
    }
}
