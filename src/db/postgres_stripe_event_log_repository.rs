use crate::db::stripe_event_log_repository::{
    EventClaim, StripeEventLogRepository, STALE_CLAIM_SECONDS,
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres};

pub struct PostgresStripeEventLogRepository {
    pub pool: PgPool,
}

#[async_trait]
impl StripeEventLogRepository for PostgresStripeEventLogRepository {
    async fn claim_event(
        &self,
        event_id: &str,
        event_type: &str,
    ) -> Result<EventClaim, sqlx::Error> {
        let claimed = sqlx::query_scalar::<Postgres, String>(
            r#"
            INSERT INTO stripe_event_log (event_id, event_type)
            VALUES ($1, $2)
            ON CONFLICT (event_id) DO UPDATE
               SET claimed_at = now()
             WHERE stripe_event_log.processed_at IS NULL
               AND stripe_event_log.claimed_at < now() - make_interval(secs => $3)
            RETURNING event_id
            "#,
        )
        .bind(event_id)
        .bind(event_type)
        .bind(STALE_CLAIM_SECONDS as f64)
        .fetch_optional(&self.pool)
        .await?;

        if claimed.is_some() {
            return Ok(EventClaim::Claimed);
        }

        let processed = sqlx::query_scalar::<Postgres, bool>(
            "SELECT processed_at IS NOT NULL FROM stripe_event_log WHERE event_id = $1",
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match processed {
            Some(true) => EventClaim::Processed,
            // None: released between the two statements
            Some(false) | None => EventClaim::InFlight,
        })
    }

    async fn mark_event_processed(&self, event_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query::<Postgres>(
            "UPDATE stripe_event_log SET processed_at = now() WHERE event_id = $1",
        )
        .bind(event_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn forget_event(&self, event_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query::<Postgres>(
            "DELETE FROM stripe_event_log WHERE event_id = $1 AND processed_at IS NULL",
        )
        .bind(event_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
