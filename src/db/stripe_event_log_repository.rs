use async_trait::async_trait;

/// Unfinished claims older than this are handed to the next delivery.
pub const STALE_CLAIM_SECONDS: i64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClaim {
    /// This delivery owns the event and must process it.
    Claimed,
    /// Another delivery holds an unfinished claim.
    InFlight,
    Processed,
}

#[async_trait]
pub trait StripeEventLogRepository: Send + Sync {
    async fn claim_event(&self, event_id: &str, event_type: &str)
        -> Result<EventClaim, sqlx::Error>;

    async fn mark_event_processed(&self, event_id: &str) -> Result<(), sqlx::Error>;

    /// Releases a claim so Stripe's retry of a failed delivery is processed again.
    async fn forget_event(&self, event_id: &str) -> Result<(), sqlx::Error>;
}
