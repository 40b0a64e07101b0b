pub mod company_repository;
#[cfg(test)]
pub mod mock_db;
pub mod payment_repository;
pub mod postgres_company_repository;
pub mod postgres_payment_repository;
pub mod postgres_stripe_event_log_repository;
pub mod postgres_user_repository;
pub mod stripe_event_log_repository;
pub mod user_repository;

/// True when the database rejected a write because of a unique constraint.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
