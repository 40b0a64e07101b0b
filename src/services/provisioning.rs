//! Turns a paid Checkout Session into platform rows. Both the webhook and the
//! verify-payment endpoint call [`provision_checkout_session`]; the unique
//! `payments.stripe_session_id` makes whichever runs second a no-op.

use time::{Duration, OffsetDateTime};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::is_unique_violation;
use crate::models::{
    checkout::{CheckoutMetadata, MetadataError},
    payment::{NewPayment, Payment, PAYMENT_STATUS_PAID},
    plan::{Currency, PlanTier},
    user::{NewUser, User, UserRole},
};
use crate::services::{smtp_mailer::MailError, stripe::CheckoutSessionDetails};
use crate::state::AppState;
use crate::utils::{
    password::hash_password,
    tokens::{generate_token, hash_token, temporary_password},
};

#[derive(Debug, thiserror::Error)]
pub enum ProvisioningError {
    #[error("checkout session {0} is not paid")]
    NotPaid(String),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    Password(String),
    #[error("mail error: {0}")]
    Mail(#[from] MailError),
}

#[derive(Debug, Clone)]
pub struct ProvisionOutcome {
    pub user: User,
    pub payment: Payment,
    /// The session had already been provisioned by an earlier call.
    pub already_provisioned: bool,
    pub user_created: bool,
}

pub async fn provision_checkout_session(
    state: &AppState,
    session: &CheckoutSessionDetails,
) -> Result<ProvisionOutcome, ProvisioningError> {
    if !session.is_paid() {
        return Err(ProvisioningError::NotPaid(session.id.clone()));
    }

    if let Some(payment) = state.payment_repo.find_payment_by_session(&session.id).await? {
        return existing_outcome(state, payment).await;
    }

    let mut metadata_map = session.metadata.clone();
    if !metadata_map.contains_key("email") {
        if let Some(email) = &session.customer_email {
            metadata_map.insert("email".into(), email.clone());
        }
    }
    let metadata = CheckoutMetadata::from_map(&metadata_map)?;

    let (user, user_created) = find_or_create_user(state, &metadata).await?;

    match attach_purchase(state, session, &metadata, &user).await {
        Ok(Some(payment)) => {
            info!(
                user_id = %user.id,
                session_id = %session.id,
                role = %user.role,
                user_created,
                "checkout session provisioned"
            );
            if user_created {
                if let Err(err) = issue_password_setup(state, user.id, &user.email).await {
                    warn!(?err, user_id = %user.id, "failed to send password setup email");
                }
            }
            let user = reload_user(state, user).await?;
            Ok(ProvisionOutcome {
                user,
                payment,
                already_provisioned: false,
                user_created,
            })
        }
        // lost the race against the other confirmation path
        Ok(None) => {
            if user_created {
                if let Err(err) = issue_password_setup(state, user.id, &user.email).await {
                    warn!(?err, user_id = %user.id, "failed to send password setup email");
                }
            }
            let payment = state
                .payment_repo
                .find_payment_by_session(&session.id)
                .await?
                .ok_or(sqlx::Error::RowNotFound)?;
            existing_outcome(state, payment).await
        }
        Err(err) => {
            if user_created {
                if let Err(cleanup_err) = state.db.delete_user(user.id).await {
                    error!(
                        ?cleanup_err,
                        user_id = %user.id,
                        "failed to roll back user after provisioning failure"
                    );
                }
            }
            Err(err)
        }
    }
}

async fn existing_outcome(
    state: &AppState,
    payment: Payment,
) -> Result<ProvisionOutcome, ProvisioningError> {
    let user = state
        .db
        .find_user_by_id(payment.user_id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)?;
    Ok(ProvisionOutcome {
        user,
        payment,
        already_provisioned: true,
        user_created: false,
    })
}

async fn reload_user(state: &AppState, user: User) -> Result<User, ProvisioningError> {
    Ok(state.db.find_user_by_id(user.id).await?.unwrap_or(user))
}

async fn find_or_create_user(
    state: &AppState,
    metadata: &CheckoutMetadata,
) -> Result<(User, bool), ProvisioningError> {
    if let Some(user) = state.db.find_user_by_email(&metadata.email).await? {
        return Ok((user, false));
    }

    let password_hash = hash_password(&temporary_password())
        .map_err(|e| ProvisioningError::Password(e.to_string()))?;
    let new_user = NewUser {
        email: metadata.email.clone(),
        password_hash,
        first_name: metadata.first_name.clone(),
        last_name: metadata.last_name.clone(),
        phone: metadata.phone.clone(),
        country: metadata.country.clone(),
        role: metadata.role,
        company_id: None,
        is_verified: true,
    };

    match state.db.create_user(&new_user).await {
        Ok(user) => Ok((user, true)),
        Err(err) if is_unique_violation(&err) => {
            let user = state
                .db
                .find_user_by_email(&metadata.email)
                .await?
                .ok_or(err)?;
            Ok((user, false))
        }
        Err(err) => Err(err.into()),
    }
}

/// Company, student row and payment. `Ok(None)` means another request
/// already recorded the payment for this session.
async fn attach_purchase(
    state: &AppState,
    session: &CheckoutSessionDetails,
    metadata: &CheckoutMetadata,
    user: &User,
) -> Result<Option<Payment>, ProvisioningError> {
    let mut company_id = user.company_id;

    if user.role == UserRole::Hr && company_id.is_none() {
        match metadata.company_name.as_deref() {
            Some(name) => company_id = Some(ensure_hr_company(state, user.id, name).await?),
            None => warn!(user_id = %user.id, "hr checkout without a company name"),
        }
    }

    let plan = PlanTier::parse(&metadata.plan);
    if user.role.has_student_profile() {
        state
            .db
            .ensure_student(user.id, company_id, plan.map(|p| p.as_str()))
            .await?;
    }

    let currency = session
        .currency
        .clone()
        .or_else(|| Currency::parse(&metadata.currency).map(|c| c.as_str().to_string()))
        .unwrap_or_default();
    let amount = session.amount_total.unwrap_or_else(|| {
        match (plan, Currency::parse(&currency)) {
            (Some(plan), Some(currency)) => plan.price(currency),
            _ => 0,
        }
    });

    let payment = NewPayment {
        user_id: user.id,
        stripe_session_id: session.id.clone(),
        stripe_customer_id: session.customer_id.clone(),
        amount,
        currency,
        plan: metadata.plan.clone(),
        status: PAYMENT_STATUS_PAID.to_string(),
    };
    Ok(state.payment_repo.insert_payment_if_absent(&payment).await?)
}

/// Returns the owner's company, creating it unless a concurrent call already
/// attached one. A company that loses the attach is deleted again.
async fn ensure_hr_company(
    state: &AppState,
    user_id: Uuid,
    name: &str,
) -> Result<Uuid, ProvisioningError> {
    if let Some(existing) = current_company(state, user_id).await? {
        return Ok(existing);
    }

    let company = state.company_repo.create_company(name, user_id).await?;
    if state.db.set_user_company(user_id, company.id).await? {
        return Ok(company.id);
    }

    info!(%user_id, company_id = %company.id, "company already attached; dropping duplicate");
    state.company_repo.delete_company(company.id).await?;
    current_company(state, user_id)
        .await?
        .ok_or(ProvisioningError::Database(sqlx::Error::RowNotFound))
}

async fn current_company(state: &AppState, user_id: Uuid) -> Result<Option<Uuid>, sqlx::Error> {
    Ok(state
        .db
        .find_user_by_id(user_id)
        .await?
        .and_then(|user| user.company_id))
}

/// Stores a hashed single-use token and emails the raw one.
pub async fn issue_password_setup(
    state: &AppState,
    user_id: Uuid,
    email: &str,
) -> Result<(), ProvisioningError> {
    let token = generate_token();
    let expires_at =
        OffsetDateTime::now_utc() + Duration::hours(state.config.password_setup_ttl_hours);
    state
        .db
        .insert_password_token(user_id, &hash_token(&token), expires_at)
        .await?;
    state.mailer.send_password_setup_email(email, &token).await?;
    Ok(())
}
