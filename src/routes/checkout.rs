use axum::{
    extract::{Json, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::models::{
    checkout::CheckoutMetadata,
    plan::{allowed_amounts, Currency, PlanTier},
    user::{is_valid_email, normalize_email, UserRole},
};
use crate::responses::JsonResponse;
use crate::services::stripe::{CheckoutLineItem, CreateCheckoutSessionRequest};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub plan: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub role: Option<String>,
    pub company_name: Option<String>,
}

#[derive(Debug)]
struct ValidCheckout {
    plan: PlanTier,
    currency: Currency,
    amount: i64,
    metadata: CheckoutMetadata,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn validate(req: &CheckoutRequest) -> Result<ValidCheckout, String> {
    let email = non_empty(&req.email).ok_or("Email is required")?;
    if !is_valid_email(&email) {
        return Err("Email is invalid".into());
    }
    let first_name = non_empty(&req.first_name).ok_or("First name is required")?;
    let last_name = non_empty(&req.last_name).ok_or("Last name is required")?;

    let currency_raw = non_empty(&req.currency).ok_or("Currency is required")?;
    let currency =
        Currency::parse(&currency_raw).ok_or_else(|| format!("Unsupported currency: {}", currency_raw))?;

    let plan_raw = non_empty(&req.plan).ok_or("Plan is required")?;
    let plan = PlanTier::parse(&plan_raw).ok_or_else(|| format!("Unknown plan: {}", plan_raw))?;

    let amount = req.amount.ok_or("Amount is required")?;
    if !allowed_amounts().contains(&amount) {
        return Err(format!("Invalid amount: {}", amount));
    }
    if amount != plan.price(currency) {
        return Err(format!(
            "Amount {} does not match the {} plan price",
            amount,
            plan.as_str()
        ));
    }

    let role = match non_empty(&req.role) {
        Some(raw) => UserRole::parse(&raw)
            .filter(UserRole::is_self_service)
            .ok_or_else(|| format!("Invalid role: {}", raw))?,
        None => UserRole::Learner,
    };
    let company_name = non_empty(&req.company_name);
    if role == UserRole::Hr && company_name.is_none() {
        return Err("Company name is required for HR accounts".into());
    }

    Ok(ValidCheckout {
        plan,
        currency,
        amount,
        metadata: CheckoutMetadata {
            email: normalize_email(&email),
            first_name,
            last_name,
            phone: non_empty(&req.phone),
            country: non_empty(&req.country),
            plan: plan.as_str().to_string(),
            currency: currency.as_str().to_string(),
            role,
            company_name,
        },
    })
}

// POST /api/checkout
pub async fn create_checkout_session(
    State(app_state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> Response {
    let checkout = match validate(&payload) {
        Ok(valid) => valid,
        Err(msg) => return JsonResponse::bad_request(&msg),
    };

    let req = CreateCheckoutSessionRequest {
        success_url: app_state.config.checkout_success_url(),
        cancel_url: app_state.config.checkout_cancel_url(),
        line_items: vec![CheckoutLineItem {
            name: checkout.plan.display_name().to_string(),
            amount: checkout.amount,
            currency: checkout.currency.as_str().to_string(),
            quantity: 1,
        }],
        customer_email: Some(checkout.metadata.email.clone()),
        metadata: Some(checkout.metadata.to_map()),
    };

    match app_state.stripe.create_checkout_session(req).await {
        Ok(session) => {
            info!(
                session_id = %session.id,
                plan = checkout.plan.as_str(),
                role = %checkout.metadata.role,
                "checkout session created"
            );
            Json(json!({ "session_id": session.id, "url": session.url })).into_response()
        }
        Err(err) => {
            error!(?err, "failed to create checkout session");
            JsonResponse::server_error("Failed to create checkout session")
        }
    }
}
