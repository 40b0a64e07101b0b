use axum::{
    extract::{Json, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::responses::JsonResponse;
use crate::services::provisioning::{provision_checkout_session, ProvisioningError};
use crate::services::stripe::StripeServiceError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    #[serde(default)]
    pub session_id: String,
}

/// Called by the success page so the account exists even when the webhook
/// is late or never arrives.
pub async fn verify_payment(
    State(app_state): State<AppState>,
    Json(payload): Json<VerifyPaymentRequest>,
) -> Response {
    let session_id = payload.session_id.trim();
    if session_id.is_empty() {
        return JsonResponse::bad_request("session_id is required");
    }

    let session = match app_state.stripe.retrieve_checkout_session(session_id).await {
        Ok(session) => session,
        Err(StripeServiceError::NotFound(_)) => {
            return JsonResponse::not_found("Checkout session not found");
        }
        Err(err) => {
            error!(?err, %session_id, "failed to retrieve checkout session");
            return JsonResponse::server_error("Failed to verify payment");
        }
    };

    if !session.is_paid() {
        info!(%session_id, payment_status = %session.payment_status, "verify-payment on unpaid session");
        return JsonResponse::payment_required("Payment not completed");
    }

    match provision_checkout_session(&app_state, &session).await {
        Ok(outcome) => Json(json!({
            "success": true,
            "user_id": outcome.user.id,
            "payment_id": outcome.payment.id,
            "email": outcome.user.email,
            "role": outcome.user.role,
            "already_provisioned": outcome.already_provisioned,
        }))
        .into_response(),
        Err(ProvisioningError::NotPaid(_)) => JsonResponse::payment_required("Payment not completed"),
        Err(ProvisioningError::Metadata(err)) => {
            warn!(?err, %session_id, "checkout session metadata unusable");
            JsonResponse::bad_request("Checkout session is missing signup details")
        }
        Err(err) => {
            error!(?err, %session_id, "failed to provision checkout session");
            JsonResponse::server_error("Failed to provision account")
        }
    }
}
