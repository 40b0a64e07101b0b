use axum::{
    extract::{Json, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use tracing::{error, info};

use crate::{
    models::user::{is_valid_email, normalize_email},
    responses::JsonResponse,
    services::otp::{OtpError, OtpStore},
    state::AppState,
};

#[derive(Deserialize)]
pub struct SendOtpRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub code: String,
}

// POST /api/send-otp-email
pub async fn handle_send_otp(
    State(state): State<AppState>,
    Json(payload): Json<SendOtpRequest>,
) -> Response {
    if !is_valid_email(&payload.email) {
        return JsonResponse::bad_request("A valid email address is required");
    }
    let email = normalize_email(&payload.email);

    let ttl = state.config.otp.ttl;
    let code = OtpStore::generate();
    state
        .otp_store
        .store(&email, &code, OffsetDateTime::now_utc() + ttl);

    let ttl_minutes = ttl.as_secs().div_ceil(60);
    if let Err(err) = state.mailer.send_otp_email(&email, &code, ttl_minutes).await {
        // a code nobody received must not stay valid
        state.otp_store.delete(&email);
        error!(?err, %email, "failed to send verification code");
        return JsonResponse::server_error("Failed to send verification code");
    }

    info!(%email, "verification code sent");
    Json(json!({
        "success": true,
        "message": "Verification code sent",
        "expires_in": ttl.as_secs(),
    }))
    .into_response()
}

// POST /api/verify-otp
pub async fn handle_verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOtpRequest>,
) -> Response {
    let email = normalize_email(&payload.email);
    let code = payload.code.trim();
    if email.is_empty() || code.is_empty() {
        return JsonResponse::bad_request("Email and code are required");
    }

    match state
        .otp_store
        .verify(&email, code, OffsetDateTime::now_utc())
    {
        Ok(()) => Json(json!({
            "success": true,
            "verified": true,
            "message": "Email verified",
        }))
        .into_response(),
        Err(OtpError::TooManyAttempts) => {
            JsonResponse::too_many_requests("Too many invalid attempts. Request a new code.")
        }
        Err(OtpError::Expired) => {
            JsonResponse::bad_request("Verification code has expired. Request a new code.")
        }
        Err(OtpError::NotFound) | Err(OtpError::Mismatch { .. }) => {
            JsonResponse::bad_request("Invalid or expired verification code")
        }
    }
}
