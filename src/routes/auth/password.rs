use axum::{
    extract::{Json, State},
    response::Response,
};
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{error, warn};

use crate::{
    models::user::normalize_email,
    responses::JsonResponse,
    services::provisioning::issue_password_setup,
    state::AppState,
    utils::{
        password::{hash_password, is_acceptable_password, MIN_PASSWORD_LENGTH},
        tokens::hash_token,
    },
};

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct SetPasswordRequest {
    pub token: String,
    pub password: String,
}

/// Always answers 200 so the endpoint does not reveal which emails have accounts.
pub async fn handle_forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Response {
    let email = normalize_email(&payload.email);

    match state.db.find_user_by_email(&email).await {
        Ok(Some(user)) => {
            if let Err(err) = issue_password_setup(&state, user.id, &user.email).await {
                warn!(?err, user_id = %user.id, "failed to issue password reset");
            }
        }
        Ok(None) => {}
        Err(err) => error!(?err, "error looking up user by email"),
    }

    JsonResponse::success("If that email exists, a reset link has been sent.")
}

pub async fn handle_set_password(
    State(state): State<AppState>,
    Json(payload): Json<SetPasswordRequest>,
) -> Response {
    if payload.token.trim().is_empty() {
        return JsonResponse::bad_request("Token is required");
    }
    if !is_acceptable_password(&payload.password) {
        return JsonResponse::bad_request(&format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }

    let password_hash = match hash_password(&payload.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!(?err, "password hashing failed");
            return JsonResponse::server_error("Internal error");
        }
    };

    let user_id = match state
        .db
        .consume_password_token(&hash_token(&payload.token), OffsetDateTime::now_utc())
        .await
    {
        Ok(Some(user_id)) => user_id,
        Ok(None) => return JsonResponse::bad_request("Invalid or expired token"),
        Err(err) => {
            error!(?err, "failed to consume password token");
            return JsonResponse::server_error("Database error");
        }
    };

    match state.db.update_user_password(user_id, &password_hash).await {
        Ok(()) => JsonResponse::success("Password updated"),
        Err(err) => {
            error!(?err, %user_id, "failed to update password");
            JsonResponse::server_error("Database error")
        }
    }
}
