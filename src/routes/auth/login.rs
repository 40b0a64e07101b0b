use axum::{
    extract::{Json, State},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::{Duration, OffsetDateTime};
use tracing::{error, warn};

use super::{
    claims::Claims,
    session::{auth_cookie, AuthSession},
};
use crate::{
    models::user::normalize_email,
    responses::JsonResponse,
    state::AppState,
    utils::password::verify_password,
};

#[derive(Deserialize, Serialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember: bool,
}

pub async fn handle_login(
    State(app_state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginPayload>,
) -> Response {
    let email = normalize_email(&payload.email);
    let user = match app_state.db.find_user_by_email(&email).await {
        Ok(Some(record)) => record,
        Ok(None) => return JsonResponse::unauthorized("Invalid credentials"),
        Err(e) => {
            error!(?e, "failed to look up user for login");
            return JsonResponse::server_error("Database error");
        }
    };

    match verify_password(&payload.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => return JsonResponse::unauthorized("Invalid credentials"),
        Err(e) => {
            warn!(?e, user_id = %user.id, "stored password hash could not be parsed");
            return JsonResponse::unauthorized("Invalid credentials");
        }
    }

    let expires_in = if payload.remember {
        Duration::days(30)
    } else {
        Duration::days(7)
    };
    let exp = (OffsetDateTime::now_utc() + expires_in).unix_timestamp() as usize;

    let token = match app_state.session_signer.sign(Claims::for_user(&user, exp)) {
        Ok(token) => token,
        Err(e) => {
            error!(?e, "JWT creation failed");
            return JsonResponse::server_error("Token generation failed");
        }
    };

    let cookie = auth_cookie(token, expires_in, app_state.config.auth_cookie_secure);
    (
        jar.add(cookie),
        Json(json!({
            "success": true,
            "user": user,
        })),
    )
        .into_response()
}

pub async fn handle_me(
    State(app_state): State<AppState>,
    AuthSession(claims): AuthSession,
) -> Response {
    let Some(user_id) = claims.user_id() else {
        return JsonResponse::unauthorized("Invalid user ID");
    };

    match app_state.db.find_user_by_id(user_id).await {
        Ok(Some(user)) => Json(json!({ "success": true, "user": user })).into_response(),
        Ok(None) => JsonResponse::unauthorized("User not found"),
        Err(e) => {
            error!(?e, %user_id, "failed to load current user");
            JsonResponse::server_error("Database error")
        }
    }
}
