use axum::{extract::State, response::IntoResponse};
use axum_extra::extract::cookie::CookieJar;
use time::Duration as TimeDuration;

use crate::responses::JsonResponse;
use crate::routes::auth::session::auth_cookie;
use crate::state::AppState;

pub async fn handle_logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let expired = auth_cookie(
        String::new(),
        TimeDuration::seconds(0),
        state.config.auth_cookie_secure,
    );
    (jar.add(expired), JsonResponse::success("Logged out"))
}
