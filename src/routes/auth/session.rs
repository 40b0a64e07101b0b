use axum::{extract::FromRequestParts, http::request::Parts, response::Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration as TimeDuration;

use crate::responses::JsonResponse;
use crate::routes::auth::claims::Claims;
use crate::state::AppState;

pub const AUTH_COOKIE: &str = "auth_token";

#[derive(Debug, PartialEq)]
pub struct AuthSession(pub Claims);

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(AUTH_COOKIE)
            .ok_or_else(|| JsonResponse::unauthorized("Not authenticated"))?;

        let claims = state
            .session_signer
            .verify(token.value())
            .map_err(|_| JsonResponse::unauthorized("Invalid or expired session"))?;

        Ok(AuthSession(claims))
    }
}

pub fn auth_cookie(value: String, max_age: TimeDuration, secure: bool) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
}

#[cfg(test)]
pub(crate) fn session_cookie_for(state: &AppState, user: &crate::models::user::User) -> String {
    let exp = (time::OffsetDateTime::now_utc() + TimeDuration::hours(1)).unix_timestamp() as usize;
    let token = state
        .session_signer
        .sign(Claims::for_user(user, exp))
        .expect("JWT should create successfully");
    format!("{}={}", AUTH_COOKIE, token)
}
