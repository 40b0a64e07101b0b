use axum::{
    body::Body,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::Cookie;
use subtle::ConstantTimeEq;

use crate::responses::JsonResponse;
use crate::utils::tokens::generate_token;

pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Double-submit check for state-changing requests made with the session cookie.
pub async fn validate_csrf(req: Request<Body>, next: Next) -> Response {
    if !matches!(
        req.method(),
        &Method::POST | &Method::PUT | &Method::DELETE | &Method::PATCH
    ) {
        return next.run(req).await;
    }

    let token_header = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let cookie_token = extract_csrf_from_cookie(req.headers());

    match (token_header, cookie_token) {
        (Some(header), Some(cookie))
            if !header.is_empty() && bool::from(header.as_bytes().ct_eq(cookie.as_bytes())) =>
        {
            next.run(req).await
        }
        _ => JsonResponse::forbidden_with_code("Invalid CSRF token", "CSRF_INVALID"),
    }
}

fn extract_csrf_from_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all("cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|line| line.split(';'))
        .filter_map(|cookie| Cookie::parse_encoded(cookie.trim()).ok())
        .find(|parsed| parsed.name() == CSRF_COOKIE)
        .map(|parsed| parsed.value().to_string())
}

pub async fn get_csrf_token() -> Response {
    let token = generate_token();

    let set_cookie_value = format!(
        "{}={}; Path=/; SameSite=Strict; HttpOnly; Secure",
        CSRF_COOKIE, token
    );

    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(&set_cookie_value) {
        Ok(value) => {
            headers.insert(SET_COOKIE, value);
        }
        Err(_) => return JsonResponse::server_error("Failed to issue CSRF token"),
    }

    (StatusCode::OK, headers, token).into_response()
}
