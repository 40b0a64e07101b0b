pub mod auth;
pub mod checkout;
pub mod company;
pub mod employees;
pub mod verify_payment;
pub mod webhook;

use axum::{
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};

use crate::responses::JsonResponse;
use crate::state::AppState;
use crate::utils::csrf::{get_csrf_token, validate_csrf};
use auth::{
    handle_forgot_password, handle_login, handle_logout, handle_me, handle_send_otp,
    handle_set_password, handle_verify_otp,
};

/// Credential and OTP endpoints. `main` puts the stricter rate limiter on these.
pub fn throttled_routes() -> Router<AppState> {
    let auth = Router::new()
        .route("/login", post(handle_login))
        .route("/forgot-password", post(handle_forgot_password))
        .route("/set-password", post(handle_set_password))
        .route(
            "/logout",
            post(handle_logout).layer(middleware::from_fn(validate_csrf)),
        );

    Router::new()
        .route("/api/send-otp-email", post(handle_send_otp))
        .route("/api/verify-otp", post(handle_verify_otp))
        .nest("/api/auth", auth)
}

/// Everything else: payments, session reads and HR management.
pub fn open_routes() -> Router<AppState> {
    // session-authenticated mutations need the double-submit token
    let hr = Router::new()
        .route("/company", get(company::get_company).put(company::update_company))
        .route("/employees", get(employees::list_employees))
        .route("/create-employee", post(employees::create_employee))
        .route(
            "/employees/{id}",
            put(employees::update_employee).delete(employees::delete_employee),
        )
        .layer(middleware::from_fn(validate_csrf));

    Router::new()
        .route("/", get(root))
        .route("/api/checkout", post(checkout::create_checkout_session))
        .route("/api/webhook", post(webhook::webhook))
        .route("/api/verify-payment", post(verify_payment::verify_payment))
        .route("/api/create-rh-user", post(company::create_hr_user))
        .route("/api/auth/me", get(handle_me))
        .route("/api/auth/csrf-token", get(get_csrf_token))
        .nest("/api", hr)
}

async fn root() -> Response {
    JsonResponse::success("Pitchlab API").into_response()
}
