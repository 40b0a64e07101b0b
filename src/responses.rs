use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonResponse {
    pub status: String,
    pub success: bool,
    pub message: String,
    pub code: Option<String>,
}

impl JsonResponse {
    fn build(status: StatusCode, msg: &str, code: Option<&str>) -> Response {
        let ok = status.is_success();
        (
            status,
            Json(JsonResponse {
                status: if ok { "success" } else { "error" }.to_string(),
                success: ok,
                message: msg.to_string(),
                code: code.map(str::to_string),
            }),
        )
            .into_response()
    }

    pub fn success(msg: &str) -> Response {
        Self::build(StatusCode::OK, msg, None)
    }

    pub fn bad_request(msg: &str) -> Response {
        Self::build(StatusCode::BAD_REQUEST, msg, None)
    }

    pub fn unauthorized(msg: &str) -> Response {
        Self::build(StatusCode::UNAUTHORIZED, msg, None)
    }

    pub fn payment_required(msg: &str) -> Response {
        Self::build(StatusCode::PAYMENT_REQUIRED, msg, None)
    }

    pub fn forbidden(msg: &str) -> Response {
        Self::build(StatusCode::FORBIDDEN, msg, None)
    }

    pub fn forbidden_with_code(msg: &str, code: &str) -> Response {
        Self::build(StatusCode::FORBIDDEN, msg, Some(code))
    }

    pub fn not_found(msg: &str) -> Response {
        Self::build(StatusCode::NOT_FOUND, msg, None)
    }

    pub fn conflict(msg: &str) -> Response {
        Self::build(StatusCode::CONFLICT, msg, None)
    }

    pub fn too_many_requests(msg: &str) -> Response {
        Self::build(StatusCode::TOO_MANY_REQUESTS, msg, None)
    }

    pub fn server_error(msg: &str) -> Response {
        Self::build(StatusCode::INTERNAL_SERVER_ERROR, msg, None)
    }
}
