use axum::{
    extract::{FromRequestParts, Json, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::db::is_unique_violation;
use crate::models::{
    company::Company,
    user::{is_valid_email, normalize_email, NewUser, User, UserRole},
};
use crate::responses::JsonResponse;
use crate::routes::auth::session::AuthSession;
use crate::state::AppState;
use crate::utils::password::{hash_password, is_acceptable_password};

/// The signed-in HR user together with the company they manage.
///
/// Role and company are read from the database rather than the session
/// claims: an HR account gets its company after the token was issued.
#[derive(Debug, Clone)]
pub struct HrContext {
    pub user: User,
    pub company: Company,
}

impl FromRequestParts<AppState> for HrContext {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthSession(claims) = AuthSession::from_request_parts(parts, state).await?;
        let user_id = claims
            .user_id()
            .ok_or_else(|| JsonResponse::unauthorized("Invalid user ID"))?;

        let user = match state.db.find_user_by_id(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(JsonResponse::unauthorized("User not found")),
            Err(err) => {
                error!(?err, %user_id, "failed to load hr user");
                return Err(JsonResponse::server_error("Database error"));
            }
        };
        if user.role != UserRole::Hr {
            return Err(JsonResponse::forbidden_with_code(
                "Only HR accounts can manage companies",
                "HR_ONLY",
            ));
        }

        let Some(company_id) = user.company_id else {
            return Err(JsonResponse::not_found("No company attached to this account"));
        };
        match state.company_repo.find_company(company_id).await {
            Ok(Some(company)) => Ok(HrContext { user, company }),
            Ok(None) => Err(JsonResponse::not_found("Company not found")),
            Err(err) => {
                error!(?err, %company_id, "failed to load company");
                Err(JsonResponse::server_error("Database error"))
            }
        }
    }
}

pub(crate) fn trimmed(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[derive(Debug, Deserialize)]
pub struct CreateHrUserPayload {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub company_name: String,
    pub phone: Option<String>,
}

// POST /api/create-rh-user
pub async fn create_hr_user(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateHrUserPayload>,
) -> Response {
    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        return JsonResponse::bad_request("A valid email is required");
    }
    if !is_acceptable_password(&payload.password) {
        return JsonResponse::bad_request("Password must be at least 8 characters");
    }
    let (Some(first_name), Some(last_name), Some(company_name)) = (
        trimmed(&payload.first_name),
        trimmed(&payload.last_name),
        trimmed(&payload.company_name),
    ) else {
        return JsonResponse::bad_request("Name and company name are required");
    };

    let password_hash = match hash_password(&payload.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!(?err, "failed to hash hr password");
            return JsonResponse::server_error("Failed to create account");
        }
    };

    let new_user = NewUser {
        email,
        password_hash,
        first_name,
        last_name,
        phone: payload.phone.as_deref().and_then(trimmed),
        country: None,
        role: UserRole::Hr,
        company_id: None,
        is_verified: true,
    };
    let user = match app_state.db.create_user(&new_user).await {
        Ok(user) => user,
        Err(err) if is_unique_violation(&err) => {
            return JsonResponse::conflict("An account with this email already exists");
        }
        Err(err) => {
            error!(?err, "failed to create hr user");
            return JsonResponse::server_error("Failed to create account");
        }
    };

    let company = match attach_new_company(&app_state, &user, &company_name).await {
        Ok(company) => company,
        Err(err) => {
            error!(?err, user_id = %user.id, "failed to create company; removing hr user");
            if let Err(cleanup_err) = app_state.db.delete_user(user.id).await {
                error!(?cleanup_err, user_id = %user.id, "failed to remove orphaned hr user");
            }
            return JsonResponse::server_error("Failed to create company");
        }
    };

    info!(user_id = %user.id, company_id = %company.id, "hr account created");
    let user = User {
        company_id: Some(company.id),
        ..user
    };
    (
        StatusCode::CREATED,
        Json(json!({ "success": true, "user": user, "company": company })),
    )
        .into_response()
}

async fn attach_new_company(
    app_state: &AppState,
    user: &User,
    name: &str,
) -> Result<Company, sqlx::Error> {
    let company = app_state.company_repo.create_company(name, user.id).await?;
    if !app_state.db.set_user_company(user.id, company.id).await? {
        app_state.company_repo.delete_company(company.id).await?;
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(company)
}

// GET /api/company
pub async fn get_company(HrContext { company, .. }: HrContext) -> Response {
    Json(json!({ "success": true, "company": company })).into_response()
}

#[derive(Debug, Deserialize)]
pub struct UpdateCompanyPayload {
    #[serde(default)]
    pub name: String,
}

// PUT /api/company
pub async fn update_company(
    State(app_state): State<AppState>,
    HrContext { user, company }: HrContext,
    Json(payload): Json<UpdateCompanyPayload>,
) -> Response {
    let Some(name) = trimmed(&payload.name) else {
        return JsonResponse::bad_request("Company name is required");
    };

    match app_state.company_repo.rename_company(company.id, &name).await {
        Ok(Some(company)) => {
            info!(user_id = %user.id, company_id = %company.id, "company renamed");
            Json(json!({ "success": true, "company": company })).into_response()
        }
        Ok(None) => {
            warn!(company_id = %company.id, "company disappeared during rename");
            JsonResponse::not_found("Company not found")
        }
        Err(err) => {
            error!(?err, company_id = %company.id, "failed to rename company");
            JsonResponse::server_error("Failed to update company")
        }
    }
}
