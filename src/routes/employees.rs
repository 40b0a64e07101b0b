use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::company::{trimmed, HrContext};
use crate::db::is_unique_violation;
use crate::models::user::{is_valid_email, normalize_email, NewUser, UserProfileUpdate, UserRole};
use crate::responses::JsonResponse;
use crate::services::provisioning::issue_password_setup;
use crate::state::AppState;
use crate::utils::{password::hash_password, tokens::temporary_password};

// GET /api/employees
pub async fn list_employees(
    State(app_state): State<AppState>,
    HrContext { company, .. }: HrContext,
) -> Response {
    match app_state.db.list_company_employees(company.id).await {
        Ok(employees) => Json(json!({ "success": true, "employees": employees })).into_response(),
        Err(err) => {
            error!(?err, company_id = %company.id, "failed to list employees");
            JsonResponse::server_error("Failed to load employees")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateEmployeePayload {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

// POST /api/create-employee
pub async fn create_employee(
    State(app_state): State<AppState>,
    HrContext { user: hr, company }: HrContext,
    Json(payload): Json<CreateEmployeePayload>,
) -> Response {
    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        return JsonResponse::bad_request("A valid email is required");
    }
    let (Some(first_name), Some(last_name)) =
        (trimmed(&payload.first_name), trimmed(&payload.last_name))
    else {
        return JsonResponse::bad_request("First and last name are required");
    };

    // employees choose their own password through the setup link
    let password_hash = match hash_password(&temporary_password()) {
        Ok(hash) => hash,
        Err(err) => {
            error!(?err, "failed to hash placeholder password");
            return JsonResponse::server_error("Failed to create employee");
        }
    };

    let new_user = NewUser {
        email,
        password_hash,
        first_name,
        last_name,
        phone: payload.phone.as_deref().and_then(trimmed),
        country: None,
        role: UserRole::Employee,
        company_id: Some(company.id),
        is_verified: false,
    };
    let employee = match app_state.db.create_user(&new_user).await {
        Ok(user) => user,
        Err(err) if is_unique_violation(&err) => {
            return JsonResponse::conflict("An account with this email already exists");
        }
        Err(err) => {
            error!(?err, company_id = %company.id, "failed to create employee");
            return JsonResponse::server_error("Failed to create employee");
        }
    };

    if let Err(err) = app_state
        .db
        .ensure_student(employee.id, Some(company.id), None)
        .await
    {
        error!(?err, user_id = %employee.id, "failed to create student profile; removing employee");
        if let Err(cleanup_err) = app_state.db.delete_user(employee.id).await {
            error!(?cleanup_err, user_id = %employee.id, "failed to remove orphaned employee");
        }
        return JsonResponse::server_error("Failed to create employee");
    }

    if let Err(err) = issue_password_setup(&app_state, employee.id, &employee.email).await {
        warn!(?err, user_id = %employee.id, "failed to send employee password setup email");
    }

    info!(
        hr_id = %hr.id,
        company_id = %company.id,
        user_id = %employee.id,
        "employee created"
    );
    (
        StatusCode::CREATED,
        Json(json!({ "success": true, "employee": employee })),
    )
        .into_response()
}

// PUT /api/employees/{id}
pub async fn update_employee(
    State(app_state): State<AppState>,
    HrContext { company, .. }: HrContext,
    Path(employee_id): Path<Uuid>,
    Json(payload): Json<UserProfileUpdate>,
) -> Response {
    let update = UserProfileUpdate {
        first_name: payload.first_name.as_deref().and_then(trimmed),
        last_name: payload.last_name.as_deref().and_then(trimmed),
        phone: payload.phone.as_deref().map(str::trim).map(str::to_string),
    };
    if update.is_empty() {
        return JsonResponse::bad_request("Nothing to update");
    }

    match app_state
        .db
        .update_company_employee(company.id, employee_id, &update)
        .await
    {
        Ok(Some(employee)) => {
            Json(json!({ "success": true, "employee": employee })).into_response()
        }
        Ok(None) => JsonResponse::not_found("Employee not found"),
        Err(err) => {
            error!(?err, %employee_id, "failed to update employee");
            JsonResponse::server_error("Failed to update employee")
        }
    }
}

// DELETE /api/employees/{id}
pub async fn delete_employee(
    State(app_state): State<AppState>,
    HrContext { user: hr, company }: HrContext,
    Path(employee_id): Path<Uuid>,
) -> Response {
    match app_state
        .db
        .delete_company_employee(company.id, employee_id)
        .await
    {
        Ok(true) => {
            info!(hr_id = %hr.id, %employee_id, "employee deleted");
            JsonResponse::success("Employee deleted")
        }
        Ok(false) => JsonResponse::not_found("Employee not found"),
        Err(err) => {
            error!(?err, %employee_id, "failed to delete employee");
            JsonResponse::server_error("Failed to delete employee")
        }
    }
}
