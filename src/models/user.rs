use core::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(sqlx::Type, Debug, Deserialize, Serialize, PartialEq, Eq, Copy, Clone, Hash)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Learner,
    Coach,
    Hr,
    Employee,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Learner => "learner",
            UserRole::Coach => "coach",
            UserRole::Hr => "hr",
            UserRole::Employee => "employee",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "learner" => Some(UserRole::Learner),
            "coach" => Some(UserRole::Coach),
            // the signup form labels HR accounts "rh"
            "hr" | "rh" => Some(UserRole::Hr),
            "employee" => Some(UserRole::Employee),
            _ => None,
        }
    }

    /// Roles that are trained on the platform and therefore own a student row.
    pub fn has_student_profile(&self) -> bool {
        matches!(self, UserRole::Learner | UserRole::Employee)
    }

    /// Roles a visitor may pick for themselves in the signup wizard.
    pub fn is_self_service(&self) -> bool {
        !matches!(self, UserRole::Employee)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, FromRow, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub role: UserRole,
    pub company_id: Option<Uuid>,
    pub is_verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub role: UserRole,
    pub company_id: Option<Uuid>,
    pub is_verified: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

impl UserProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.phone.is_none()
    }
}

/// Lowercases and trims an address so lookups and uniqueness are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Cheap shape check; deliverability is proven by the OTP round trip.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}
