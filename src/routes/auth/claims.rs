use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::{User, UserRole};

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Claims {
    pub id: String, // user UUID
    pub email: String,
    pub exp: usize, // expiration (as UNIX timestamp)
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub company_id: Option<Uuid>,
    pub iss: String,
    pub aud: String,
}

impl Claims {
    /// Issuer and audience are filled in by `SessionSigner::sign`.
    pub fn for_user(user: &User, exp: usize) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            exp,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
            company_id: user.company_id,
            iss: String::new(),
            aud: String::new(),
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.id).ok()
    }
}
