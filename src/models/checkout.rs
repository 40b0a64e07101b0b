use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::user::{normalize_email, UserRole};

/// Signup wizard fields carried through Stripe as session metadata and read
/// back verbatim when the payment is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutMetadata {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub plan: String,
    pub currency: String,
    pub role: UserRole,
    pub company_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    #[error("checkout metadata is missing `{0}`")]
    MissingField(&'static str),
    #[error("checkout metadata has an unknown role `{0}`")]
    UnknownRole(String),
}

impl CheckoutMetadata {
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("email".to_string(), self.email.clone());
        map.insert("first_name".to_string(), self.first_name.clone());
        map.insert("last_name".to_string(), self.last_name.clone());
        map.insert("plan".to_string(), self.plan.clone());
        map.insert("currency".to_string(), self.currency.clone());
        map.insert("role".to_string(), self.role.as_str().to_string());
        if let Some(phone) = &self.phone {
            map.insert("phone".to_string(), phone.clone());
        }
        if let Some(country) = &self.country {
            map.insert("country".to_string(), country.clone());
        }
        if let Some(company) = &self.company_name {
            map.insert("company_name".to_string(), company.clone());
        }
        map
    }

    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, MetadataError> {
        let get = |key: &str| {
            map.get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let required = |key: &'static str| get(key).ok_or(MetadataError::MissingField(key));

        let role = match get("role") {
            Some(raw) => UserRole::parse(&raw).ok_or(MetadataError::UnknownRole(raw))?,
            None => UserRole::Learner,
        };

        Ok(CheckoutMetadata {
            email: normalize_email(&required("email")?),
            first_name: required("first_name")?,
            last_name: required("last_name")?,
            phone: get("phone"),
            country: get("country"),
            plan: get("plan").unwrap_or_default(),
            currency: get("currency").unwrap_or_default(),
            role,
            company_name: get("company_name"),
        })
    }
}
