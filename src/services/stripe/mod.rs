// NOTE: async-stripe is compiled with a minimal feature set (runtime-tokio-hyper, checkout,
// webhook-events, and connect to satisfy webhook payload types). Touching APIs outside those
// features will require updating Cargo.toml explicitly.
use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::payment::PAYMENT_STATUS_PAID;

#[derive(Debug, thiserror::Error)]
pub enum StripeServiceError {
    #[error("stripe api error: {0}")]
    Api(String),
    #[error("webhook verification failed: {0}")]
    Webhook(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

impl From<stripe::StripeError> for StripeServiceError {
    fn from(err: stripe::StripeError) -> Self {
        match err {
            stripe::StripeError::Stripe(ref req) if req.http_status == 404 => {
                StripeServiceError::NotFound(err.to_string())
            }
            other => StripeServiceError::Api(other.to_string()),
        }
    }
}

impl From<stripe::WebhookError> for StripeServiceError {
    fn from(err: stripe::WebhookError) -> Self {
        StripeServiceError::Webhook(err.to_string())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutLineItem {
    pub name: String,
    /// Unit amount in minor units.
    pub amount: i64,
    pub currency: String,
    pub quantity: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateCheckoutSessionRequest {
    pub success_url: String,
    pub cancel_url: String,
    pub line_items: Vec<CheckoutLineItem>,
    pub customer_email: Option<String>,
    pub metadata: Option<BTreeMap<String, String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

/// The parts of a Checkout Session that account provisioning reads.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckoutSessionDetails {
    pub id: String,
    pub payment_status: String,
    pub customer_id: Option<String>,
    pub customer_email: Option<String>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl CheckoutSessionDetails {
    /// Reads a `checkout.session` object as serialized by Stripe. `customer`
    /// may be either an id or an expanded object.
    pub fn from_object(obj: &Value) -> Option<Self> {
        let id = obj.get("id")?.as_str()?.to_string();
        let customer_id = match obj.get("customer") {
            Some(Value::String(id)) => Some(id.clone()),
            Some(Value::Object(map)) => map.get("id").and_then(Value::as_str).map(str::to_string),
            _ => None,
        };
        let customer_email = obj
            .get("customer_details")
            .and_then(|d| d.get("email"))
            .and_then(Value::as_str)
            .or_else(|| obj.get("customer_email").and_then(Value::as_str))
            .map(str::to_string);
        let metadata = obj
            .get("metadata")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            id,
            payment_status: obj
                .get("payment_status")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            customer_id,
            customer_email,
            amount_total: obj.get("amount_total").and_then(Value::as_i64),
            currency: obj
                .get("currency")
                .and_then(Value::as_str)
                .map(str::to_lowercase),
            metadata,
        })
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status == PAYMENT_STATUS_PAID
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    pub r#type: String,
    pub payload: Value,
}

impl StripeEvent {
    /// Parses an event without checking its signature. Only used when no
    /// webhook secret is configured.
    pub fn from_unverified_payload(payload: &[u8]) -> Result<Self, StripeServiceError> {
        let val: Value =
            serde_json::from_slice(payload).map_err(|e| StripeServiceError::Serde(e.to_string()))?;
        let id = val
            .get("id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StripeServiceError::Serde("event is missing `id`".into()))?
            .to_string();
        let ty = val
            .get("type")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StripeServiceError::Serde("event is missing `type`".into()))?
            .to_string();
        Ok(StripeEvent {
            id,
            r#type: ty,
            payload: val,
        })
    }

    pub fn checkout_session(&self) -> Option<CheckoutSessionDetails> {
        let obj = self.payload.get("data")?.get("object")?;
        CheckoutSessionDetails::from_object(obj)
    }
}

#[async_trait]
pub trait StripeService: Send + Sync {
    async fn create_checkout_session(
        &self,
        req: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeServiceError>;

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSessionDetails, StripeServiceError>;

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent, StripeServiceError>;
}

mod live;
#[cfg(test)]
mod mock;

pub use live::LiveStripeService;
#[cfg(test)]
pub use mock::MockStripeService;
