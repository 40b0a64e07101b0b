use std::collections::HashMap;

use super::{
    CheckoutLineItem, CheckoutSession, CheckoutSessionDetails, CreateCheckoutSessionRequest,
    StripeEvent, StripeService, StripeServiceError,
};
use async_trait::async_trait;

pub struct LiveStripeService {
    client: stripe::Client,
    webhook_secret: Option<String>,
}

impl LiveStripeService {
    pub fn new(secret_key: impl Into<String>, webhook_secret: Option<String>) -> Self {
        let client = stripe::Client::new(secret_key);
        Self {
            client,
            webhook_secret,
        }
    }

    pub fn from_settings(settings: &crate::config::StripeSettings) -> Self {
        Self::new(settings.secret_key.clone(), settings.webhook_secret.clone())
    }
}

fn map_currency(code: &str) -> Result<stripe::Currency, StripeServiceError> {
    match code.to_ascii_lowercase().as_str() {
        "eur" => Ok(stripe::Currency::EUR),
        "usd" => Ok(stripe::Currency::USD),
        other => Err(StripeServiceError::Config(format!(
            "unsupported currency `{}`",
            other
        ))),
    }
}

fn map_line_items(
    items: &[CheckoutLineItem],
) -> Result<Vec<stripe::CreateCheckoutSessionLineItems>, StripeServiceError> {
    items
        .iter()
        .map(|li| {
            Ok(stripe::CreateCheckoutSessionLineItems {
                quantity: Some(li.quantity),
                price_data: Some(stripe::CreateCheckoutSessionLineItemsPriceData {
                    currency: map_currency(&li.currency)?,
                    unit_amount: Some(li.amount),
                    product_data: Some(
                        stripe::CreateCheckoutSessionLineItemsPriceDataProductData {
                            name: li.name.clone(),
                            ..Default::default()
                        },
                    ),
                    ..Default::default()
                }),
                ..Default::default()
            })
        })
        .collect()
}

#[async_trait]
impl StripeService for LiveStripeService {
    async fn create_checkout_session(
        &self,
        req: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeServiceError> {
        let mut params = stripe::CreateCheckoutSession::new();
        params.mode = Some(stripe::CheckoutSessionMode::Payment);
        params.success_url = Some(&req.success_url);
        params.cancel_url = Some(&req.cancel_url);
        if let Some(ref email) = req.customer_email {
            params.customer_email = Some(email);
        }
        if let Some(ref meta) = req.metadata {
            let m: HashMap<String, String> =
                meta.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            params.metadata = Some(m);
        }
        if !req.line_items.is_empty() {
            params.line_items = Some(map_line_items(&req.line_items)?);
        }

        let session = stripe::CheckoutSession::create(&self.client, params).await?;
        Ok(CheckoutSession {
            id: session.id.to_string(),
            url: session.url.clone(),
        })
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSessionDetails, StripeServiceError> {
        let id = session_id
            .parse::<stripe::CheckoutSessionId>()
            .map_err(|e| StripeServiceError::NotFound(e.to_string()))?;
        let session = stripe::CheckoutSession::retrieve(&self.client, &id, &[]).await?;
        let value =
            serde_json::to_value(&session).map_err(|e| StripeServiceError::Serde(e.to_string()))?;
        CheckoutSessionDetails::from_object(&value)
            .ok_or_else(|| StripeServiceError::Serde("checkout session without id".into()))
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent, StripeServiceError> {
        let secret = self
            .webhook_secret
            .as_deref()
            .ok_or_else(|| StripeServiceError::Config("STRIPE_WEBHOOK_SECRET is not set".into()))?;
        let payload_str =
            std::str::from_utf8(payload).map_err(|e| StripeServiceError::Serde(e.to_string()))?;
        let event = stripe::Webhook::construct_event(payload_str, signature_header, secret)?;
        let payload =
            serde_json::to_value(&event).map_err(|e| StripeServiceError::Serde(e.to_string()))?;
        Ok(StripeEvent {
            id: event.id.to_string(),
            r#type: event.type_.to_string(),
            payload,
        })
    }
}
