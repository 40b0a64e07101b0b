use super::{
    CheckoutSession, CheckoutSessionDetails, CreateCheckoutSessionRequest, StripeEvent,
    StripeService, StripeServiceError,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct MockStripeService {
    pub created_sessions: Arc<Mutex<Vec<CheckoutSession>>>,
    pub last_create_requests: Arc<Mutex<Vec<CreateCheckoutSessionRequest>>>,
    pub sessions: Arc<Mutex<HashMap<String, CheckoutSessionDetails>>>,
    pub retrieve_calls: Arc<Mutex<usize>>,
    pub fail_create: bool,
    pub reject_signatures: bool,
}

impl MockStripeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(self, session: CheckoutSessionDetails) -> Self {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id.clone(), session);
        self
    }

    pub fn create_calls(&self) -> usize {
        self.last_create_requests.lock().unwrap().len()
    }
}

fn make_id(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}

#[async_trait]
impl StripeService for MockStripeService {
    async fn create_checkout_session(
        &self,
        req: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeServiceError> {
        self.last_create_requests.lock().unwrap().push(req.clone());
        if self.fail_create {
            return Err(StripeServiceError::Api("mock stripe outage".into()));
        }

        let session = CheckoutSession {
            id: make_id("cs_test"),
            url: Some("https://example.test/checkout".into()),
        };
        self.created_sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSessionDetails, StripeServiceError> {
        *self.retrieve_calls.lock().unwrap() += 1;
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| StripeServiceError::NotFound(format!("session {} not found", session_id)))
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        _signature_header: &str,
    ) -> Result<StripeEvent, StripeServiceError> {
        if self.reject_signatures {
            return Err(StripeServiceError::Webhook("signature mismatch".into()));
        }
        StripeEvent::from_unverified_payload(payload)
    }
}
