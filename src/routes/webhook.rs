use axum::Json;
use axum::{extract::State, http::HeaderMap, response::IntoResponse, response::Response};
use serde_json::json;
use tracing::{error, info, warn};

use crate::db::stripe_event_log_repository::EventClaim;
use crate::responses::JsonResponse;
use crate::services::provisioning::{provision_checkout_session, ProvisioningError};
use crate::services::stripe::StripeEvent;
use crate::state::AppState;

fn ack() -> Response {
    Json(json!({ "received": true })).into_response()
}

fn read_event(app_state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<StripeEvent, Response> {
    if app_state.config.webhook_signing_enabled() {
        let sig = headers
            .get("Stripe-Signature")
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| JsonResponse::bad_request("Missing Stripe-Signature"))?;

        app_state.stripe.verify_webhook(body, sig).map_err(|err| {
            warn!(?err, "stripe webhook verification failed");
            JsonResponse::bad_request("Invalid webhook signature")
        })
    } else {
        warn!("STRIPE_WEBHOOK_SECRET not set; accepting unsigned webhook payload");
        StripeEvent::from_unverified_payload(body).map_err(|err| {
            warn!(?err, "unparseable webhook payload");
            JsonResponse::bad_request("Invalid webhook payload")
        })
    }
}

// POST /api/webhook
pub async fn webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let evt = match read_event(&app_state, &headers, &body) {
        Ok(evt) => evt,
        Err(resp) => return resp,
    };

    match app_state
        .stripe_event_repo
        .claim_event(&evt.id, &evt.r#type)
        .await
    {
        Ok(EventClaim::Claimed) => {}
        Ok(EventClaim::Processed) => {
            info!(event_id = %evt.id, "duplicate stripe event ignored");
            return Json(json!({ "received": true, "duplicate": true })).into_response();
        }
        Ok(EventClaim::InFlight) => {
            // non-2xx keeps Stripe retrying until the first delivery settles
            info!(event_id = %evt.id, "stripe event still processing");
            return JsonResponse::conflict("Event is still being processed");
        }
        Err(err) => {
            error!(?err, event_id = %evt.id, "failed to record stripe event");
            return JsonResponse::server_error("Failed to record event");
        }
    }

    match handle_event(&app_state, &evt).await {
        Ok(()) => {
            if let Err(err) = app_state.stripe_event_repo.mark_event_processed(&evt.id).await {
                error!(?err, event_id = %evt.id, "failed to mark stripe event processed");
            }
            ack()
        }
        Err(err) => {
            error!(?err, event_id = %evt.id, event_type = %evt.r#type, "stripe event processing failed");
            // release the claim so Stripe's retry is processed
            if let Err(release_err) = app_state.stripe_event_repo.forget_event(&evt.id).await {
                error!(?release_err, event_id = %evt.id, "failed to release stripe event claim");
            }
            JsonResponse::server_error("Webhook processing failed")
        }
    }
}

async fn handle_event(app_state: &AppState, evt: &StripeEvent) -> Result<(), ProvisioningError> {
    match evt.r#type.as_str() {
        "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
            let Some(session) = evt.checkout_session() else {
                warn!(event_id = %evt.id, "checkout event without a session object");
                return Ok(());
            };
            if !session.is_paid() {
                info!(
                    session_id = %session.id,
                    payment_status = %session.payment_status,
                    "checkout session not paid yet; waiting for async confirmation"
                );
                return Ok(());
            }

            match provision_checkout_session(app_state, &session).await {
                Ok(outcome) => {
                    info!(
                        session_id = %session.id,
                        user_id = %outcome.user.id,
                        already_provisioned = outcome.already_provisioned,
                        "checkout webhook handled"
                    );
                    Ok(())
                }
                Err(ProvisioningError::Metadata(err)) => {
                    // retrying cannot fix a session created without our metadata
                    warn!(?err, session_id = %session.id, "checkout session metadata unusable");
                    Ok(())
                }
                Err(err) => Err(err),
            }
        }
        "checkout.session.expired" | "checkout.session.async_payment_failed" => {
            let session_id = evt.checkout_session().map(|s| s.id).unwrap_or_default();
            warn!(event_type = %evt.r#type, %session_id, "checkout session did not complete");
            Ok(())
        }
        "payment_intent.payment_failed" => {
            let message = evt
                .payload
                .pointer("/data/object/last_payment_error/message")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            warn!(event_id = %evt.id, %message, "payment failed");
            Ok(())
        }
        other => {
            info!(event_type = %other, "unhandled stripe event type");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        routing::post,
        Router,
    };
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::config::{test_config, Config};
    use crate::db::mock_db::MockDb;
    use crate::db::stripe_event_log_repository::StripeEventLogRepository;
    use crate::services::{smtp_mailer::MockMailer, stripe::MockStripeService};
    use crate::state::test_support::TestApp;

    fn completed_event(event_id: &str, session_id: &str, payment_status: &str) -> Value {
        json!({
            "id": event_id,
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": session_id,
                "object": "checkout.session",
                "payment_status": payment_status,
                "customer": "cus_123",
                "amount_total": 1900,
                "currency": "usd",
                "metadata": {
                    "email": "sam@example.com",
                    "first_name": "Sam",
                    "last_name": "Lee",
                    "plan": "basic",
                    "currency": "usd",
                    "role": "learner"
                }
            }}
        })
    }

    async fn deliver(app: &TestApp, event: &Value, signature: Option<&str>) -> (StatusCode, Value) {
        let router = Router::new()
            .route("/webhook", post(webhook))
            .with_state(app.state.clone());
        let mut req = Request::post("/webhook");
        if let Some(sig) = signature {
            req = req.header("Stripe-Signature", sig);
        }
        let res = router
            .oneshot(req.body(Body::from(event.to_string())).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn signing_config() -> Arc<Config> {
        let mut config = (*test_config()).clone();
        config.stripe.webhook_secret = Some("whsec_test".into());
        Arc::new(config)
    }

    #[tokio::test]
    async fn completed_event_provisions_exactly_once_on_replay() {
        let app = TestApp::new();
        let event = completed_event("evt_1", "cs_test_1", "paid");

        let (status, body) = deliver(&app, &event, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["received"], true);

        let (status, body) = deliver(&app, &event, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["duplicate"], true);

        assert_eq!(app.db.users.lock().unwrap().len(), 1);
        let payments = app.db.payments.lock().unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].stripe_session_id, "cs_test_1");
        assert_eq!(payments[0].currency, "usd");
        assert_eq!(payments[0].stripe_customer_id.as_deref(), Some("cus_123"));
    }

    #[tokio::test]
    async fn redelivery_during_processing_is_refused_until_settled() {
        let app = TestApp::new();
        let event = completed_event("evt_9", "cs_test_9", "paid");
        app.db
            .claim_event("evt_9", "checkout.session.completed")
            .await
            .unwrap();

        let (status, _) = deliver(&app, &event, None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(app.db.users.lock().unwrap().is_empty());

        app.db.forget_event("evt_9").await.unwrap();
        let (status, body) = deliver(&app, &event, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["received"], true);
        assert!(app.db.stripe_events.lock().unwrap()[0].processed);
        assert_eq!(app.db.payments.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn distinct_events_for_same_session_create_one_payment() {
        let app = TestApp::new();
        deliver(&app, &completed_event("evt_1", "cs_test_1", "paid"), None).await;
        let mut async_success = completed_event("evt_2", "cs_test_1", "paid");
        async_success["type"] = json!("checkout.session.async_payment_succeeded");
        let (status, _) = deliver(&app, &async_success, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(app.db.users.lock().unwrap().len(), 1);
        assert_eq!(app.db.payments.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unpaid_session_is_acknowledged_without_provisioning() {
        let app = TestApp::new();
        let (status, _) = deliver(&app, &completed_event("evt_3", "cs_test_3", "unpaid"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(app.db.users.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsigned_garbage_is_rejected_in_dev_mode() {
        let app = TestApp::new();
        let (status, _) = deliver(&app, &json!({ "hello": "world" }), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn signature_is_required_when_secret_configured() {
        let app = TestApp::build(
            MockDb::new(),
            MockMailer::default(),
            MockStripeService::new(),
            signing_config(),
        );
        let event = completed_event("evt_4", "cs_test_4", "paid");
        let (status, _) = deliver(&app, &event, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = deliver(&app, &event, Some("t=1,v1=sig")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(app.db.payments.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_signature_is_rejected() {
        let app = TestApp::build(
            MockDb::new(),
            MockMailer::default(),
            MockStripeService {
                reject_signatures: true,
                ..Default::default()
            },
            signing_config(),
        );
        let (status, _) = deliver(
            &app,
            &completed_event("evt_5", "cs_test_5", "paid"),
            Some("t=1,v1=bad"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(app.db.stripe_events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn processing_failure_releases_event_for_retry() {
        let app = TestApp::build(
            MockDb {
                fail_insert_payment: true,
                ..Default::default()
            },
            MockMailer::default(),
            MockStripeService::new(),
            test_config(),
        );
        let (status, _) = deliver(&app, &completed_event("evt_6", "cs_test_6", "paid"), None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(app.db.stripe_events.lock().unwrap().is_empty());
        assert!(app.db.users.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_metadata_is_acknowledged() {
        let app = TestApp::new();
        let mut event = completed_event("evt_7", "cs_test_7", "paid");
        event["data"]["object"]["metadata"] = json!({});
        let (status, _) = deliver(&app, &event, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(app.db.users.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failure_events_are_acknowledged() {
        let app = TestApp::new();
        let mut event = completed_event("evt_8", "cs_test_8", "unpaid");
        event["type"] = json!("checkout.session.expired");
        let (status, body) = deliver(&app, &event, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["received"], true);
    }
}
