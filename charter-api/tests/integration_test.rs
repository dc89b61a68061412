use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use charter_api::{app, AppState, AuthConfig};
use charter_booking::WorkflowSettings;
use charter_chat::ChatSettings;
use charter_core::Role;
use charter_shared::Decimal;
use charter_store::Backends;
use jsonwebtoken::{encode, EncodingKey, Header};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "integration-secret";
const WEBHOOK_SECRET: &str = "gateway-secret";

fn test_state(webhook_secret: Option<&str>) -> AppState {
    AppState::new(
        Backends::in_memory(),
        AuthConfig {
            secret: SECRET.to_string(),
            webhook_secret: webhook_secret.map(str::to_string),
        },
        WorkflowSettings {
            settlement_timeout: Duration::from_secs(5),
            ..WorkflowSettings::default()
        },
        ChatSettings::default(),
    )
}

fn test_app() -> Router {
    app(test_state(Some(WEBHOOK_SECRET)))
}

fn token(user_id: Uuid, role: Role) -> String {
    let claims = charter_api::middleware::Claims {
        sub: user_id,
        role,
        exp: 4_000_000_000,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let auth = bearer.map(|t| ("Authorization", format!("Bearer {}", t)));
    send(app, method, uri, auth, body).await
}

/// Posts to the payment webhook the way the gateway does.
async fn gateway(app: &Router, body: Value) -> (StatusCode, Value) {
    let secret = Some(("X-Webhook-Secret", WEBHOOK_SECRET.to_string()));
    send(app, Method::POST, "/v1/webhooks/payments", secret, Some(body)).await
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    header: Option<(&str, String)>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((name, value)) = header {
        builder = builder.header(name, value);
    }
    let req = match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn intake() -> Value {
    json!({
        "origin": "zrh",
        "destination": "jfk",
        "departure_date": "2026-11-02",
        "passengers": 6,
        "aircraft_type": "Midsize jet",
        "currency": "EUR"
    })
}

fn decimal(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

async fn create_booking(app: &Router, customer: &str) -> String {
    let (status, body) = call(app, Method::POST, "/v1/bookings", Some(customer), Some(intake())).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

fn completed_payment(booking_id: &str, user_id: Uuid, amount: &str) -> Value {
    json!({
        "event": "payment_recorded",
        "payment": {
            "user_id": user_id,
            "booking_id": booking_id,
            "amount": amount,
            "currency": "EUR",
            "method": "card",
            "status": "completed",
            "transaction_ref": "tx_1"
        }
    })
}

#[tokio::test]
async fn test_requests_without_valid_token_are_rejected() {
    let app = test_app();

    let (status, _) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, Method::GET, "/v1/bookings", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, Method::GET, "/v1/bookings", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let customer = token(Uuid::new_v4(), Role::Customer);
    let (status, _) = call(&app, Method::GET, "/v1/admin/bookings", Some(&customer), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_booking_lifecycle_over_http() {
    let app = test_app();
    let user_id = Uuid::new_v4();
    let customer = token(user_id, Role::Customer);
    let admin = token(Uuid::new_v4(), Role::Admin);

    let id = create_booking(&app, &customer).await;
    let base = format!("/v1/admin/bookings/{}", id);

    // Proposal
    let (status, body) = call(
        &app,
        Method::POST,
        &format!("{}/price-proposal", base),
        Some(&admin),
        Some(json!({"observed_status": "pending", "final_price": "25000.00", "currency": "EUR"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "price_proposed");

    // Same action from a stale screen
    let (status, body) = call(
        &app,
        Method::POST,
        &format!("{}/price-proposal", base),
        Some(&admin),
        Some(json!({"observed_status": "pending", "final_price": "26000.00", "currency": "EUR"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "concurrent_modification");

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("{}/payment-pending", base),
        Some(&admin),
        Some(json!({"observed_status": "price_proposed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // No payment yet
    let (status, body) = call(
        &app,
        Method::POST,
        &format!("{}/confirm", base),
        Some(&admin),
        Some(json!({"observed_status": "payment_pending"})),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["kind"], "payment_mismatch");

    let (status, _) = gateway(&app, completed_payment(&id, user_id, "25000.00")).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("{}/confirm", base),
        Some(&admin),
        Some(json!({"observed_status": "payment_pending"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");

    // Detail view carries the audit trail and the payment
    let (status, body) = call(&app, Method::GET, &base, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["history"].as_array().unwrap().len(), 3);
    assert_eq!(body["payments"].as_array().unwrap().len(), 1);

    // Customer sees one notification per transition
    let (status, body) = call(&app, Method::GET, "/v1/notifications", Some(&customer), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["unread_count"], 3);
    let ids: Vec<Value> = body["notifications"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].clone())
        .collect();

    let (status, body) = call(
        &app,
        Method::POST,
        "/v1/notifications/read",
        Some(&customer),
        Some(json!({ "ids": ids })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["marked"], 3);

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("{}/complete", base),
        Some(&admin),
        Some(json!({"observed_status": "confirmed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");

    // Nothing left to cancel
    let (status, body) = call(
        &app,
        Method::POST,
        &format!("{}/cancel", base),
        Some(&admin),
        Some(json!({"observed_status": "completed", "reason": "customer request"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "already_terminal");
}

#[tokio::test]
async fn test_retry_flag_recovers_from_stale_status() {
    let app = test_app();
    let customer = token(Uuid::new_v4(), Role::Customer);
    let admin = token(Uuid::new_v4(), Role::Admin);
    let id = create_booking(&app, &customer).await;

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/v1/admin/bookings/{}/price-proposal", id),
        Some(&admin),
        Some(json!({
            "observed_status": "price_proposed",
            "final_price": "18000",
            "currency": "EUR",
            "retry": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "price_proposed");
}

#[tokio::test]
async fn test_confirm_can_wait_for_settlement() {
    let app = test_app();
    let user_id = Uuid::new_v4();
    let customer = token(user_id, Role::Customer);
    let admin = token(Uuid::new_v4(), Role::Admin);
    let id = create_booking(&app, &customer).await;
    let base = format!("/v1/admin/bookings/{}", id);

    call(
        &app,
        Method::POST,
        &format!("{}/price-proposal", base),
        Some(&admin),
        Some(json!({"observed_status": "pending", "final_price": "9000", "currency": "EUR"})),
    )
    .await;
    call(
        &app,
        Method::POST,
        &format!("{}/payment-pending", base),
        Some(&admin),
        Some(json!({"observed_status": "price_proposed"})),
    )
    .await;

    let (status, payment) = gateway(
        &app,
        json!({
            "event": "payment_recorded",
            "payment": {
                "user_id": user_id,
                "booking_id": id,
                "amount": "9000",
                "currency": "EUR",
                "method": "bank",
                "status": "pending"
            }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let waiting = {
        let app = app.clone();
        let admin = admin.clone();
        let uri = format!("{}/confirm", base);
        tokio::spawn(async move {
            call(
                &app,
                Method::POST,
                &uri,
                Some(&admin),
                Some(json!({"observed_status": "payment_pending", "wait_for_settlement": true})),
            )
            .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    let (status, _) = gateway(
        &app,
        json!({
            "event": "payment_settled",
            "payment_id": payment["id"],
            "status": "completed",
            "transaction_ref": "wire-77"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = waiting.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");
}

#[tokio::test]
async fn test_customers_only_see_their_own_records() {
    let app = test_app();
    let owner = token(Uuid::new_v4(), Role::Customer);
    let stranger = token(Uuid::new_v4(), Role::Customer);
    let admin = token(Uuid::new_v4(), Role::Admin);
    let id = create_booking(&app, &owner).await;

    let (status, _) = call(&app, Method::GET, &format!("/v1/bookings/{}", id), Some(&stranger), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(&app, Method::GET, "/v1/bookings", Some(&stranger), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());

    call(
        &app,
        Method::POST,
        &format!("/v1/admin/bookings/{}/price-proposal", id),
        Some(&admin),
        Some(json!({"observed_status": "pending", "final_price": "1000", "currency": "EUR"})),
    )
    .await;
    let (_, body) = call(&app, Method::GET, "/v1/notifications", Some(&owner), None).await;
    let owned_id = body["notifications"][0]["id"].clone();

    let (status, _) = call(
        &app,
        Method::POST,
        "/v1/notifications/read",
        Some(&stranger),
        Some(json!({ "ids": [owned_id] })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_intake_is_a_bad_request() {
    let app = test_app();
    let customer = token(Uuid::new_v4(), Role::Customer);

    let mut body = intake();
    body["passengers"] = json!(0);
    let (status, body) = call(&app, Method::POST, "/v1/bookings", Some(&customer), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation_error");
}

#[tokio::test]
async fn test_chat_unread_and_read_cutoff() {
    let app = test_app();
    let user_id = Uuid::new_v4();
    let customer = token(user_id, Role::Customer);
    let admin = token(Uuid::new_v4(), Role::Admin);

    let (status, first) = call(
        &app,
        Method::POST,
        "/v1/chat/messages",
        Some(&customer),
        Some(json!({"content": "Can we leave an hour earlier?"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    call(
        &app,
        Method::POST,
        "/v1/chat/messages",
        Some(&customer),
        Some(json!({"content": "Also two more bags."})),
    )
    .await;

    let (status, body) = call(&app, Method::GET, "/v1/admin/chat/threads", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_unread"], 2);

    let thread = format!("/v1/admin/chat/{}", user_id);
    let (status, _) = call(
        &app,
        Method::POST,
        &format!("{}/messages", thread),
        Some(&admin),
        Some(json!({"content": "Checking with the crew."})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Admin only saw the first message
    let (status, receipt) = call(
        &app,
        Method::POST,
        &format!("{}/read", thread),
        Some(&admin),
        Some(json!({"up_to": first["id"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["marked"], 1);
    assert_eq!(receipt["unread_count"], 1);

    let (_, receipt) = call(&app, Method::POST, &format!("{}/read", thread), Some(&admin), Some(json!({}))).await;
    assert_eq!(receipt["unread_count"], 0);

    let (_, history) = call(&app, Method::GET, "/v1/chat/messages", Some(&customer), None).await;
    let senders: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["sender"].as_str().unwrap())
        .collect();
    assert_eq!(senders, vec!["customer", "customer", "admin"]);

    let (status, _) = call(
        &app,
        Method::POST,
        "/v1/chat/messages",
        Some(&customer),
        Some(json!({"content": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_requires_the_configured_secret() {
    let app = test_app();
    let payload = completed_payment(&Uuid::new_v4().to_string(), Uuid::new_v4(), "10");

    let (status, _) = call(&app, Method::POST, "/v1/webhooks/payments", None, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let wrong = Some(("X-Webhook-Secret", "guessed".to_string()));
    let (status, _) = send(&app, Method::POST, "/v1/webhooks/payments", wrong, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = gateway(&app, payload).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_webhook_is_closed_without_a_secret() {
    let app = app(test_state(None));
    let payload = completed_payment(&Uuid::new_v4().to_string(), Uuid::new_v4(), "10");

    let (status, _) = call(&app, Method::POST, "/v1/webhooks/payments", None, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = gateway(&app, payload).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_webhook_rejects_amounts_the_ledger_cannot_store() {
    let app = test_app();
    let booking_id = Uuid::new_v4().to_string();

    for amount in ["100.001", "79228162514264337593543950335"] {
        let (status, body) = gateway(&app, completed_payment(&booking_id, Uuid::new_v4(), amount)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "validation_error");
    }
}

#[tokio::test]
async fn test_payment_summary_keeps_currencies_apart() {
    let app = test_app();
    let admin = token(Uuid::new_v4(), Role::Admin);
    let user_id = Uuid::new_v4();

    for (amount, currency) in [("100.00", "EUR"), ("200.00", "EUR"), ("50.00", "USD")] {
        let (status, _) = gateway(
            &app,
            json!({
                "event": "payment_recorded",
                "payment": {
                    "user_id": user_id,
                    "amount": amount,
                    "currency": currency,
                    "method": "card",
                    "status": "completed"
                }
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = call(&app, Method::GET, "/v1/admin/payments/summary", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let eur = &body["summary"]["by_status"]["EUR"]["completed"];
    assert_eq!(eur["count"], 2);
    assert_eq!(decimal(&eur["amount"]), dec!(300));
    assert_eq!(decimal(&body["summary"]["by_method"]["USD"]["card"]["amount"]), dec!(50));

    // A series needs a window
    let (status, _) = call(
        &app,
        Method::GET,
        "/v1/admin/payments/summary?bucket=day",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_can_trigger_reconciliation() {
    let app = test_app();
    let admin = token(Uuid::new_v4(), Role::Admin);

    let (status, body) = call(&app, Method::POST, "/v1/admin/reconcile", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scanned"], 0);
    assert_eq!(body["audit_repaired"], 0);
}
