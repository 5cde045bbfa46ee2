mod common;

use axum::http::{Method, StatusCode};
use common::{order_payload, TestApp};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use serde_json::json;
use storefront_api::{entities::Order, stripe::signature_header};
use uuid::Uuid;

const WEBHOOK_SECRET: &str = "whsec_test_secret_value";

async fn webhook_app() -> TestApp {
    TestApp::with_config(|cfg| {
        cfg.stripe_webhook_secret = Some(WEBHOOK_SECRET.to_string());
    })
    .await
}

/// Seed an unpaid anonymous order straight through the API.
async fn place_order(app: &TestApp) -> Uuid {
    let product = app.insert_product("Widget", dec!(25.00), 0, true).await;
    let added = app
        .request(
            Method::POST,
            "/api/v1/cart/items",
            Some(json!({ "product_id": product, "quantity": 1 })),
            None,
            None,
        )
        .await;
    let cookie = added.cookie.expect("session cookie expected");
    let created = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(order_payload("ada@example.com")),
            None,
            Some(&cookie),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    created.body["id"].as_str().unwrap().parse().unwrap()
}

fn completed_event(order_reference: &str, payment_intent: &str) -> Vec<u8> {
    json!({
        "id": "evt_test_1",
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_test_123",
            "object": "checkout.session",
            "mode": "payment",
            "payment_status": "paid",
            "client_reference_id": order_reference,
            "payment_intent": payment_intent,
        }}
    })
    .to_string()
    .into_bytes()
}

fn sign(payload: &[u8]) -> String {
    signature_header(payload, WEBHOOK_SECRET, chrono::Utc::now().timestamp())
}

async fn order_state(app: &TestApp, id: Uuid) -> (bool, Option<String>) {
    let order = Order::find_by_id(id)
        .one(&*app.state.db)
        .await
        .unwrap()
        .unwrap();
    (order.paid, order.stripe_payment_intent)
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn completed_payment_marks_the_order_paid() {
    let app = webhook_app().await;
    let order_id = place_order(&app).await;
    let payload = completed_event(&order_id.to_string(), "pi_123");

    let response = app.post_webhook(&payload, Some(&sign(&payload))).await;
    assert_eq!(response.status, StatusCode::OK);

    let (paid, intent) = order_state(&app, order_id).await;
    assert!(paid);
    assert_eq!(intent.as_deref(), Some("pi_123"));
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn duplicate_delivery_is_a_no_op() {
    let app = webhook_app().await;
    let order_id = place_order(&app).await;
    let payload = completed_event(&order_id.to_string(), "pi_123");

    let first = app.post_webhook(&payload, Some(&sign(&payload))).await;
    assert_eq!(first.status, StatusCode::OK);
    // Stripe redelivers on at-least-once semantics; the second delivery must
    // land on 200 and change nothing.
    let second = app.post_webhook(&payload, Some(&sign(&payload))).await;
    assert_eq!(second.status, StatusCode::OK);

    let (paid, intent) = order_state(&app, order_id).await;
    assert!(paid);
    assert_eq!(intent.as_deref(), Some("pi_123"));
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn invalid_signature_never_mutates_state() {
    let app = webhook_app().await;
    let order_id = place_order(&app).await;
    let payload = completed_event(&order_id.to_string(), "pi_123");

    let forged = signature_header(&payload, "whsec_wrong_secret", chrono::Utc::now().timestamp());
    let response = app.post_webhook(&payload, Some(&forged)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let missing = app.post_webhook(&payload, None).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);

    let stale = signature_header(
        &payload,
        WEBHOOK_SECRET,
        chrono::Utc::now().timestamp() - 3600,
    );
    let response = app.post_webhook(&payload, Some(&stale)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let (paid, intent) = order_state(&app, order_id).await;
    assert!(!paid);
    assert_eq!(intent, None);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn unknown_order_reference_is_404() {
    let app = webhook_app().await;
    let payload = completed_event(&Uuid::new_v4().to_string(), "pi_123");

    let response = app.post_webhook(&payload, Some(&sign(&payload))).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn unparseable_order_reference_is_400() {
    let app = webhook_app().await;
    let payload = completed_event("not-a-uuid", "pi_123");

    let response = app.post_webhook(&payload, Some(&sign(&payload))).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn foreign_and_incomplete_events_are_acknowledged_without_mutation() {
    let app = webhook_app().await;
    let order_id = place_order(&app).await;

    // Unpaid session: acknowledged, nothing changes.
    let unpaid = json!({
        "id": "evt_test_2",
        "type": "checkout.session.completed",
        "data": { "object": {
            "mode": "payment",
            "payment_status": "unpaid",
            "client_reference_id": order_id.to_string(),
        }}
    })
    .to_string()
    .into_bytes();
    let response = app.post_webhook(&unpaid, Some(&sign(&unpaid))).await;
    assert_eq!(response.status, StatusCode::OK);

    // Subscription-mode session: not a one-time payment, also ignored.
    let subscription = json!({
        "id": "evt_test_3",
        "type": "checkout.session.completed",
        "data": { "object": {
            "mode": "subscription",
            "payment_status": "paid",
            "client_reference_id": order_id.to_string(),
        }}
    })
    .to_string()
    .into_bytes();
    let response = app
        .post_webhook(&subscription, Some(&sign(&subscription)))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    // Unrelated event type.
    let foreign = json!({
        "id": "evt_test_4",
        "type": "payment_intent.succeeded",
        "data": { "object": {} }
    })
    .to_string()
    .into_bytes();
    let response = app.post_webhook(&foreign, Some(&sign(&foreign))).await;
    assert_eq!(response.status, StatusCode::OK);

    let (paid, intent) = order_state(&app, order_id).await;
    assert!(!paid);
    assert_eq!(intent, None);
}

#[tokio::test]
#[cfg_attr(not(feature = "mock-tests"), ignore)]
async fn malformed_payload_with_valid_signature_is_400() {
    let app = webhook_app().await;
    let payload = b"not json at all".to_vec();

    let response = app.post_webhook(&payload, Some(&sign(&payload))).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}
