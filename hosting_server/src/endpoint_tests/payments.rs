use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use checkout_gateway::{calculate_hmac, CheckoutSession, GatewayConfig, GatewayError, SIGNATURE_HEADER};
use hosting_engine::{
    db_types::InvoiceStatus,
    test_utils::{prepare_env, MemoryDatabase},
    traits::LifecycleDatabase,
};
use hpg_common::{MinorUnits, Secret};
use serde_json::Value;

use super::{
    helpers::{into_status_and_body, test_api},
    mocks::MockGateway,
};
use crate::{
    data_objects::CheckoutUrls,
    payment_routes::{CheckoutRoute, PaymentWebhookRoute},
};

const WEBHOOK_SECRET: &str = "whsec_test";

fn gateway_config() -> GatewayConfig {
    GatewayConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        secret_key: Secret::new("sk_test".to_string()),
        webhook_secret: Secret::new(WEBHOOK_SECRET.to_string()),
    }
}

fn checkout_urls() -> CheckoutUrls {
    CheckoutUrls {
        success_url: "https://hosting.example.com/thanks".to_string(),
        cancel_url: "https://hosting.example.com/cancelled".to_string(),
    }
}

async fn send(
    db: &MemoryDatabase,
    gateway: MockGateway,
    req: TestRequest,
) -> Result<(StatusCode, String), String> {
    let app = App::new()
        .app_data(web::Data::new(test_api(db)))
        .app_data(web::Data::new(gateway))
        .app_data(web::Data::new(gateway_config()))
        .app_data(web::Data::new(checkout_urls()))
        .service(
            web::scope("/payments")
                .service(CheckoutRoute::<MemoryDatabase, MockGateway>::new())
                .service(PaymentWebhookRoute::<MemoryDatabase>::new()),
        );
    let service = test::init_service(app).await;
    let res = test::try_call_service(&service, req.to_request()).await.map_err(|e| e.to_string())?;
    Ok(into_status_and_body(res))
}

fn seeded_db() -> MemoryDatabase {
    let db = MemoryDatabase::new();
    db.add_container("cont-1", "ada.example.com", Some(42), None);
    db.add_invoice("cont-1", "inv-1", "INV-2024-001", "EUR", MinorUnits::from(12000));
    db
}

fn signed_webhook(payload: &str) -> TestRequest {
    let signature = calculate_hmac(&Secret::new(WEBHOOK_SECRET.to_string()), payload.as_bytes());
    TestRequest::post()
        .uri("/payments/webhook")
        .insert_header((SIGNATURE_HEADER, signature))
        .insert_header(("Content-Type", "application/json"))
        .set_payload(payload.to_string())
}

fn completed_payload(session_id: &str) -> String {
    format!(
        r#"{{
        "type": "checkout.completed",
        "session_id": "{session_id}",
        "metadata": {{ "invoice_id": "inv-1", "container_id": "cont-1" }},
        "amount": 12000,
        "currency": "EUR",
        "payment_method": "card",
        "reference": "ch_987",
        "paid_at": "2024-06-01T12:00:00Z"
    }}"#
    )
}

//----------------------------------------------  Checkout  ----------------------------------------------------

#[actix_web::test]
async fn checkout_creates_a_session_for_an_unpaid_invoice() {
    prepare_env();
    let db = seeded_db();
    let mut gateway = MockGateway::new();
    gateway.expect_create_checkout().withf(|req| (req.amount - 120.0).abs() < f64::EPSILON).return_once(|_| {
        Ok(CheckoutSession {
            session_id: "cs_123".to_string(),
            url: "https://gateway.example.com/pay/cs_123".to_string(),
        })
    });
    let req = TestRequest::post()
        .uri("/payments/checkout")
        .set_json(serde_json::json!({"invoice_id": "inv-1", "container_id": "cont-1"}));
    let (status, body) = send(&db, gateway, req).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let res: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(res["success"], true);
    assert_eq!(res["session_id"], "cs_123");
    assert_eq!(res["url"], "https://gateway.example.com/pay/cs_123");
}

#[actix_web::test]
async fn checkout_accepts_fallback_container_references() {
    prepare_env();
    let db = seeded_db();
    let mut gateway = MockGateway::new();
    gateway.expect_create_checkout().return_once(|_| {
        Ok(CheckoutSession { session_id: "cs_124".to_string(), url: "https://gateway.example.com/pay".to_string() })
    });
    // The legacy numeric id resolves through the secondary strategy; the invoice by its number.
    let req = TestRequest::post()
        .uri("/payments/checkout")
        .set_json(serde_json::json!({"invoice_id": "INV-2024-001", "container_id": "42"}));
    let (status, _) = send(&db, gateway, req).await.unwrap();
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn checkout_for_an_unknown_invoice_names_the_strategies_tried() {
    prepare_env();
    let db = seeded_db();
    let req = TestRequest::post()
        .uri("/payments/checkout")
        .set_json(serde_json::json!({"invoice_id": "inv-999", "container_id": "cont-1"}));
    let err = send(&db, MockGateway::new(), req).await.unwrap_err();
    assert!(err.contains("No invoice matches 'inv-999'"), "unexpected error: {err}");
    assert!(err.contains("exact id") && err.contains("secondary id/number"), "unexpected error: {err}");
}

#[actix_web::test]
async fn checkout_for_a_paid_invoice_is_refused() {
    prepare_env();
    let db = seeded_db();
    db.force_invoice_paid("cont-1", "inv-1");
    let req = TestRequest::post()
        .uri("/payments/checkout")
        .set_json(serde_json::json!({"invoice_id": "inv-1", "container_id": "cont-1"}));
    let (status, body) = send(&db, MockGateway::new(), req).await.unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("already paid"), "unexpected body: {body}");
}

#[actix_web::test]
async fn checkout_requires_the_account_pin_when_one_is_provisioned() {
    prepare_env();
    let db = seeded_db();
    // The provisioned account shares the container's name, so the PIN becomes mandatory.
    let pin = db.add_account("3001", "ada.example.com").pin;
    let req = TestRequest::post()
        .uri("/payments/checkout")
        .set_json(serde_json::json!({"invoice_id": "inv-1", "container_id": "cont-1"}));
    let err = send(&db, MockGateway::new(), req).await.unwrap_err();
    assert!(err.contains("A valid PIN is required"), "unexpected error: {err}");

    let req = TestRequest::post()
        .uri("/payments/checkout")
        .set_json(serde_json::json!({"invoice_id": "inv-1", "container_id": "cont-1", "pin": "000000"}));
    let err = send(&db, MockGateway::new(), req).await.unwrap_err();
    assert!(err.contains("A valid PIN is required"), "unexpected error: {err}");

    let mut gateway = MockGateway::new();
    gateway.expect_create_checkout().return_once(|_| {
        Ok(CheckoutSession { session_id: "cs_125".to_string(), url: "https://gateway.example.com/pay".to_string() })
    });
    let req = TestRequest::post()
        .uri("/payments/checkout")
        .set_json(serde_json::json!({"invoice_id": "inv-1", "container_id": "cont-1", "pin": pin}));
    let (status, _) = send(&db, gateway, req).await.unwrap();
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn a_gateway_failure_surfaces_as_an_upstream_error() {
    prepare_env();
    let db = seeded_db();
    let mut gateway = MockGateway::new();
    gateway
        .expect_create_checkout()
        .return_once(|_| Err(GatewayError::QueryError { status: 500, message: "boom".to_string() }));
    let req = TestRequest::post()
        .uri("/payments/checkout")
        .set_json(serde_json::json!({"invoice_id": "inv-1", "container_id": "cont-1"}));
    let err = send(&db, gateway, req).await.unwrap_err();
    assert!(err.contains("Payment gateway error"), "unexpected error: {err}");
}

//----------------------------------------------  Webhook  -----------------------------------------------------

#[actix_web::test]
async fn a_signed_payment_event_marks_the_invoice_paid() {
    prepare_env();
    let db = seeded_db();
    let req = signed_webhook(&completed_payload("cs_200"));
    let (status, body) = send(&db, MockGateway::new(), req).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap()["received"], true);

    let container = db.resolve_container("cont-1").await.unwrap();
    let invoice = db.resolve_invoice(&container.container_id, "inv-1").await.unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Paid);
    assert_eq!(invoice.paid_amount, MinorUnits::from(12000));
    assert_eq!(invoice.payment_method.as_deref(), Some("card"));
}

#[actix_web::test]
async fn an_unsigned_or_tampered_webhook_is_rejected() {
    prepare_env();
    let db = seeded_db();
    let payload = completed_payload("cs_201");

    let req = TestRequest::post().uri("/payments/webhook").set_payload(payload.clone());
    let err = send(&db, MockGateway::new(), req).await.unwrap_err();
    assert!(err.contains("signature invalid"), "unexpected error: {err}");

    let signature = calculate_hmac(&Secret::new("wrong_secret".to_string()), payload.as_bytes());
    let req = TestRequest::post()
        .uri("/payments/webhook")
        .insert_header((SIGNATURE_HEADER, signature))
        .set_payload(payload);
    let err = send(&db, MockGateway::new(), req).await.unwrap_err();
    assert!(err.contains("signature invalid"), "unexpected error: {err}");

    // Nothing was marked paid along the way.
    let container = db.resolve_container("cont-1").await.unwrap();
    let invoice = db.resolve_invoice(&container.container_id, "inv-1").await.unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Unpaid);
}

#[actix_web::test]
async fn webhook_replays_are_acknowledged_without_side_effects() {
    prepare_env();
    let db = seeded_db();
    let payload = completed_payload("cs_202");
    let (status, _) = send(&db, MockGateway::new(), signed_webhook(&payload)).await.unwrap();
    assert_eq!(status, StatusCode::OK);

    // Same session id again, and then the same invoice under a fresh session id.
    let (status, _) = send(&db, MockGateway::new(), signed_webhook(&payload)).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&db, MockGateway::new(), signed_webhook(&completed_payload("cs_203"))).await.unwrap();
    assert_eq!(status, StatusCode::OK);

    let container = db.resolve_container("cont-1").await.unwrap();
    let invoice = db.resolve_invoice(&container.container_id, "inv-1").await.unwrap();
    assert_eq!(invoice.paid_amount, MinorUnits::from(12000));
}

#[actix_web::test]
async fn an_unmatched_payment_is_acknowledged_and_alerts_the_operator() {
    prepare_env();
    let db = seeded_db();
    let payload = completed_payload("cs_204").replace("cont-1", "cont-404");
    let (status, body) = send(&db, MockGateway::new(), signed_webhook(&payload)).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap()["received"], true);

    let alerts = db.fetch_notifications(true).await.unwrap();
    assert!(alerts.iter().any(|n| n.kind == "unprocessed_webhook"), "no operator alert raised: {alerts:?}");
}

#[actix_web::test]
async fn unrecognized_event_types_are_acknowledged() {
    prepare_env();
    let db = seeded_db();
    let payload = completed_payload("cs_205").replace("checkout.completed", "checkout.expired");
    let (status, body) = send(&db, MockGateway::new(), signed_webhook(&payload)).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap()["received"], true);

    let container = db.resolve_container("cont-1").await.unwrap();
    let invoice = db.resolve_invoice(&container.container_id, "inv-1").await.unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Unpaid);
}
