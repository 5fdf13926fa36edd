use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use chrono::{Duration, Utc};
use hosting_engine::{
    db_types::{BillingPeriod, NewOrder, OrderId, PlanType, ServiceStatus},
    test_utils::{prepare_env, MemoryDatabase},
};
use hpg_common::MinorUnits;
use serde_json::Value;

use super::helpers::{into_status_and_body, test_api};
use crate::routes::{
    AddNoteRoute,
    ApproveOrderRoute,
    CreateOrderRoute,
    MarkNotificationReadRoute,
    NotificationsRoute,
    OrderByIdRoute,
    OrdersRoute,
    ProvisionSharingRoute,
    RejectOrderRoute,
    SharingInfoRoute,
    SuspendOrderRoute,
};

async fn send(db: &MemoryDatabase, req: TestRequest) -> Result<(StatusCode, String), String> {
    let app = App::new().app_data(web::Data::new(test_api(db))).service(
        web::scope("/api")
            .service(OrdersRoute::<MemoryDatabase>::new())
            .service(CreateOrderRoute::<MemoryDatabase>::new())
            .service(OrderByIdRoute::<MemoryDatabase>::new())
            .service(ApproveOrderRoute::<MemoryDatabase>::new())
            .service(RejectOrderRoute::<MemoryDatabase>::new())
            .service(SuspendOrderRoute::<MemoryDatabase>::new())
            .service(AddNoteRoute::<MemoryDatabase>::new())
            .service(SharingInfoRoute::<MemoryDatabase>::new())
            .service(ProvisionSharingRoute::<MemoryDatabase>::new())
            .service(NotificationsRoute::<MemoryDatabase>::new())
            .service(MarkNotificationReadRoute::<MemoryDatabase>::new()),
    );
    let service = test::init_service(app).await;
    let res = test::try_call_service(&service, req.to_request()).await.map_err(|e| e.to_string())?;
    Ok(into_status_and_body(res))
}

fn sample_order(id: &str, domain: &str) -> NewOrder {
    NewOrder {
        order_id: OrderId(id.to_string()),
        customer_name: "Ada Hosting Ltd".to_string(),
        customer_email: "ada@example.com".to_string(),
        customer_phone: None,
        customer_company: None,
        customer_address: None,
        plan_type: PlanType::Standard,
        billing_period: BillingPeriod::Annual,
        price: MinorUnits::from(12000),
        currency: "EUR".to_string(),
        domain: domain.to_string(),
        start_date: Utc::now(),
        end_date: Utc::now() + Duration::days(365),
    }
}

#[actix_web::test]
async fn create_and_approve_an_order() {
    prepare_env();
    let db = MemoryDatabase::new();
    let req = TestRequest::post().uri("/api/orders").set_json(sample_order("2001", "ada.example.com"));
    let (status, _) = send(&db, req).await.unwrap();
    assert_eq!(status, StatusCode::CREATED);

    let req = TestRequest::post().uri("/api/order/2001/approve");
    let (status, body) = send(&db, req).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let change: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(change["new_status"], "Active");

    let req = TestRequest::get().uri("/api/order/2001");
    let (status, body) = send(&db, req).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let detail: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(detail["order"]["status"], "Active");
    let actions: Vec<&str> = detail["history"].as_array().unwrap().iter().map(|h| h["action"].as_str().unwrap()).collect();
    assert_eq!(actions, vec!["created", "approved"]);
}

#[actix_web::test]
async fn posting_the_same_order_twice_is_not_an_error() {
    prepare_env();
    let db = MemoryDatabase::new();
    let req = TestRequest::post().uri("/api/orders").set_json(sample_order("2002", "bob.example.com"));
    let (status, _) = send(&db, req).await.unwrap();
    assert_eq!(status, StatusCode::CREATED);
    let req = TestRequest::post().uri("/api/orders").set_json(sample_order("2002", "bob.example.com"));
    let (status, _) = send(&db, req).await.unwrap();
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn illegal_transitions_are_rejected() {
    prepare_env();
    let db = MemoryDatabase::new();
    let req = TestRequest::post().uri("/api/orders").set_json(sample_order("2003", "carol.example.com"));
    send(&db, req).await.unwrap();

    // Suspending a New order skips a state and must fail.
    let req = TestRequest::post().uri("/api/order/2003/suspend").set_json(serde_json::json!({"reason": "test"}));
    let err = send(&db, req).await.unwrap_err();
    assert!(err.contains("not a legal order state change"), "unexpected error: {err}");

    // A rejected order is terminal.
    let req = TestRequest::post().uri("/api/order/2003/reject").set_json(serde_json::json!({"reason": "fraud"}));
    let (status, _) = send(&db, req).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let req = TestRequest::post().uri("/api/order/2003/approve");
    let err = send(&db, req).await.unwrap_err();
    assert!(err.contains("not a legal order state change"), "unexpected error: {err}");
}

#[actix_web::test]
async fn unknown_orders_yield_not_found() {
    prepare_env();
    let db = MemoryDatabase::new();
    let err = send(&db, TestRequest::get().uri("/api/order/nope")).await.unwrap_err();
    assert!(err.contains("does not exist"), "unexpected error: {err}");
}

#[actix_web::test]
async fn sharing_info_is_available_after_provisioning() {
    prepare_env();
    let db = MemoryDatabase::new();
    let req = TestRequest::post().uri("/api/orders").set_json(sample_order("2004", "dave.example.com"));
    send(&db, req).await.unwrap();

    let err = send(&db, TestRequest::get().uri("/api/order/2004/sharing")).await.unwrap_err();
    assert!(err.contains("no provisioned account"), "unexpected error: {err}");

    let (status, body) = send(&db, TestRequest::post().uri("/api/order/2004/sharing")).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let info: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(info["domain"], "dave.example.com");
    assert_eq!(info["sharing_token"].as_str().unwrap().len(), 32);
    assert_eq!(info["pin"].as_str().unwrap().len(), 6);

    // Provisioning again returns the same credentials.
    let (_, body2) = send(&db, TestRequest::post().uri("/api/order/2004/sharing")).await.unwrap();
    assert_eq!(body, body2);
    assert_eq!(db.account_count(), 1);
}

#[actix_web::test]
async fn notes_are_attached_to_the_order() {
    prepare_env();
    let db = MemoryDatabase::new();
    let req = TestRequest::post().uri("/api/orders").set_json(sample_order("2005", "erin.example.com"));
    send(&db, req).await.unwrap();

    let req = TestRequest::post().uri("/api/order/2005/notes").set_json(serde_json::json!({"note": "Called the client"}));
    let (status, _) = send(&db, req).await.unwrap();
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = send(&db, TestRequest::get().uri("/api/order/2005")).await.unwrap();
    let detail: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(detail["notes"][0]["note"], "Called the client");
}

#[actix_web::test]
async fn notifications_can_be_listed_and_marked_read() {
    prepare_env();
    let db = MemoryDatabase::new();
    let req = TestRequest::post().uri("/api/orders").set_json(sample_order("2006", "finn.example.com"));
    send(&db, req).await.unwrap();

    let (status, body) = send(&db, TestRequest::get().uri("/api/notifications?unread_only=true")).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let list: Value = serde_json::from_str(&body).unwrap();
    let first = &list.as_array().unwrap()[0];
    assert_eq!(first["kind"], "order_created");
    let id = first["id"].as_i64().unwrap();

    let req = TestRequest::post().uri(&format!("/api/notification/{id}/read"));
    let (status, _) = send(&db, req).await.unwrap();
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&db, TestRequest::get().uri("/api/notifications?unread_only=true")).await.unwrap();
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap().as_array().unwrap().len(), 0);
}

#[actix_web::test]
async fn orders_are_listed() {
    prepare_env();
    let db = MemoryDatabase::new();
    for (id, domain) in [("2007", "g.example.com"), ("2008", "h.example.com")] {
        send(&db, TestRequest::post().uri("/api/orders").set_json(sample_order(id, domain))).await.unwrap();
    }
    db.force_status(&OrderId("2007".to_string()), ServiceStatus::Cancelled);
    let (status, body) = send(&db, TestRequest::get().uri("/api/orders")).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap().as_array().unwrap().len(), 2);
}
