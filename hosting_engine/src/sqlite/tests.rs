//! Tests against the real SQLite backend. Each test gets its own throwaway database file so the
//! SQL, the bound-parameter encodings and the stored text formats are exercised end to end.
use chrono::{Duration, Utc};
use hpg_common::MinorUnits;

use super::SqliteDatabase;
use crate::{
    db_types::{
        BillingPeriod,
        ContainerId,
        InvoiceStatus,
        NewOrder,
        OrderId,
        PaymentStatus,
        PlanType,
        ServiceStatus,
    },
    test_utils::prepare_env,
    traits::{LifecycleDatabase, LifecycleError, PaidOutcome, PaymentFacts},
};

async fn fresh_db(name: &str) -> SqliteDatabase {
    prepare_env();
    let path = std::env::temp_dir().join(format!("hpg_{name}_{:08x}.db", rand::random::<u32>()));
    let url = format!("sqlite://{}", path.display());
    SqliteDatabase::new_with_url(&url, 5).await.unwrap()
}

fn sample_order(id: &str, end_date_days_from_now: i64) -> NewOrder {
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
        domain: format!("{id}.example.com"),
        start_date: Utc::now() - Duration::days(365),
        end_date: Utc::now() + Duration::days(end_date_days_from_now),
    }
}

fn facts(amount: i64) -> PaymentFacts {
    PaymentFacts {
        amount: MinorUnits::from(amount),
        method: "card".to_string(),
        reference: "ch_12345".to_string(),
        paid_at: Utc::now(),
    }
}

async fn seed_container_and_invoice(db: &SqliteDatabase) {
    sqlx::query("INSERT INTO containers (container_id, name, legacy_id, sharing_token) VALUES ($1, $2, $3, $4)")
        .bind("cont-1")
        .bind("ada.example.com")
        .bind(42i64)
        .bind("tok-ada")
        .execute(db.pool())
        .await
        .unwrap();
    sqlx::query("INSERT INTO invoices (invoice_id, container_id, number, currency, total_amount) VALUES ($1, $2, $3, $4, $5)")
        .bind("inv-1")
        .bind("cont-1")
        .bind("INV-2024-001")
        .bind("EUR")
        .bind(12000i64)
        .execute(db.pool())
        .await
        .unwrap();
}

#[tokio::test]
async fn fresh_orders_are_visible_to_the_watermark_query() {
    let db = fresh_db("watermark_query").await;
    let (order, inserted) = db.insert_order(sample_order("s1", 30)).await.unwrap();
    assert!(inserted);

    // A row inserted a moment ago must match a watermark from an hour ago. This is where a
    // created_at stored in the wrong text format silently breaks the poller.
    let seen = db.orders_created_after(Utc::now() - Duration::hours(1)).await.unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].order_id, order.order_id);

    let seen = db.orders_created_after(Utc::now()).await.unwrap();
    assert!(seen.is_empty());
}

#[tokio::test]
async fn insert_is_idempotent_on_the_order_id() {
    let db = fresh_db("idempotent_insert").await;
    let (first, inserted) = db.insert_order(sample_order("s2", 30)).await.unwrap();
    assert!(inserted);
    let (second, inserted) = db.insert_order(sample_order("s2", 30)).await.unwrap();
    assert!(!inserted);
    assert_eq!(first.id, second.id);
    assert_eq!(db.fetch_orders().await.unwrap().len(), 1);
}

#[tokio::test]
async fn status_writes_are_compare_and_set() {
    let db = fresh_db("cas").await;
    let (order, _) = db.insert_order(sample_order("s3", 30)).await.unwrap();

    let updated =
        db.update_service_status(&order.order_id, ServiceStatus::New, ServiceStatus::Active).await.unwrap();
    assert_eq!(updated.status, ServiceStatus::Active);

    // A writer that still believes the order is New loses with the actual status in hand.
    let err = db
        .update_service_status(&order.order_id, ServiceStatus::New, ServiceStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Conflict { actual: ServiceStatus::Active, .. }));

    let err = db
        .update_service_status(&OrderId("ghost".to_string()), ServiceStatus::New, ServiceStatus::Active)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::OrderNotFound(_)));
}

#[tokio::test]
async fn container_and_invoice_resolution_falls_back_in_order() {
    let db = fresh_db("resolution").await;
    seed_container_and_invoice(&db).await;

    assert_eq!(db.resolve_container("cont-1").await.unwrap().container_id.as_str(), "cont-1");
    assert_eq!(db.resolve_container("42").await.unwrap().container_id.as_str(), "cont-1");
    assert_eq!(db.resolve_container("tok-ada").await.unwrap().container_id.as_str(), "cont-1");
    assert_eq!(db.resolve_container("ada").await.unwrap().container_id.as_str(), "cont-1");

    let msg = db.resolve_container("nope").await.unwrap_err().to_string();
    assert!(msg.contains("exact id"), "unexpected message: {msg}");
    assert!(msg.contains("secondary id/number"), "unexpected message: {msg}");
    assert!(msg.contains("name or sharing token"), "unexpected message: {msg}");

    let container = ContainerId("cont-1".to_string());
    assert_eq!(db.resolve_invoice(&container, "inv-1").await.unwrap().invoice_id, "inv-1");
    assert_eq!(db.resolve_invoice(&container, "INV-2024-001").await.unwrap().invoice_id, "inv-1");
    let msg = db.resolve_invoice(&container, "inv-404").await.unwrap_err().to_string();
    assert!(msg.contains("No invoice matches"), "unexpected message: {msg}");
}

#[tokio::test]
async fn invoice_payments_apply_exactly_once() {
    let db = fresh_db("invoice_paid").await;
    seed_container_and_invoice(&db).await;
    let container = ContainerId("cont-1".to_string());

    let outcome = db.mark_invoice_paid(&container, "inv-1", &facts(12000)).await.unwrap();
    let paid = match outcome {
        PaidOutcome::Applied(invoice) => invoice,
        other => panic!("expected Applied, got {other:?}"),
    };
    assert_eq!(paid.status, InvoiceStatus::Paid);
    assert_eq!(paid.paid_amount, MinorUnits::from(12000));

    // A second event never touches the amounts.
    let outcome = db.mark_invoice_paid(&container, "inv-1", &facts(99999)).await.unwrap();
    match outcome {
        PaidOutcome::AlreadyPaid(invoice) => assert_eq!(invoice.paid_amount, MinorUnits::from(12000)),
        other => panic!("expected AlreadyPaid, got {other:?}"),
    }

    assert!(!db.session_processed("cs_1").await.unwrap());
    assert!(db.record_processed_session("cs_1").await.unwrap());
    assert!(db.session_processed("cs_1").await.unwrap());
    assert!(!db.record_processed_session("cs_1").await.unwrap());
}

#[tokio::test]
async fn expired_unpaid_orders_require_an_active_lapsed_service() {
    let db = fresh_db("expired").await;
    let (order, _) = db.insert_order(sample_order("s4", -1)).await.unwrap();

    // Still New, so the lapsed end date alone does not qualify it.
    assert!(db.expired_unpaid_orders(Utc::now()).await.unwrap().is_empty());

    db.update_service_status(&order.order_id, ServiceStatus::New, ServiceStatus::Active).await.unwrap();
    let expired = db.expired_unpaid_orders(Utc::now()).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].order_id, order.order_id);

    db.update_payment_status(&order.order_id, PaymentStatus::Paid, Some(&facts(12000))).await.unwrap();
    assert!(db.expired_unpaid_orders(Utc::now()).await.unwrap().is_empty());
}

#[tokio::test]
async fn watermarks_round_trip() {
    let db = fresh_db("watermarks").await;
    assert!(db.fetch_watermark("reconciliation").await.unwrap().is_none());

    let ts = Utc::now();
    db.store_watermark("reconciliation", ts).await.unwrap();
    let stored = db.fetch_watermark("reconciliation").await.unwrap().unwrap();
    assert_eq!(stored.timestamp_micros(), ts.timestamp_micros());

    // Upsert on the same name.
    let later = ts + Duration::seconds(30);
    db.store_watermark("reconciliation", later).await.unwrap();
    let stored = db.fetch_watermark("reconciliation").await.unwrap().unwrap();
    assert_eq!(stored.timestamp_micros(), later.timestamp_micros());
}
