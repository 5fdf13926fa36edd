use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{HistoryEntry, NewOrder, Order, OrderId, OrderNote, PaymentStatus, ServiceStatus},
    traits::{LifecycleError, PaymentFacts},
};

/// Inserts the order into the database, returning `false` in the second element if an order with
/// the same order id already exists.
pub async fn idempotent_insert(order: NewOrder, conn: &mut SqliteConnection) -> Result<(Order, bool), LifecycleError> {
    let inserted = match fetch_order_by_order_id(&order.order_id, conn).await? {
        Some(order) => (order, false),
        None => {
            let order = insert_order(order, conn).await?;
            debug!("🗃️ Order [{}] inserted with id {}", order.order_id, order.id);
            (order, true)
        },
    };
    Ok(inserted)
}

async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, LifecycleError> {
    // created_at/updated_at are bound rather than left to the SQL default: CURRENT_TIMESTAMP
    // stores "YYYY-MM-DD HH:MM:SS" text, which never compares correctly against a bound chrono
    // timestamp in the poller's created_at filter.
    let now = Utc::now();
    let order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                customer_name,
                customer_email,
                customer_phone,
                customer_company,
                customer_address,
                plan_type,
                billing_period,
                price,
                currency,
                domain,
                start_date,
                end_date,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *;
        "#,
    )
    .bind(order.order_id)
    .bind(order.customer_name)
    .bind(order.customer_email)
    .bind(order.customer_phone)
    .bind(order.customer_company)
    .bind(order.customer_address)
    .bind(order.plan_type)
    .bind(order.billing_period)
    .bind(order.price)
    .bind(order.currency)
    .bind(order.domain)
    .bind(order.start_date)
    .bind(order.end_date)
    .bind(now)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_all_orders(conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders ORDER BY created_at DESC").fetch_all(conn).await
}

/// Compare-and-set status write. The expected status is part of the WHERE clause, so the check and
/// the write are a single statement. A mismatch writes nothing; the caller receives [`LifecycleError::Conflict`]
/// with the status actually found.
pub async fn update_status_cas(
    order_id: &OrderId,
    expected: ServiceStatus,
    new: ServiceStatus,
    conn: &mut SqliteConnection,
) -> Result<Order, LifecycleError> {
    let updated: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders SET status = $3, updated_at = $4
            WHERE order_id = $1 AND status = $2
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(expected)
    .bind(new)
    .bind(Utc::now())
    .fetch_optional(&mut *conn)
    .await?;
    match updated {
        Some(order) => Ok(order),
        None => {
            let current = fetch_order_by_order_id(order_id, conn)
                .await?
                .ok_or_else(|| LifecycleError::OrderNotFound(order_id.clone()))?;
            Err(LifecycleError::Conflict { order_id: order_id.clone(), expected, actual: current.status })
        },
    }
}

pub async fn update_payment(
    order_id: &OrderId,
    status: PaymentStatus,
    facts: Option<&PaymentFacts>,
    conn: &mut SqliteConnection,
) -> Result<Order, LifecycleError> {
    let (method, reference, paid_at) = match facts {
        Some(f) => (Some(f.method.as_str()), Some(f.reference.as_str()), Some(f.paid_at)),
        None => (None, None, None),
    };
    let order: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders SET
                payment_status = $2,
                payment_method = COALESCE($3, payment_method),
                payment_reference = COALESCE($4, payment_reference),
                paid_at = COALESCE($5, paid_at),
                updated_at = $6
            WHERE order_id = $1
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(status)
    .bind(method)
    .bind(reference)
    .bind(paid_at)
    .bind(Utc::now())
    .fetch_optional(conn)
    .await?;
    order.ok_or_else(|| LifecycleError::OrderNotFound(order_id.clone()))
}

pub async fn append_history(
    order_id: &OrderId,
    action: &str,
    detail: &str,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO order_history (order_id, action, detail) VALUES ($1, $2, $3)")
        .bind(order_id.as_str())
        .bind(action)
        .bind(detail)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn fetch_history(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<HistoryEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_history WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await
}

pub async fn add_note(order_id: &OrderId, note: &str, conn: &mut SqliteConnection) -> Result<OrderNote, sqlx::Error> {
    sqlx::query_as("INSERT INTO order_notes (order_id, note) VALUES ($1, $2) RETURNING *")
        .bind(order_id.as_str())
        .bind(note)
        .fetch_one(conn)
        .await
}

pub async fn fetch_notes(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderNote>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_notes WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await
}

/// Removes the order together with its notes and history. Admin use only.
pub async fn delete_order(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM order_notes WHERE order_id = $1").bind(order_id.as_str()).execute(&mut *conn).await?;
    sqlx::query("DELETE FROM order_history WHERE order_id = $1").bind(order_id.as_str()).execute(&mut *conn).await?;
    sqlx::query("DELETE FROM orders WHERE order_id = $1").bind(order_id.as_str()).execute(conn).await?;
    Ok(())
}

pub async fn fetch_orders_created_after(
    ts: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE created_at > $1 ORDER BY created_at ASC")
        .bind(ts)
        .fetch_all(conn)
        .await
}

/// Active orders whose service period has lapsed without the order being paid.
pub async fn fetch_expired_unpaid(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE status = 'Active' AND end_date < $1 AND payment_status != 'Paid'
            ORDER BY end_date ASC;
        "#,
    )
    .bind(now)
    .fetch_all(conn)
    .await
}
