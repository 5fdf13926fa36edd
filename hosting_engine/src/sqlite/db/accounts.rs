use sqlx::SqliteConnection;

use crate::db_types::{OrderId, ProvisionedAccount};

pub async fn fetch_by_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<ProvisionedAccount>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM provisioned_accounts WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_optional(conn)
        .await
}

pub async fn fetch_by_domain(
    domain: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<ProvisionedAccount>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM provisioned_accounts WHERE domain = $1").bind(domain).fetch_optional(conn).await
}

pub async fn insert_account(
    order_id: &OrderId,
    domain: &str,
    sharing_token: &str,
    pin: &str,
    conn: &mut SqliteConnection,
) -> Result<ProvisionedAccount, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO provisioned_accounts (order_id, domain, sharing_token, pin)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(domain)
    .bind(sharing_token)
    .bind(pin)
    .fetch_one(conn)
    .await
}
