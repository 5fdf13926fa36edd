use log::trace;
use sqlx::SqliteConnection;

use crate::db_types::{NewNotification, Notification};

/// Inserts an in-app notification. While an unread notification with the same kind and order
/// correlation exists, the insert is skipped and the existing record is returned, so repeated
/// events do not flood the feed.
pub async fn insert_deduplicated(
    notification: NewNotification,
    conn: &mut SqliteConnection,
) -> Result<Notification, sqlx::Error> {
    // `IS` rather than `=` so a NULL order correlation also deduplicates.
    let existing: Option<Notification> =
        sqlx::query_as("SELECT * FROM notifications WHERE kind = $1 AND order_id IS $2 AND is_read = 0 LIMIT 1")
            .bind(notification.kind.as_str())
            .bind(notification.order_id.as_ref().map(|o| o.as_str()))
            .fetch_optional(&mut *conn)
            .await?;
    if let Some(n) = existing {
        trace!("🗃️ Unread '{}' notification already exists (#{}). Skipping insert.", n.kind, n.id);
        return Ok(n);
    }
    sqlx::query_as(
        r#"
            INSERT INTO notifications (kind, title, message, severity, order_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(notification.kind)
    .bind(notification.title)
    .bind(notification.message)
    .bind(notification.severity)
    .bind(notification.order_id)
    .fetch_one(conn)
    .await
}

pub async fn fetch_notifications(unread_only: bool, conn: &mut SqliteConnection) -> Result<Vec<Notification>, sqlx::Error> {
    let query = if unread_only {
        "SELECT * FROM notifications WHERE is_read = 0 ORDER BY created_at DESC"
    } else {
        "SELECT * FROM notifications ORDER BY created_at DESC"
    };
    sqlx::query_as(query).fetch_all(conn).await
}

pub async fn mark_read(id: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = $1").bind(id).execute(conn).await?;
    Ok(())
}
