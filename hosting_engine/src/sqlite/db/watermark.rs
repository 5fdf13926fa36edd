use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

pub async fn fetch_watermark(name: &str, conn: &mut SqliteConnection) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    let row: Option<(DateTime<Utc>,)> =
        sqlx::query_as("SELECT ts FROM watermarks WHERE name = $1").bind(name).fetch_optional(conn).await?;
    Ok(row.map(|(ts,)| ts))
}

pub async fn store_watermark(name: &str, ts: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO watermarks (name, ts) VALUES ($1, $2) ON CONFLICT (name) DO UPDATE SET ts = excluded.ts")
        .bind(name)
        .bind(ts)
        .execute(conn)
        .await?;
    Ok(())
}
