//! `SqliteDatabase` is the production implementation of the order lifecycle store.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::db::{accounts, db_url, invoices, new_pool, notifications, orders, watermark};
use crate::{
    db_types::{
        Container,
        ContainerId,
        HistoryEntry,
        Invoice,
        NewNotification,
        NewOrder,
        Notification,
        Order,
        OrderId,
        OrderNote,
        PaymentStatus,
        ProvisionedAccount,
        ServiceStatus,
    },
    traits::{LifecycleDatabase, LifecycleError, PaidOutcome, PaymentFacts},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Connects to the database given by the `HPG_DATABASE_URL` environment variable, creating the
    /// file and schema if they do not exist.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl LifecycleDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        orders::idempotent_insert(order, &mut conn).await
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_order_id(order_id, &mut conn).await?)
    }

    async fn fetch_orders(&self) -> Result<Vec<Order>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_all_orders(&mut conn).await?)
    }

    async fn update_service_status(
        &self,
        order_id: &OrderId,
        expected: ServiceStatus,
        new: ServiceStatus,
    ) -> Result<Order, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_status_cas(order_id, expected, new, &mut conn).await
    }

    async fn update_payment_status(
        &self,
        order_id: &OrderId,
        status: PaymentStatus,
        facts: Option<&PaymentFacts>,
    ) -> Result<Order, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_payment(order_id, status, facts, &mut conn).await
    }

    async fn append_history(&self, order_id: &OrderId, action: &str, detail: &str) -> Result<(), LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::append_history(order_id, action, detail, &mut conn).await?)
    }

    async fn fetch_history(&self, order_id: &OrderId) -> Result<Vec<HistoryEntry>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_history(order_id, &mut conn).await?)
    }

    async fn add_note(&self, order_id: &OrderId, note: &str) -> Result<OrderNote, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::add_note(order_id, note, &mut conn).await?)
    }

    async fn fetch_notes(&self, order_id: &OrderId) -> Result<Vec<OrderNote>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_notes(order_id, &mut conn).await?)
    }

    async fn delete_order(&self, order_id: &OrderId) -> Result<(), LifecycleError> {
        let mut tx = self.pool.begin().await?;
        orders::delete_order(order_id, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn orders_created_after(&self, ts: DateTime<Utc>) -> Result<Vec<Order>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_orders_created_after(ts, &mut conn).await?)
    }

    async fn expired_unpaid_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_expired_unpaid(now, &mut conn).await?)
    }

    async fn resolve_container(&self, identifier: &str) -> Result<Container, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        invoices::resolve_container(identifier, &mut conn).await
    }

    async fn resolve_invoice(&self, container: &ContainerId, identifier: &str) -> Result<Invoice, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        invoices::resolve_invoice(container, identifier, &mut conn).await
    }

    async fn mark_invoice_paid(
        &self,
        container: &ContainerId,
        invoice_id: &str,
        facts: &PaymentFacts,
    ) -> Result<PaidOutcome, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        invoices::mark_invoice_paid(container, invoice_id, facts, &mut conn).await
    }

    async fn session_processed(&self, session_id: &str) -> Result<bool, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(invoices::session_processed(session_id, &mut conn).await?)
    }

    async fn record_processed_session(&self, session_id: &str) -> Result<bool, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(invoices::record_processed_session(session_id, &mut conn).await?)
    }

    async fn fetch_account_for_order(&self, order_id: &OrderId) -> Result<Option<ProvisionedAccount>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(accounts::fetch_by_order(order_id, &mut conn).await?)
    }

    async fn fetch_account_for_domain(&self, domain: &str) -> Result<Option<ProvisionedAccount>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(accounts::fetch_by_domain(domain, &mut conn).await?)
    }

    async fn insert_provisioned_account(
        &self,
        order_id: &OrderId,
        domain: &str,
        sharing_token: &str,
        pin: &str,
    ) -> Result<ProvisionedAccount, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(accounts::insert_account(order_id, domain, sharing_token, pin, &mut conn).await?)
    }

    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(notifications::insert_deduplicated(notification, &mut conn).await?)
    }

    async fn fetch_notifications(&self, unread_only: bool) -> Result<Vec<Notification>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(notifications::fetch_notifications(unread_only, &mut conn).await?)
    }

    async fn mark_notification_read(&self, id: i64) -> Result<(), LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(notifications::mark_read(id, &mut conn).await?)
    }

    async fn fetch_watermark(&self, name: &str) -> Result<Option<DateTime<Utc>>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(watermark::fetch_watermark(name, &mut conn).await?)
    }

    async fn store_watermark(&self, name: &str, ts: DateTime<Utc>) -> Result<(), LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(watermark::store_watermark(name, ts, &mut conn).await?)
    }

    async fn close(&mut self) -> Result<(), LifecycleError> {
        self.pool.close().await;
        Ok(())
    }
}
