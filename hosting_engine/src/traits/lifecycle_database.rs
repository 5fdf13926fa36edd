use std::future::Future;

use chrono::{DateTime, Utc};
use thiserror::Error;

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
    traits::data_objects::{PaidOutcome, PaymentFacts, ResolutionError},
};

/// The storage contract for the order lifecycle engine.
///
/// The order store is the only mutable shared resource in the system; everything else is a
/// stateless adapter over it. Backends must make the individual operations atomic, but no caller
/// ever holds a lock across an external network call -- conflicting writers are resolved with the
/// compare-and-set semantics of [`LifecycleDatabase::update_service_status`] instead.
#[allow(async_fn_in_trait)]
pub trait LifecycleDatabase: Clone {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Stores a new order. This call is idempotent: if an order with the same order id already
    /// exists, the existing record is returned and the second element is `false`.
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), LifecycleError>;

    /// Fetches the order with the given order id, or `None` if it does not exist.
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, LifecycleError>;

    /// Lists all orders, newest first.
    async fn fetch_orders(&self) -> Result<Vec<Order>, LifecycleError>;

    /// Compare-and-set write of the service status.
    ///
    /// The current status is re-read in the same statement as the write; if it no longer equals
    /// `expected` the call fails with [`LifecycleError::Conflict`] and nothing is written. This is
    /// what prevents e.g. an operator reactivation and a poller suspension from both succeeding.
    async fn update_service_status(
        &self,
        order_id: &OrderId,
        expected: ServiceStatus,
        new: ServiceStatus,
    ) -> Result<Order, LifecycleError>;

    /// Updates the payment fields of an order. Does not touch the service status.
    async fn update_payment_status(
        &self,
        order_id: &OrderId,
        status: PaymentStatus,
        facts: Option<&PaymentFacts>,
    ) -> Result<Order, LifecycleError>;

    /// Appends an entry to the order's audit log. The log is append-only and preserved verbatim.
    async fn append_history(&self, order_id: &OrderId, action: &str, detail: &str)
        -> Result<(), LifecycleError>;

    /// Returns the order's audit log, oldest first.
    async fn fetch_history(&self, order_id: &OrderId) -> Result<Vec<HistoryEntry>, LifecycleError>;

    /// Attaches a timestamped free-text note to the order.
    async fn add_note(&self, order_id: &OrderId, note: &str) -> Result<OrderNote, LifecycleError>;

    async fn fetch_notes(&self, order_id: &OrderId) -> Result<Vec<OrderNote>, LifecycleError>;

    /// Deletes an order and its notes/history. Used by the admin UI only.
    async fn delete_order(&self, order_id: &OrderId) -> Result<(), LifecycleError>;

    /// Orders created strictly after the given timestamp, oldest first. Poller query.
    async fn orders_created_after(&self, ts: DateTime<Utc>) -> Result<Vec<Order>, LifecycleError>;

    /// Active orders whose service period has lapsed without payment. Poller query.
    async fn expired_unpaid_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, LifecycleError>;

    /// Resolves a container using the ordered fallback chain: exact container id, then the legacy
    /// numeric id coerced to string, then a name-pattern or sharing-token match. Each step is only
    /// attempted if the previous one failed. If all fail, the [`ResolutionError`] lists every
    /// strategy tried.
    async fn resolve_container(&self, identifier: &str) -> Result<Container, LifecycleError>;

    /// Resolves an invoice within a container: exact invoice id, then the human-readable number
    /// coerced to string equality.
    async fn resolve_invoice(&self, container: &ContainerId, identifier: &str) -> Result<Invoice, LifecycleError>;

    /// Marks an invoice as paid. Idempotent: if the invoice is already `Paid` the record is
    /// returned unchanged as [`PaidOutcome::AlreadyPaid`] and the amount fields are not modified.
    async fn mark_invoice_paid(
        &self,
        container: &ContainerId,
        invoice_id: &str,
        facts: &PaymentFacts,
    ) -> Result<PaidOutcome, LifecycleError>;

    /// Checks whether a gateway session id has been processed before, without recording anything.
    async fn session_processed(&self, session_id: &str) -> Result<bool, LifecycleError>;

    /// Records a gateway session id as processed. Returns `false` (without writing) if the id was
    /// seen before. Callers record the id only after the payment has been applied, so a failed
    /// attempt leaves the session unrecorded and the gateway's retry is processed normally.
    async fn record_processed_session(&self, session_id: &str) -> Result<bool, LifecycleError>;

    async fn fetch_account_for_order(&self, order_id: &OrderId)
        -> Result<Option<ProvisionedAccount>, LifecycleError>;

    async fn fetch_account_for_domain(&self, domain: &str) -> Result<Option<ProvisionedAccount>, LifecycleError>;

    async fn insert_provisioned_account(
        &self,
        order_id: &OrderId,
        domain: &str,
        sharing_token: &str,
        pin: &str,
    ) -> Result<ProvisionedAccount, LifecycleError>;

    /// Stores an in-app notification. Deduplicated: while an unread notification with the same
    /// kind and order correlation exists, the call is a no-op returning the existing record.
    ///
    /// Declared with an explicit `Send` future (implementations still write `async fn`) because
    /// notification channels box this into a `Send` future that may run on a spawned task.
    fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> impl Future<Output = Result<Notification, LifecycleError>> + Send;

    async fn fetch_notifications(&self, unread_only: bool) -> Result<Vec<Notification>, LifecycleError>;

    async fn mark_notification_read(&self, id: i64) -> Result<(), LifecycleError>;

    /// Reads a named watermark timestamp, e.g. the reconciliation poller's "last checked" marker.
    async fn fetch_watermark(&self, name: &str) -> Result<Option<DateTime<Utc>>, LifecycleError>;

    /// Persists a named watermark. Callers only advance it after a fully successful pass.
    async fn store_watermark(&self, name: &str, ts: DateTime<Utc>) -> Result<(), LifecycleError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), LifecycleError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum LifecycleError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("{0}")]
    NotFound(#[from] ResolutionError),
    #[error("Transition {from} -> {to} is not a legal order state change")]
    InvalidTransition { from: ServiceStatus, to: ServiceStatus },
    #[error("Concurrent modification of order {order_id}: expected status {expected}, found {actual}")]
    Conflict { order_id: OrderId, expected: ServiceStatus, actual: ServiceStatus },
    #[error("Provisioning failed: {0}")]
    Provisioning(String),
}

impl From<sqlx::Error> for LifecycleError {
    fn from(e: sqlx::Error) -> Self {
        LifecycleError::DatabaseError(e.to_string())
    }
}
