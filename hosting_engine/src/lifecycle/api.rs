use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewOrder, Order, OrderId, PaymentStatus, ServiceStatus},
    notifications::{NotificationDispatcher, NotificationEvent},
    provisioning::ProvisioningApi,
    traits::{LifecycleDatabase, LifecycleError, PaidOutcome, PaymentFacts, StatusChange},
};

/// `LifecycleApi` owns the order state machine. It is the sole writer of an order's service
/// status and payment status; operators, the reconciliation poller and the payment webhook all
/// funnel their triggers through this API.
///
/// ## Transition table for the service status
///
/// | From \ To | Active     | Suspended | Cancelled |
/// |-----------|------------|-----------|-----------|
/// | New       | Approve    | Err       | Reject    |
/// | Active    | Err        | suspend   | Err       |
/// | Suspended | Reactivate | Err       | Err       |
/// | Cancelled | Err        | Err       | Err       |
///
/// Every edge not in the table fails with [`LifecycleError::InvalidTransition`] and has no
/// partial effect. All status writes are compare-and-set against the status that was current when
/// the transition began, so a concurrent writer causes a [`LifecycleError::Conflict`] instead of
/// a lost update.
///
/// Side-effect ordering is fixed: provisioning happens *before* the status write (a provisioning
/// failure leaves the order in its pre-transition state), notifications happen *after* it (a
/// notification failure never reverts a committed transition).
pub struct LifecycleApi<B> {
    db: B,
    provisioning: ProvisioningApi<B>,
    dispatcher: NotificationDispatcher,
}

impl<B> Debug for LifecycleApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LifecycleApi")
    }
}

impl<B: Clone> LifecycleApi<B> {
    pub fn new(db: B, dispatcher: NotificationDispatcher) -> Self {
        let provisioning = ProvisioningApi::new(db.clone());
        Self { db, provisioning, dispatcher }
    }
}

impl<B> LifecycleApi<B>
where B: LifecycleDatabase
{
    /// Registers a new order. Idempotent on the order id; the first insertion writes a "created"
    /// audit entry and notifies the operator channel.
    pub async fn create_order(&self, order: NewOrder) -> Result<(Order, bool), LifecycleError> {
        let (order, inserted) = self.db.insert_order(order).await?;
        if inserted {
            debug!("🔄️📦️ Order [{}] registered for domain {}", order.order_id, order.domain);
            self.db.append_history(&order.order_id, "created", &format!("Order created for {}", order.domain)).await?;
            self.dispatcher.notify(NotificationEvent::OrderCreated { order: order.clone() }).await;
        } else {
            info!("🔄️📦️ Order [{}] already exists. Insert skipped.", order.order_id);
        }
        Ok((order, inserted))
    }

    /// Approves a `New` order, activating the service.
    ///
    /// Side effects, in order:
    /// 1. the downstream account is provisioned (idempotently). If this fails, the order stays in
    ///    its current status and the error is surfaced; retrying the same approval is safe.
    /// 2. the status is CAS-written `New -> Active` and an audit entry is appended.
    /// 3. client and operator notifications are dispatched (best-effort).
    pub async fn approve_order(&self, order_id: &OrderId) -> Result<StatusChange, LifecycleError> {
        let order = self.fetch_required(order_id).await?;
        self.check_edge(&order, ServiceStatus::Active)?;
        if order.payment_status == PaymentStatus::Cancelled {
            return Err(LifecycleError::Validation(format!(
                "Order {order_id} has a cancelled payment and cannot be approved"
            )));
        }
        let account = self.provisioning.provision(&order).await?;
        debug!("🔄️📦️ Account for order [{order_id}] provisioned on {}", account.domain);
        let updated = self.db.update_service_status(order_id, ServiceStatus::New, ServiceStatus::Active).await?;
        self.db.append_history(order_id, "approved", &format!("Service activated on {}", account.domain)).await?;
        info!("🔄️📦️ Order [{order_id}] approved and active");
        self.dispatcher
            .notify(NotificationEvent::OrderApproved { order: updated.clone(), account: account.clone() })
            .await;
        Ok(StatusChange { order: updated, old_status: ServiceStatus::New, new_status: ServiceStatus::Active })
    }

    /// Rejects a `New` order with a reason. Terminal: no further transitions are accepted.
    pub async fn reject_order(&self, order_id: &OrderId, reason: &str) -> Result<StatusChange, LifecycleError> {
        let order = self.fetch_required(order_id).await?;
        self.check_edge(&order, ServiceStatus::Cancelled)?;
        let updated = self.db.update_service_status(order_id, ServiceStatus::New, ServiceStatus::Cancelled).await?;
        self.db.append_history(order_id, "rejected", reason).await?;
        info!("🔄️📦️ Order [{order_id}] rejected. Reason: {reason}");
        self.dispatcher.notify(NotificationEvent::OrderRejected { order: updated.clone(), reason: reason.into() }).await;
        Ok(StatusChange { order: updated, old_status: ServiceStatus::New, new_status: ServiceStatus::Cancelled })
    }

    /// Suspends an `Active` order, either manually or because the service period lapsed without
    /// payment. The CAS write re-reads the current status immediately before writing, so a race
    /// against a concurrent reactivation (or a second suspension) surfaces as
    /// [`LifecycleError::Conflict`] to exactly one of the callers.
    pub async fn suspend_order(&self, order_id: &OrderId, reason: &str) -> Result<StatusChange, LifecycleError> {
        let order = self.fetch_required(order_id).await?;
        self.check_edge(&order, ServiceStatus::Suspended)?;
        let updated = self.db.update_service_status(order_id, ServiceStatus::Active, ServiceStatus::Suspended).await?;
        self.db.append_history(order_id, "suspended", reason).await?;
        info!("🔄️📦️ Order [{order_id}] suspended. Reason: {reason}");
        self.dispatcher
            .notify(NotificationEvent::OrderSuspended { order: updated.clone(), reason: reason.into() })
            .await;
        Ok(StatusChange { order: updated, old_status: ServiceStatus::Active, new_status: ServiceStatus::Suspended })
    }

    /// Reactivates a `Suspended` order. The provisioned account is re-validated first; if it has
    /// gone missing it is re-provisioned before the status flips back to `Active`.
    pub async fn reactivate_order(&self, order_id: &OrderId) -> Result<StatusChange, LifecycleError> {
        let order = self.fetch_required(order_id).await?;
        self.check_edge(&order, ServiceStatus::Active)?;
        if self.db.fetch_account_for_order(order_id).await?.is_none() {
            warn!("🔄️📦️ Order [{order_id}] has no provisioned account on reactivation. Re-provisioning.");
            self.provisioning.provision(&order).await?;
        }
        let updated = self.db.update_service_status(order_id, ServiceStatus::Suspended, ServiceStatus::Active).await?;
        self.db.append_history(order_id, "reactivated", "Service reactivated").await?;
        info!("🔄️📦️ Order [{order_id}] reactivated");
        self.dispatcher.notify(NotificationEvent::OrderReactivated { order: updated.clone() }).await;
        Ok(StatusChange { order: updated, old_status: ServiceStatus::Suspended, new_status: ServiceStatus::Active })
    }

    /// The invoice sub-transition `Unpaid -> Paid`, triggered only by a verified payment-gateway
    /// callback.
    ///
    /// Idempotency is layered: the gateway session id is checked first, so a byte-identical
    /// webhook retry returns [`PaidOutcome::DuplicateSession`] without touching the invoice; an
    /// event for an invoice that is already `Paid` returns [`PaidOutcome::AlreadyPaid`] as a
    /// logged no-op. Amounts are set exactly once, never accumulated.
    ///
    /// The session id is only recorded *after* the invoice write has succeeded. A resolution
    /// failure, database error or timeout therefore leaves the session unrecorded, and the
    /// gateway's retry of the same event is processed as if it were the first delivery.
    pub async fn invoice_paid(
        &self,
        session_id: &str,
        container_ref: &str,
        invoice_ref: &str,
        facts: PaymentFacts,
    ) -> Result<PaidOutcome, LifecycleError> {
        if self.db.session_processed(session_id).await? {
            info!("🔄️💰️ Gateway session {session_id} was already processed. Ignoring replay.");
            return Ok(PaidOutcome::DuplicateSession);
        }
        let container = self.db.resolve_container(container_ref).await?;
        let invoice = self.db.resolve_invoice(&container.container_id, invoice_ref).await?;
        let outcome = self.db.mark_invoice_paid(&container.container_id, &invoice.invoice_id, &facts).await?;
        self.db.record_processed_session(session_id).await?;
        match &outcome {
            PaidOutcome::Applied(paid) => {
                info!(
                    "🔄️💰️ Invoice {} in container {} marked paid: {} {}",
                    paid.number, container.container_id, paid.paid_amount, paid.currency
                );
                self.dispatcher.notify(NotificationEvent::InvoicePaid { invoice: paid.clone() }).await;
            },
            PaidOutcome::AlreadyPaid(paid) => {
                info!("🔄️💰️ Invoice {} is already paid. Payment event ignored.", paid.number);
            },
            PaidOutcome::DuplicateSession => {},
        }
        Ok(outcome)
    }

    /// Records an out-of-band payment (e.g. a bank transfer an operator confirmed by hand) against
    /// the order itself. Idempotent: an order that is already paid is returned unchanged.
    pub async fn mark_order_paid(&self, order_id: &OrderId, facts: PaymentFacts) -> Result<Order, LifecycleError> {
        let order = self.fetch_required(order_id).await?;
        if order.payment_status == PaymentStatus::Paid {
            info!("🔄️💰️ Order [{order_id}] is already paid. Nothing to record.");
            return Ok(order);
        }
        let updated = self.db.update_payment_status(order_id, PaymentStatus::Paid, Some(&facts)).await?;
        self.db
            .append_history(order_id, "payment_recorded", &format!("Payment of {} recorded via {}", facts.amount, facts.method))
            .await?;
        info!("🔄️💰️ Payment of {} recorded for order [{order_id}]", facts.amount);
        Ok(updated)
    }

    /// Raises an operator alert for a verified payment event that could not be matched to any
    /// invoice or container. The event is acknowledged upstream; this is the internal trail.
    pub async fn report_unmatched_payment(&self, session_id: &str, reason: &str) {
        warn!("🔄️💰️ Payment event {session_id} could not be processed: {reason}");
        self.dispatcher
            .notify(NotificationEvent::UnprocessedWebhook { session_id: session_id.into(), reason: reason.into() })
            .await;
    }

    async fn fetch_required(&self, order_id: &OrderId) -> Result<Order, LifecycleError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| LifecycleError::OrderNotFound(order_id.clone()))
    }

    /// Validates the requested edge against the transition table before any side effect runs.
    /// The CAS status write re-checks the starting state at write time; this check exists to give
    /// callers a precise [`LifecycleError::InvalidTransition`] for edges that are never legal.
    fn check_edge(&self, order: &Order, to: ServiceStatus) -> Result<(), LifecycleError> {
        use ServiceStatus::*;
        let legal = matches!(
            (order.status, to),
            (New, Active) | (New, Cancelled) | (Active, Suspended) | (Suspended, Active)
        );
        if legal {
            Ok(())
        } else {
            Err(LifecycleError::InvalidTransition { from: order.status, to })
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }
}
