//! An in-memory implementation of the lifecycle store.
//!
//! Behaviourally equivalent to the SQLite backend (same idempotency, CAS and deduplication
//! semantics) but with no I/O, so controller and poller tests run against it directly. The state
//! is shared between clones, mirroring how pool-backed databases behave.
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};

use crate::{
    db_types::{
        Container,
        ContainerId,
        HistoryEntry,
        Invoice,
        InvoiceStatus,
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
    traits::{
        LifecycleDatabase,
        LifecycleError,
        PaidOutcome,
        PaymentFacts,
        ResolutionError,
        ResolutionStrategy,
    },
};

#[derive(Default)]
struct MemoryState {
    orders: Vec<Order>,
    history: Vec<HistoryEntry>,
    notes: Vec<OrderNote>,
    containers: Vec<Container>,
    invoices: Vec<Invoice>,
    accounts: Vec<ProvisionedAccount>,
    notifications: Vec<Notification>,
    processed_sessions: HashSet<String>,
    watermarks: HashMap<String, DateTime<Utc>>,
    next_id: i64,
    fail_provisioning: bool,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, the next (and every subsequent) provisioned-account insert fails with a
    /// [`LifecycleError::Provisioning`] error. Used to test that a failed approval leaves the
    /// order untouched.
    pub fn set_fail_provisioning(&self, fail: bool) {
        self.lock().fail_provisioning = fail;
    }

    /// Test seeding. Containers and invoices are normally owned by the upstream accounting
    /// system, so the trait has no insert operations for them.
    pub fn add_container(
        &self,
        container_id: &str,
        name: &str,
        legacy_id: Option<i64>,
        sharing_token: Option<&str>,
    ) -> Container {
        let mut state = self.lock();
        let container = Container {
            id: state.next_id(),
            container_id: ContainerId(container_id.to_string()),
            name: name.to_string(),
            legacy_id,
            sharing_token: sharing_token.map(String::from),
            created_at: Utc::now(),
        };
        state.containers.push(container.clone());
        container
    }

    pub fn add_invoice(
        &self,
        container_id: &str,
        invoice_id: &str,
        number: &str,
        currency: &str,
        total_amount: hpg_common::MinorUnits,
    ) -> Invoice {
        let mut state = self.lock();
        let invoice = Invoice {
            id: state.next_id(),
            invoice_id: invoice_id.to_string(),
            container_id: ContainerId(container_id.to_string()),
            number: number.to_string(),
            status: InvoiceStatus::Unpaid,
            currency: currency.to_string(),
            total_amount,
            paid_amount: hpg_common::MinorUnits::from(0),
            paid_at: None,
            payment_method: None,
            payment_reference: None,
            created_at: Utc::now(),
        };
        state.invoices.push(invoice.clone());
        invoice
    }

    pub fn add_account(&self, order_id: &str, domain: &str) -> ProvisionedAccount {
        let mut state = self.lock();
        let account = ProvisionedAccount {
            id: state.next_id(),
            order_id: OrderId(order_id.to_string()),
            domain: domain.to_string(),
            sharing_token: "tok_0000000000000000000000000000".to_string(),
            pin: "135790".to_string(),
            created_at: Utc::now(),
        };
        state.accounts.push(account.clone());
        account
    }

    /// Marks an invoice paid directly, bypassing the sub-transition. Test setup only.
    pub fn force_invoice_paid(&self, container_id: &str, invoice_id: &str) {
        let mut state = self.lock();
        if let Some(invoice) = state
            .invoices
            .iter_mut()
            .find(|i| i.container_id.as_str() == container_id && i.invoice_id == invoice_id)
        {
            invoice.status = InvoiceStatus::Paid;
        }
    }

    /// Forces an order into the given status, bypassing the transition rules. Test setup only.
    pub fn force_status(&self, order_id: &OrderId, status: ServiceStatus) {
        let mut state = self.lock();
        if let Some(order) = state.orders.iter_mut().find(|o| &o.order_id == order_id) {
            order.status = status;
        }
    }

    /// Backdates the service period end so the order qualifies for poller suspension.
    pub fn force_end_date(&self, order_id: &OrderId, end_date: DateTime<Utc>) {
        let mut state = self.lock();
        if let Some(order) = state.orders.iter_mut().find(|o| &o.order_id == order_id) {
            order.end_date = end_date;
        }
    }

    pub fn account_count(&self) -> usize {
        self.lock().accounts.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }
}

impl LifecycleDatabase for MemoryDatabase {
    fn url(&self) -> &str {
        "memory://"
    }

    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), LifecycleError> {
        let mut state = self.lock();
        if let Some(existing) = state.orders.iter().find(|o| o.order_id == order.order_id) {
            return Ok((existing.clone(), false));
        }
        let now = Utc::now();
        let new = Order {
            id: state.next_id(),
            order_id: order.order_id,
            customer_name: order.customer_name,
            customer_email: order.customer_email,
            customer_phone: order.customer_phone,
            customer_company: order.customer_company,
            customer_address: order.customer_address,
            plan_type: order.plan_type,
            billing_period: order.billing_period,
            price: order.price,
            currency: order.currency,
            domain: order.domain,
            status: ServiceStatus::New,
            start_date: order.start_date,
            end_date: order.end_date,
            payment_status: PaymentStatus::Pending,
            payment_method: None,
            paid_at: None,
            payment_reference: None,
            created_at: now,
            updated_at: now,
        };
        state.orders.push(new.clone());
        Ok((new, true))
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, LifecycleError> {
        Ok(self.lock().orders.iter().find(|o| &o.order_id == order_id).cloned())
    }

    async fn fetch_orders(&self) -> Result<Vec<Order>, LifecycleError> {
        let mut orders = self.lock().orders.clone();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn update_service_status(
        &self,
        order_id: &OrderId,
        expected: ServiceStatus,
        new: ServiceStatus,
    ) -> Result<Order, LifecycleError> {
        let mut state = self.lock();
        let order = state
            .orders
            .iter_mut()
            .find(|o| &o.order_id == order_id)
            .ok_or_else(|| LifecycleError::OrderNotFound(order_id.clone()))?;
        if order.status != expected {
            return Err(LifecycleError::Conflict { order_id: order_id.clone(), expected, actual: order.status });
        }
        order.status = new;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn update_payment_status(
        &self,
        order_id: &OrderId,
        status: PaymentStatus,
        facts: Option<&PaymentFacts>,
    ) -> Result<Order, LifecycleError> {
        let mut state = self.lock();
        let order = state
            .orders
            .iter_mut()
            .find(|o| &o.order_id == order_id)
            .ok_or_else(|| LifecycleError::OrderNotFound(order_id.clone()))?;
        order.payment_status = status;
        if let Some(facts) = facts {
            order.payment_method = Some(facts.method.clone());
            order.payment_reference = Some(facts.reference.clone());
            order.paid_at = Some(facts.paid_at);
        }
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn append_history(&self, order_id: &OrderId, action: &str, detail: &str) -> Result<(), LifecycleError> {
        let mut state = self.lock();
        let entry = HistoryEntry {
            id: state.next_id(),
            order_id: order_id.clone(),
            action: action.to_string(),
            detail: detail.to_string(),
            created_at: Utc::now(),
        };
        state.history.push(entry);
        Ok(())
    }

    async fn fetch_history(&self, order_id: &OrderId) -> Result<Vec<HistoryEntry>, LifecycleError> {
        Ok(self.lock().history.iter().filter(|h| &h.order_id == order_id).cloned().collect())
    }

    async fn add_note(&self, order_id: &OrderId, note: &str) -> Result<OrderNote, LifecycleError> {
        let mut state = self.lock();
        let note = OrderNote {
            id: state.next_id(),
            order_id: order_id.clone(),
            note: note.to_string(),
            created_at: Utc::now(),
        };
        state.notes.push(note.clone());
        Ok(note)
    }

    async fn fetch_notes(&self, order_id: &OrderId) -> Result<Vec<OrderNote>, LifecycleError> {
        Ok(self.lock().notes.iter().filter(|n| &n.order_id == order_id).cloned().collect())
    }

    async fn delete_order(&self, order_id: &OrderId) -> Result<(), LifecycleError> {
        let mut state = self.lock();
        state.orders.retain(|o| &o.order_id != order_id);
        state.history.retain(|h| &h.order_id != order_id);
        state.notes.retain(|n| &n.order_id != order_id);
        Ok(())
    }

    async fn orders_created_after(&self, ts: DateTime<Utc>) -> Result<Vec<Order>, LifecycleError> {
        let mut orders: Vec<Order> = self.lock().orders.iter().filter(|o| o.created_at > ts).cloned().collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }

    async fn expired_unpaid_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, LifecycleError> {
        Ok(self.lock().orders.iter().filter(|o| o.is_expired_unpaid(now)).cloned().collect())
    }

    async fn resolve_container(&self, identifier: &str) -> Result<Container, LifecycleError> {
        let state = self.lock();
        let mut attempted = vec![ResolutionStrategy::ExactId];
        if let Some(c) = state.containers.iter().find(|c| c.container_id.as_str() == identifier) {
            return Ok(c.clone());
        }
        attempted.push(ResolutionStrategy::SecondaryId);
        if let Some(c) = state.containers.iter().find(|c| c.legacy_id.map(|id| id.to_string()).as_deref() == Some(identifier)) {
            return Ok(c.clone());
        }
        attempted.push(ResolutionStrategy::NameOrToken);
        if let Some(c) = state
            .containers
            .iter()
            .find(|c| c.name.contains(identifier) || c.sharing_token.as_deref() == Some(identifier))
        {
            return Ok(c.clone());
        }
        Err(ResolutionError::new("container", identifier, attempted).into())
    }

    async fn resolve_invoice(&self, container: &ContainerId, identifier: &str) -> Result<Invoice, LifecycleError> {
        let state = self.lock();
        let mut attempted = vec![ResolutionStrategy::ExactId];
        let in_container = || state.invoices.iter().filter(|i| &i.container_id == container);
        if let Some(i) = in_container().find(|i| i.invoice_id == identifier) {
            return Ok(i.clone());
        }
        attempted.push(ResolutionStrategy::SecondaryId);
        if let Some(i) = in_container().find(|i| i.number == identifier) {
            return Ok(i.clone());
        }
        Err(ResolutionError::new("invoice", identifier, attempted).into())
    }

    async fn mark_invoice_paid(
        &self,
        container: &ContainerId,
        invoice_id: &str,
        facts: &PaymentFacts,
    ) -> Result<PaidOutcome, LifecycleError> {
        let mut state = self.lock();
        let invoice = state
            .invoices
            .iter_mut()
            .find(|i| &i.container_id == container && i.invoice_id == invoice_id)
            .ok_or_else(|| ResolutionError::new("invoice", invoice_id, vec![ResolutionStrategy::ExactId]))?;
        if invoice.status == InvoiceStatus::Paid {
            return Ok(PaidOutcome::AlreadyPaid(invoice.clone()));
        }
        invoice.status = InvoiceStatus::Paid;
        invoice.paid_amount = facts.amount;
        invoice.paid_at = Some(facts.paid_at);
        invoice.payment_method = Some(facts.method.clone());
        invoice.payment_reference = Some(facts.reference.clone());
        Ok(PaidOutcome::Applied(invoice.clone()))
    }

    async fn session_processed(&self, session_id: &str) -> Result<bool, LifecycleError> {
        Ok(self.lock().processed_sessions.contains(session_id))
    }

    async fn record_processed_session(&self, session_id: &str) -> Result<bool, LifecycleError> {
        Ok(self.lock().processed_sessions.insert(session_id.to_string()))
    }

    async fn fetch_account_for_order(&self, order_id: &OrderId) -> Result<Option<ProvisionedAccount>, LifecycleError> {
        Ok(self.lock().accounts.iter().find(|a| &a.order_id == order_id).cloned())
    }

    async fn fetch_account_for_domain(&self, domain: &str) -> Result<Option<ProvisionedAccount>, LifecycleError> {
        Ok(self.lock().accounts.iter().find(|a| a.domain == domain).cloned())
    }

    async fn insert_provisioned_account(
        &self,
        order_id: &OrderId,
        domain: &str,
        sharing_token: &str,
        pin: &str,
    ) -> Result<ProvisionedAccount, LifecycleError> {
        let mut state = self.lock();
        if state.fail_provisioning {
            return Err(LifecycleError::Provisioning("Injected provisioning failure".to_string()));
        }
        let account = ProvisionedAccount {
            id: state.next_id(),
            order_id: order_id.clone(),
            domain: domain.to_string(),
            sharing_token: sharing_token.to_string(),
            pin: pin.to_string(),
            created_at: Utc::now(),
        };
        state.accounts.push(account.clone());
        Ok(account)
    }

    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, LifecycleError> {
        let mut state = self.lock();
        if let Some(existing) = state
            .notifications
            .iter()
            .find(|n| !n.read && n.kind == notification.kind && n.order_id == notification.order_id)
        {
            return Ok(existing.clone());
        }
        let stored = Notification {
            id: state.next_id(),
            kind: notification.kind,
            title: notification.title,
            message: notification.message,
            severity: notification.severity,
            read: false,
            order_id: notification.order_id,
            created_at: Utc::now(),
        };
        state.notifications.push(stored.clone());
        Ok(stored)
    }

    async fn fetch_notifications(&self, unread_only: bool) -> Result<Vec<Notification>, LifecycleError> {
        let mut notifications: Vec<Notification> =
            self.lock().notifications.iter().filter(|n| !unread_only || !n.read).cloned().collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    async fn mark_notification_read(&self, id: i64) -> Result<(), LifecycleError> {
        let mut state = self.lock();
        if let Some(n) = state.notifications.iter_mut().find(|n| n.id == id) {
            n.read = true;
        }
        Ok(())
    }

    async fn fetch_watermark(&self, name: &str) -> Result<Option<DateTime<Utc>>, LifecycleError> {
        Ok(self.lock().watermarks.get(name).copied())
    }

    async fn store_watermark(&self, name: &str, ts: DateTime<Utc>) -> Result<(), LifecycleError> {
        self.lock().watermarks.insert(name.to_string(), ts);
        Ok(())
    }
}
