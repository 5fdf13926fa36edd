use serde::{Deserialize, Serialize};

use crate::db_types::{Invoice, Order, OrderId, ProvisionedAccount, Severity};

/// Who a notification is meant for. Channels filter on this; the in-app feed is operator-facing
/// while e.g. a mail channel would deliver the client-facing events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Audience {
    Client,
    Operator,
    Both,
}

/// A domain event worth telling someone about. Emitted by the Lifecycle Controller after the
/// corresponding state change has been committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NotificationEvent {
    OrderCreated { order: Order },
    OrderApproved { order: Order, account: ProvisionedAccount },
    OrderRejected { order: Order, reason: String },
    OrderSuspended { order: Order, reason: String },
    OrderReactivated { order: Order },
    InvoicePaid { invoice: Invoice },
    /// A verified payment event that could not be matched to any invoice. Operator must
    /// reconcile by hand.
    UnprocessedWebhook { session_id: String, reason: String },
}

impl NotificationEvent {
    /// A stable machine-readable tag. The in-app store deduplicates unread notifications on
    /// (kind, order id), so kinds must stay distinct per event type.
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::OrderCreated { .. } => "order_created",
            NotificationEvent::OrderApproved { .. } => "order_approved",
            NotificationEvent::OrderRejected { .. } => "order_rejected",
            NotificationEvent::OrderSuspended { .. } => "order_suspended",
            NotificationEvent::OrderReactivated { .. } => "order_reactivated",
            NotificationEvent::InvoicePaid { .. } => "invoice_paid",
            NotificationEvent::UnprocessedWebhook { .. } => "unprocessed_webhook",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            NotificationEvent::OrderSuspended { .. } => Severity::Warning,
            NotificationEvent::UnprocessedWebhook { .. } => Severity::Critical,
            _ => Severity::Info,
        }
    }

    pub fn audience(&self) -> Audience {
        match self {
            NotificationEvent::OrderCreated { .. } => Audience::Operator,
            NotificationEvent::UnprocessedWebhook { .. } => Audience::Operator,
            NotificationEvent::InvoicePaid { .. } => Audience::Both,
            _ => Audience::Both,
        }
    }

    pub fn order_id(&self) -> Option<&OrderId> {
        match self {
            NotificationEvent::OrderCreated { order } |
            NotificationEvent::OrderApproved { order, .. } |
            NotificationEvent::OrderRejected { order, .. } |
            NotificationEvent::OrderSuspended { order, .. } |
            NotificationEvent::OrderReactivated { order } => Some(&order.order_id),
            NotificationEvent::InvoicePaid { .. } | NotificationEvent::UnprocessedWebhook { .. } => None,
        }
    }

    pub fn title(&self) -> String {
        match self {
            NotificationEvent::OrderCreated { order } => format!("New order {}", order.order_id),
            NotificationEvent::OrderApproved { order, .. } => format!("Order {} approved", order.order_id),
            NotificationEvent::OrderRejected { order, .. } => format!("Order {} rejected", order.order_id),
            NotificationEvent::OrderSuspended { order, .. } => format!("Order {} suspended", order.order_id),
            NotificationEvent::OrderReactivated { order } => format!("Order {} reactivated", order.order_id),
            NotificationEvent::InvoicePaid { invoice } => format!("Invoice {} paid", invoice.number),
            NotificationEvent::UnprocessedWebhook { session_id, .. } => {
                format!("Unmatched payment event {session_id}")
            },
        }
    }

    pub fn message(&self) -> String {
        match self {
            NotificationEvent::OrderCreated { order } => {
                format!("{} ordered a {} {} plan for {}", order.customer_name, order.billing_period, order.plan_type, order.domain)
            },
            NotificationEvent::OrderApproved { order, account } => {
                format!("Hosting for {} is active. Service account provisioned on {}", order.domain, account.domain)
            },
            NotificationEvent::OrderRejected { order, reason } => {
                format!("The order for {} was rejected: {reason}", order.domain)
            },
            NotificationEvent::OrderSuspended { order, reason } => {
                format!("Hosting for {} has been suspended: {reason}", order.domain)
            },
            NotificationEvent::OrderReactivated { order } => {
                format!("Hosting for {} has been reactivated", order.domain)
            },
            NotificationEvent::InvoicePaid { invoice } => {
                format!("Invoice {} settled for {} {}", invoice.number, invoice.paid_amount, invoice.currency)
            },
            NotificationEvent::UnprocessedWebhook { session_id, reason } => {
                format!("A verified payment event (session {session_id}) could not be applied: {reason}. Manual reconciliation required.")
            },
        }
    }
}
