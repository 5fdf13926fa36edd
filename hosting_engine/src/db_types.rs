use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use hpg_common::MinorUnits;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------      OrderId      -----------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   ServiceStatus   -----------------------------------------------------------
/// The lifecycle state of the hosting service attached to an order.
///
/// Only the Lifecycle Controller writes this field. `Cancelled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum ServiceStatus {
    /// The order has been created but not yet approved by an operator.
    New,
    /// The service is provisioned and running.
    Active,
    /// The service has been suspended, either manually or because the service period lapsed
    /// without payment.
    Suspended,
    /// The order was rejected or cancelled. No further transitions are accepted.
    Cancelled,
}

impl Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceStatus::New => write!(f, "New"),
            ServiceStatus::Active => write!(f, "Active"),
            ServiceStatus::Suspended => write!(f, "Suspended"),
            ServiceStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for ServiceStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "New" => Ok(Self::New),
            "Active" => Ok(Self::Active),
            "Suspended" => Ok(Self::Suspended),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid service status: {s}"))),
        }
    }
}

impl From<String> for ServiceStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            log::error!("Invalid service status stored in the database: {value}. Defaulting to New");
            ServiceStatus::New
        })
    }
}

//--------------------------------------   PaymentStatus   -----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Cancelled,
    Refunded,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Paid => write!(f, "Paid"),
            PaymentStatus::Cancelled => write!(f, "Cancelled"),
            PaymentStatus::Refunded => write!(f, "Refunded"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Cancelled" => Ok(Self::Cancelled),
            "Refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            log::error!("Invalid payment status stored in the database: {value}. Defaulting to Pending");
            PaymentStatus::Pending
        })
    }
}

//--------------------------------------   Plan descriptors  ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PlanType {
    Standard,
    Reseller,
}

impl Display for PlanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanType::Standard => write!(f, "Standard"),
            PlanType::Reseller => write!(f, "Reseller"),
        }
    }
}

impl From<String> for PlanType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Reseller" => Self::Reseller,
            _ => Self::Standard,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum BillingPeriod {
    Monthly,
    Annual,
}

impl Display for BillingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BillingPeriod::Monthly => write!(f, "Monthly"),
            BillingPeriod::Annual => write!(f, "Annual"),
        }
    }
}

impl From<String> for BillingPeriod {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Annual" => Self::Annual,
            _ => Self::Monthly,
        }
    }
}

//--------------------------------------       Order       -----------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub customer_company: Option<String>,
    pub customer_address: Option<String>,
    pub plan_type: PlanType,
    pub billing_period: BillingPeriod,
    pub price: MinorUnits,
    pub currency: String,
    pub domain: String,
    pub status: ServiceStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// True when the service period has lapsed and the order has not been paid. These orders are
    /// candidates for suspension by the reconciliation poller.
    pub fn is_expired_unpaid(&self, now: DateTime<Utc>) -> bool {
        self.status == ServiceStatus::Active && self.end_date < now && self.payment_status != PaymentStatus::Paid
    }
}

//--------------------------------------      NewOrder      ----------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub customer_name: String,
    pub customer_email: String,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub customer_company: Option<String>,
    #[serde(default)]
    pub customer_address: Option<String>,
    pub plan_type: PlanType,
    pub billing_period: BillingPeriod,
    pub price: MinorUnits,
    pub currency: String,
    /// The domain name the hosting service will be provisioned for.
    pub domain: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

//--------------------------------------    HistoryEntry    ----------------------------------------------------------
/// A single entry in an order's append-only audit log. Entries are never modified or deleted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub order_id: OrderId,
    pub action: String,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     OrderNote      ----------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderNote {
    pub id: i64,
    pub order_id: OrderId,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     Container      ----------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct ContainerId(pub String);

impl Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ContainerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl ContainerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The project-like container that owns invoices. Invoices are only addressable through their
/// container, so the (container id, invoice id) pair is the true invoice key.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Container {
    pub id: i64,
    pub container_id: ContainerId,
    pub name: String,
    /// A secondary, legacy numeric identifier. Some callers only know this one.
    pub legacy_id: Option<i64>,
    pub sharing_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------      Invoice       ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Unpaid,
    Paid,
}

impl Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvoiceStatus::Unpaid => write!(f, "Unpaid"),
            InvoiceStatus::Paid => write!(f, "Paid"),
        }
    }
}

impl From<String> for InvoiceStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Paid" => Self::Paid,
            _ => Self::Unpaid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    pub invoice_id: String,
    pub container_id: ContainerId,
    /// The human-readable invoice number, e.g. "2024-0042". Used as the secondary lookup key.
    pub number: String,
    pub status: InvoiceStatus,
    pub currency: String,
    pub total_amount: MinorUnits,
    pub paid_amount: MinorUnits,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------  ProvisionedAccount  --------------------------------------------------------
/// The downstream service account created when an order becomes active. At most one exists per
/// order; the domain is a secondary idempotency key for retries after partial failures.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ProvisionedAccount {
    pub id: i64,
    pub order_id: OrderId,
    pub domain: String,
    pub sharing_token: String,
    pub pin: String,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------    Notification    ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "Info"),
            Severity::Warning => write!(f, "Warning"),
            Severity::Critical => write!(f, "Critical"),
        }
    }
}

impl From<String> for Severity {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Warning" => Self::Warning,
            "Critical" => Self::Critical,
            _ => Self::Info,
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    #[sqlx(rename = "is_read")]
    pub read: bool,
    pub order_id: Option<OrderId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    pub kind: String,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub order_id: Option<OrderId>,
}
