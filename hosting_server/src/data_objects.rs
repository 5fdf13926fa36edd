use std::fmt::Display;

use chrono::{DateTime, Utc};
use hosting_engine::db_types::{HistoryEntry, Order, OrderNote};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Body for `POST /payments/checkout`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutParams {
    pub invoice_id: String,
    pub container_id: String,
    #[serde(default)]
    pub pin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub success: bool,
    pub url: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonParams {
    #[serde(default = "default_reason")]
    pub reason: String,
}

fn default_reason() -> String {
    "No reason given".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteParams {
    pub note: String,
}

/// Body for recording an out-of-band payment against an order. The amount is given in minor
/// currency units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPaymentParams {
    pub amount: i64,
    pub method: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
}

/// The full order view the admin UI renders: the order with its audit trail and notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    pub order: Order,
    pub history: Vec<HistoryEntry>,
    pub notes: Vec<OrderNote>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharingInfo {
    pub domain: String,
    pub sharing_token: String,
    pub pin: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
}

/// The redirect URLs handed to the gateway when a checkout session is created.
#[derive(Debug, Clone, Default)]
pub struct CheckoutUrls {
    pub success_url: String,
    pub cancel_url: String,
}
