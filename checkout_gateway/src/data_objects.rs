use chrono::{DateTime, Utc};
use hpg_common::MinorUnits;
use serde::{Deserialize, Serialize};

/// A request to create a hosted checkout session.
///
/// `amount` is a decimal amount in major currency units (e.g. `120.0` for 120.00 EUR); the client
/// converts it to minor units before anything leaves the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub amount: f64,
    pub currency: String,
    pub description: String,
    pub invoice_id: String,
    pub container_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// The identifiers embedded verbatim in the session metadata. The webhook echoes them back, which
/// is how a payment event finds its way to the right invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub invoice_id: String,
    pub container_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub session_id: String,
    /// The URL the paying client is redirected to.
    pub url: String,
}

/// A verified `checkout.completed` event, translated into payment facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCompleted {
    pub session_id: String,
    pub metadata: SessionMetadata,
    pub amount: MinorUnits,
    pub currency: String,
    pub payment_method: String,
    pub reference: String,
    pub paid_at: DateTime<Utc>,
}

// Wire shapes for the REST API.

#[derive(Debug, Serialize)]
pub(crate) struct NewSessionBody {
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub metadata: SessionMetadata,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewSessionResponse {
    pub id: String,
    pub url: String,
}
