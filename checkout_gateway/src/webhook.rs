use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use hpg_common::Secret;
use log::*;
use serde::Deserialize;
use sha2::Sha256;

use crate::{
    data_objects::{PaymentCompleted, SessionMetadata},
    error::GatewayError,
};

pub const SIGNATURE_HEADER: &str = "X-Gateway-Signature";

const CHECKOUT_COMPLETED: &str = "checkout.completed";

/// A webhook payload after signature verification.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    PaymentCompleted(PaymentCompleted),
    /// A valid, correctly signed event of a type this service does not act on. Acknowledged and
    /// ignored.
    Unrecognized { event_type: String },
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    #[serde(rename = "type")]
    event_type: String,
    session_id: String,
    metadata: SessionMetadata,
    amount: i64,
    currency: String,
    payment_method: String,
    reference: String,
    paid_at: chrono::DateTime<chrono::Utc>,
}

/// Verifies the signature over the raw payload bytes and parses the event.
///
/// Verification fails closed: a missing, malformed or mismatching signature yields
/// [`GatewayError::SignatureVerification`] and the payload is never parsed. The comparison is
/// constant time.
pub fn parse_webhook(payload: &[u8], signature: &str, secret: &Secret<String>) -> Result<WebhookEvent, GatewayError> {
    verify_signature(payload, signature, secret)?;
    let event: WebhookPayload = serde_json::from_slice(payload).map_err(|e| GatewayError::JsonError(e.to_string()))?;
    if event.event_type != CHECKOUT_COMPLETED {
        debug!("🛒️ Ignoring webhook event of type '{}'", event.event_type);
        return Ok(WebhookEvent::Unrecognized { event_type: event.event_type });
    }
    Ok(WebhookEvent::PaymentCompleted(PaymentCompleted {
        session_id: event.session_id,
        metadata: event.metadata,
        amount: event.amount.into(),
        currency: event.currency,
        payment_method: event.payment_method,
        reference: event.reference,
        paid_at: event.paid_at,
    }))
}

fn verify_signature(payload: &[u8], signature: &str, secret: &Secret<String>) -> Result<(), GatewayError> {
    let expected = STANDARD.decode(signature).map_err(|_| GatewayError::SignatureVerification)?;
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.reveal().as_bytes())
        .map_err(|_| GatewayError::SignatureVerification)?;
    mac.update(payload);
    mac.verify_slice(&expected).map_err(|_| {
        warn!("🛒️ Webhook signature mismatch");
        GatewayError::SignatureVerification
    })
}
