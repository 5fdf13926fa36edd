use std::sync::Arc;

use hpg_common::MinorUnits;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};

use crate::{
    config::GatewayConfig,
    data_objects::{CheckoutRequest, CheckoutSession, NewSessionBody, NewSessionResponse, SessionMetadata},
    error::GatewayError,
};

/// The behaviour the server needs from a payment gateway. Kept as a trait so endpoint tests can
/// substitute a mock and so a second provider only means a second implementation.
#[allow(async_fn_in_trait)]
pub trait CheckoutGateway {
    async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession, GatewayError>;
}

#[derive(Clone)]
pub struct GatewayApi {
    config: GatewayConfig,
    client: Arc<Client>,
}

impl GatewayApi {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.secret_key.reveal());
        let mut val = HeaderValue::from_str(&bearer).map_err(|e| GatewayError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client =
            Client::builder().default_headers(headers).build().map_err(|e| GatewayError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }
}

impl CheckoutGateway for GatewayApi {
    /// Creates a hosted checkout session.
    ///
    /// The decimal amount is validated and converted to minor units before the request is built,
    /// so a non-finite, zero or negative amount fails here and nothing reaches the gateway. The
    /// invoice and container ids travel verbatim in the session metadata and come back on the
    /// webhook.
    async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession, GatewayError> {
        let amount =
            MinorUnits::from_decimal(request.amount).map_err(|e| GatewayError::ValidationError(e.to_string()))?;
        let body = NewSessionBody {
            amount: amount.value(),
            currency: request.currency,
            description: request.description,
            metadata: SessionMetadata { invoice_id: request.invoice_id, container_id: request.container_id },
            success_url: request.success_url,
            cancel_url: request.cancel_url,
        };
        debug!("🛒️ Creating checkout session for invoice {} ({amount} {})", body.metadata.invoice_id, body.currency);
        let response = self
            .client
            .post(self.url("/v1/checkout/sessions"))
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::RestResponseError(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| GatewayError::RestResponseError(e.to_string()))?;
            warn!("🛒️ Checkout session creation failed with status {status}");
            return Err(GatewayError::QueryError { status, message });
        }
        let session: NewSessionResponse =
            response.json().await.map_err(|e| GatewayError::JsonError(e.to_string()))?;
        debug!("🛒️ Checkout session {} created", session.id);
        Ok(CheckoutSession { session_id: session.id, url: session.url })
    }
}
