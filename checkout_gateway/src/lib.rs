//! # Checkout gateway client
//!
//! A thin client for the hosted payment gateway. It does exactly two things:
//!
//! * create checkout sessions ([`GatewayApi::create_checkout`]), returning the URL the client is
//!   redirected to;
//! * verify and parse signed webhook callbacks ([`parse_webhook`]).
//!
//! The crate reports payment facts; interpreting them (idempotency, invoice state) is the
//! lifecycle engine's job.
mod api;
mod config;
mod data_objects;
mod error;
mod helpers;
mod webhook;

pub use api::{CheckoutGateway, GatewayApi};
pub use config::GatewayConfig;
pub use data_objects::{CheckoutRequest, CheckoutSession, PaymentCompleted, SessionMetadata};
pub use error::GatewayError;
pub use helpers::calculate_hmac;
pub use webhook::{parse_webhook, WebhookEvent, SIGNATURE_HEADER};
