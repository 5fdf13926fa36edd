//! # Hosting order lifecycle engine
//!
//! The core library behind the hosting admin backend. It owns:
//!
//! * the order state machine ([`LifecycleApi`]), the sole writer of an order's service and
//!   payment status;
//! * the provisioning service ([`provisioning::ProvisioningApi`]) that creates downstream
//!   service accounts when orders are approved;
//! * the notification fan-out ([`notifications`]);
//! * the storage contract ([`traits::LifecycleDatabase`]) with an SQLite implementation
//!   ([`SqliteDatabase`]) and an in-memory implementation for tests.
//!
//! The HTTP surface and the payment-gateway client live in their own crates
//! (`hosting_server` and `checkout_gateway`); this crate knows nothing about HTTP.

pub mod db_types;
pub mod lifecycle;
pub mod notifications;
pub mod provisioning;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use lifecycle::LifecycleApi;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
