pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod payment_routes;
pub mod reconciliation_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
