use std::{env, time::Duration};

use checkout_gateway::GatewayConfig;
use log::*;

use crate::data_objects::CheckoutUrls;

const DEFAULT_HPG_HOST: &str = "127.0.0.1";
const DEFAULT_HPG_PORT: u16 = 8480;
const DEFAULT_RECONCILIATION_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// How often the reconciliation poller runs.
    pub reconciliation_interval: Duration,
    pub gateway: GatewayConfig,
    pub checkout_urls: CheckoutUrls,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HPG_HOST.to_string(),
            port: DEFAULT_HPG_PORT,
            database_url: String::default(),
            reconciliation_interval: DEFAULT_RECONCILIATION_INTERVAL,
            gateway: GatewayConfig::default(),
            checkout_urls: CheckoutUrls::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("HPG_HOST").ok().unwrap_or_else(|| DEFAULT_HPG_HOST.into());
        let port = env::var("HPG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for HPG_PORT. {e} Using the default, {DEFAULT_HPG_PORT}, instead."
                    );
                    DEFAULT_HPG_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_HPG_PORT);
        let database_url = env::var("HPG_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ HPG_DATABASE_URL is not set. Please set it to the URL for the order database.");
            String::default()
        });
        let reconciliation_interval = env::var("HPG_RECONCILIATION_INTERVAL_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| {
                        error!("🪛️ {s} is not a valid value for HPG_RECONCILIATION_INTERVAL_SECS. {e} Using the default.");
                        e
                    })
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RECONCILIATION_INTERVAL);
        let gateway = GatewayConfig::new_from_env_or_default();
        let success_url = env::var("HPG_CHECKOUT_SUCCESS_URL").unwrap_or_else(|_| {
            warn!("🪛️ HPG_CHECKOUT_SUCCESS_URL not set, using default");
            "https://localhost/payment/success".to_string()
        });
        let cancel_url = env::var("HPG_CHECKOUT_CANCEL_URL").unwrap_or_else(|_| {
            warn!("🪛️ HPG_CHECKOUT_CANCEL_URL not set, using default");
            "https://localhost/payment/cancelled".to_string()
        });
        info!(
            "🪛️ Server configuration: {host}:{port}, reconciliation every {}s",
            reconciliation_interval.as_secs()
        );
        Self {
            host,
            port,
            database_url,
            reconciliation_interval,
            gateway,
            checkout_urls: CheckoutUrls { success_url, cancel_url },
        }
    }
}
