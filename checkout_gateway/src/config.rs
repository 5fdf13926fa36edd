use hpg_common::Secret;
use log::*;

#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    /// Base URL of the gateway REST API.
    pub base_url: String,
    /// The API key used to authenticate checkout-session calls.
    pub secret_key: Secret<String>,
    /// The shared secret webhook payloads are signed with.
    pub webhook_secret: Secret<String>,
}

impl GatewayConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("HPG_GATEWAY_URL").unwrap_or_else(|_| {
            warn!("HPG_GATEWAY_URL not set, using (probably useless) default");
            "https://gateway.example.com".to_string()
        });
        let secret_key = Secret::new(std::env::var("HPG_GATEWAY_SECRET_KEY").unwrap_or_else(|_| {
            warn!("HPG_GATEWAY_SECRET_KEY not set, using (probably useless) default");
            "sk_00000000000000".to_string()
        }));
        let webhook_secret = Secret::new(std::env::var("HPG_GATEWAY_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("HPG_GATEWAY_WEBHOOK_SECRET not set, using (probably useless) default");
            "whsec_00000000000000".to_string()
        }));
        Self { base_url, secret_key, webhook_secret }
    }
}
