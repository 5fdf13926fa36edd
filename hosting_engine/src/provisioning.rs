use log::*;
use rand::{distributions::Alphanumeric, Rng};

use crate::{
    db_types::{Order, ProvisionedAccount},
    traits::{LifecycleDatabase, LifecycleError},
};

pub const SHARING_TOKEN_LEN: usize = 32;

/// Creates the downstream service account for an approved order.
///
/// Provisioning is idempotent along two keys. A retry after a partial failure first finds the
/// account by order id; if the account row was written under a different order (e.g. a manual
/// re-submission for the same domain), the domain lookup catches it. Only when both miss is a new
/// account created with fresh credentials.
#[derive(Debug, Clone)]
pub struct ProvisioningApi<B> {
    db: B,
}

impl<B> ProvisioningApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> ProvisioningApi<B>
where B: LifecycleDatabase
{
    pub async fn provision(&self, order: &Order) -> Result<ProvisionedAccount, LifecycleError> {
        if let Some(account) = self.db.fetch_account_for_order(&order.order_id).await? {
            debug!("🪪️ Order [{}] already has account #{}. Re-using it.", order.order_id, account.id);
            return Ok(account);
        }
        if let Some(account) = self.db.fetch_account_for_domain(&order.domain).await? {
            debug!("🪪️ Domain {} already has account #{}. Re-using it.", order.domain, account.id);
            return Ok(account);
        }
        let sharing_token = generate_sharing_token();
        let pin = generate_pin();
        let account = self.db.insert_provisioned_account(&order.order_id, &order.domain, &sharing_token, &pin).await?;
        info!("🪪️ Provisioned account #{} for order [{}] on {}", account.id, order.order_id, order.domain);
        Ok(account)
    }
}

/// A 32-character alphanumeric token used to share read access to the account.
pub fn generate_sharing_token() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(SHARING_TOKEN_LEN).map(char::from).collect()
}

/// A 6-digit PIN the client uses at the payment checkout. Leading zeroes are legal.
pub fn generate_pin() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{n:06}")
}
