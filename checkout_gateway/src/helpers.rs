use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use hpg_common::Secret;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 over the raw payload bytes, base64 encoded. This is the signature scheme the
/// gateway uses for webhook payloads.
pub fn calculate_hmac(key: &Secret<String>, payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(key.reveal().as_bytes()).expect("HMAC accepts keys of any size");
    mac.update(payload);
    STANDARD.encode(mac.finalize().into_bytes())
}
