//! One-time code generation and keyed hashing.

use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, Rng};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Uniform numeric code of `length` digits, leading zeros allowed.
pub fn generate_code(length: usize) -> String {
    let mut rng = OsRng;
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

fn mac(key: &str, phone: &str, code: &str) -> anyhow::Result<HmacSha256> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid OTP hash key: {}", e))?;
    mac.update(phone.as_bytes());
    mac.update(b":");
    mac.update(code.as_bytes());
    Ok(mac)
}

/// Hex HMAC-SHA256 of `phone:code`. Binding the phone means a stolen hash
/// cannot be replayed against another number.
pub fn hash_code(key: &str, phone: &str, code: &str) -> anyhow::Result<String> {
    Ok(hex::encode(mac(key, phone, code)?.finalize().into_bytes()))
}

/// Constant-time comparison of a submitted code against a stored hash.
pub fn verify_code(key: &str, phone: &str, code: &str, stored_hash: &str) -> bool {
    let Ok(expected) = hex::decode(stored_hash) else {
        return false;
    };
    mac(key, phone, code)
        .map(|mac| mac.verify_slice(&expected).is_ok())
        .unwrap_or(false)
}
