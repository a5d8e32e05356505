//! Salted password hashing.
//!
//! Stored form is `<salt>$<mac>`, both base64url, where `mac` is
//! HMAC-SHA256 of the password keyed by the salt.
//!
//! This is a single fast hash, suitable for the in-memory demo users only.
//! It is not a password KDF and must not be used for production credential
//! storage; a real user repository should store slow, memory-hard hashes.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub fn hash_password(password: &str) -> String {
    let salt: [u8; 16] = rand::random();
    let mac = digest(&salt, password).finalize().into_bytes();
    format!("{}${}", URL_SAFE_NO_PAD.encode(salt), URL_SAFE_NO_PAD.encode(mac))
}

/// Constant-time comparison against a stored hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, mac)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(mac)) = (URL_SAFE_NO_PAD.decode(salt), URL_SAFE_NO_PAD.decode(mac)) else {
        return false;
    };
    digest(&salt, password).verify_slice(&mac).is_ok()
}

fn digest(salt: &[u8], password: &str) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(salt).expect("HMAC accepts keys of any length");
    mac.update(password.as_bytes());
    mac
}
