//! Session cookie signing.
//!
//! Cookie value is `<id>.<mac>`, where `mac` is base64url HMAC-SHA256 of the
//! id keyed by the session secret.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn mac(secret: &[u8], id: &str) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(id.as_bytes());
    mac
}

pub fn sign(id: &str, secret: &[u8]) -> String {
    let tag = mac(secret, id).finalize().into_bytes();
    format!("{}.{}", id, URL_SAFE_NO_PAD.encode(tag))
}

/// Return the session id if the signature checks out.
pub fn unsign(value: &str, secret: &[u8]) -> Option<String> {
    let (id, tag) = value.rsplit_once('.')?;
    let tag = URL_SAFE_NO_PAD.decode(tag).ok()?;
    mac(secret, id).verify_slice(&tag).ok()?;
    Some(id.to_string())
}
