//! HMAC-SHA256 integrity digests for request and response bodies.
//!
//! Digests are computed over the raw JSON bytes before compression and
//! travel as lowercase hex in the `HashSHA256` header.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body digest. HTTP header names are case-insensitive;
/// lookups normalize to lowercase.
pub const HASH_HEADER: &str = "HashSHA256";

fn mac(key: &str) -> HmacSha256 {
    // HMAC accepts keys of any length.
    HmacSha256::new_from_slice(key.as_bytes()).expect("hmac key")
}

/// Hex digest of `body` under `key`.
pub fn digest(key: &str, body: &[u8]) -> String {
    let mut mac = mac(key);
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a received hex digest against `body`.
pub fn verify(key: &str, body: &[u8], received: &str) -> bool {
    let Ok(received) = hex::decode(received) else {
        return false;
    };
    let mut mac = mac(key);
    mac.update(body);
    mac.verify_slice(&received).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_hex_sha256_sized() {
        let d = digest("secret", b"payload");
        assert_eq!(d.len(), 64);
        assert!(d.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(d.chars().all(|c| !c.is_ascii_uppercase()));
    }

    #[test]
    fn verify_accepts_own_digest() {
        let d = digest("secret", b"payload");
        assert!(verify("secret", b"payload", &d));
    }

    #[test]
    fn verify_rejects_tampering() {
        let d = digest("secret", b"payload");
        assert!(!verify("secret", b"payload2", &d));
        assert!(!verify("other-key", b"payload", &d));
        assert!(!verify("secret", b"payload", "zz-not-hex"));
    }

    #[test]
    fn digest_depends_on_key() {
        assert_ne!(digest("k1", b"body"), digest("k2", b"body"));
    }
}
